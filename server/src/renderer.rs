use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use common::{
    board::{Frame, Point},
    color::PixelColor,
};
use serde::Deserialize;
use thiserror::Error;
use tokio::{
    sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{
    events::{DisplayEvent, EventBus},
    mapper::CoordinateMapper,
    surface::{DisplaySurface, PixelBuffer, SurfaceSize},
};

/// 蛇头亮度倍数
const HEAD_BRIGHTNESS: f32 = 2.0;
/// 每隔几节蛇身变暗一次
const DIM_SEGMENT_PERIOD: usize = 4;
const DIM_BRIGHTNESS: f32 = 0.5;

#[derive(Debug, Error)]
pub enum RenderError {
    /// 回合号不大于上一次成功显示的回合
    #[error("过期帧: 回合 {turn}，已显示回合 {last}")]
    Stale { turn: u32, last: u32 },
    /// 帧属于已经结束的会话
    #[error("帧所属的游戏 {0} 不在播放中")]
    SessionMismatch(String),
    #[error("屏幕输出失败: {0}")]
    Surface(#[from] std::io::Error),
    #[error("屏幕锁已损坏")]
    Poisoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Palette {
    /// 整个屏幕的底色
    pub background: PixelColor,
    /// 棋盘区域的底色
    pub board: PixelColor,
    pub hazard: PixelColor,
    pub food: PixelColor,
    /// 蛇颜色无法解析时使用
    pub fallback_snake: PixelColor,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: PixelColor::BLACK,
            board: PixelColor::new(32, 32, 32),
            hazard: PixelColor::new(32, 12, 8),
            food: PixelColor::new(255, 92, 117),
            fallback_snake: PixelColor::new(0x88, 0x88, 0x88),
        }
    }
}

/// 第 index 节蛇身的颜色，0 是蛇头
pub fn segment_color(base: PixelColor, index: usize) -> PixelColor {
    if index == 0 {
        base.scaled(HEAD_BRIGHTNESS)
    } else if index % DIM_SEGMENT_PERIOD == 0 {
        base.scaled(DIM_BRIGHTNESS)
    } else {
        base
    }
}

/// 一次播放会话的凭证，同一局游戏重新入队会得到新的代数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTicket {
    game_id: String,
    generation: u64,
}

impl SessionTicket {
    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// 当前显示在屏幕上的会话与回合，以及屏幕本身
struct PresentState {
    surface: Box<dyn DisplaySurface>,
    session: Option<SessionTicket>,
    last_turn: Option<u32>,
}

/// 屏幕的唯一写入口，锁只在校验回合和切换缓冲时持有
pub struct Presenter {
    size: SurfaceSize,
    generations: AtomicU64,
    state: Mutex<PresentState>,
}

impl Presenter {
    pub fn new(surface: Box<dyn DisplaySurface>) -> Self {
        Self {
            size: surface.size(),
            generations: AtomicU64::new(0),
            state: Mutex::new(PresentState {
                surface,
                session: None,
                last_turn: None,
            }),
        }
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    /// 切换到新的会话，之前所有会话的帧都会被拒绝
    pub fn begin_session(&self, game_id: &str) -> SessionTicket {
        let ticket = SessionTicket {
            game_id: game_id.to_string(),
            generation: self.generations.fetch_add(1, Ordering::SeqCst) + 1,
        };
        if let Ok(mut state) = self.state.lock() {
            state.session = Some(ticket.clone());
            state.last_turn = None;
        }
        ticket
    }

    /// 当前会话最后一次成功显示的回合
    pub fn last_turn(&self) -> Option<u32> {
        self.state.lock().ok().and_then(|state| state.last_turn)
    }

    /// 校验会话和回合顺序后把离屏缓冲写到屏幕并切换
    pub fn present(
        &self,
        ticket: &SessionTicket,
        turn: u32,
        canvas: &PixelBuffer,
    ) -> Result<(), RenderError> {
        let mut state = self.state.lock().map_err(|_| RenderError::Poisoned)?;
        if state.session.as_ref() != Some(ticket) {
            return Err(RenderError::SessionMismatch(ticket.game_id.clone()));
        }
        if let Some(last) = state.last_turn
            && turn <= last
        {
            return Err(RenderError::Stale { turn, last });
        }
        let surface = &mut state.surface;
        for (y, row) in canvas.rows().enumerate() {
            for (x, color) in row.iter().enumerate() {
                surface.set_pixel(x, y, *color);
            }
        }
        surface.set_status(&format!("Turn #{}", turn));
        surface.swap()?;
        state.last_turn = Some(turn);
        Ok(())
    }
}

/// 把一帧棋盘画到离屏缓冲，再交给 `Presenter` 显示
pub struct FrameRenderer {
    presenter: Arc<Presenter>,
    palette: Palette,
}

impl FrameRenderer {
    pub fn new(presenter: Arc<Presenter>, palette: Palette) -> Self {
        Self { presenter, palette }
    }

    pub fn presenter(&self) -> &Arc<Presenter> {
        &self.presenter
    }

    pub fn render(
        &self,
        ticket: &SessionTicket,
        mapper: &CoordinateMapper,
        frame: &Frame,
    ) -> Result<(), RenderError> {
        let canvas = self.paint(mapper, frame);
        self.presenter.present(ticket, frame.turn, &canvas)
    }

    /// 绘制顺序: 底色、棋盘、危险区、食物、蛇，后画的覆盖先画的
    pub fn paint(&self, mapper: &CoordinateMapper, frame: &Frame) -> PixelBuffer {
        let mut canvas = PixelBuffer::new(mapper.surface());
        canvas.fill(self.palette.background);

        for cell in mapper.board_cells() {
            paint_cell(&mut canvas, mapper, cell, self.palette.board);
        }
        for hazard in &frame.hazards {
            paint_cell(&mut canvas, mapper, *hazard, self.palette.hazard);
        }
        for food in &frame.food {
            paint_cell(&mut canvas, mapper, *food, self.palette.food);
        }

        for snake in frame.snakes.iter().filter(|snake| snake.is_alive()) {
            let base = PixelColor::parse_hex(&snake.color).unwrap_or_else(|e| {
                warn!("[FrameRenderer] 蛇 {} 颜色无法解析: {}", snake.id, e);
                self.palette.fallback_snake
            });
            for (index, segment) in snake.body.iter().enumerate() {
                paint_cell(&mut canvas, mapper, *segment, segment_color(base, index));
            }
        }
        canvas
    }
}

fn paint_cell(canvas: &mut PixelBuffer, mapper: &CoordinateMapper, point: Point, color: PixelColor) {
    for (x, y) in mapper.map(point) {
        canvas.set_pixel(x, y, color);
    }
}

/// 等待渲染的一帧
struct RenderJob {
    ticket: SessionTicket,
    mapper: Arc<CoordinateMapper>,
    frame: Frame,
}

/// 有上限的渲染任务池，`dispatch` 从不等待，接收循环不会被慢速渲染卡住
///
/// 所有名额都在使用时，最新的一帧放进等待位，由下一个空闲的任务接着渲染；
/// 被挤掉的旧帧按过期帧处理。
#[derive(Clone)]
pub struct RenderPool {
    renderer: Arc<FrameRenderer>,
    permits: Arc<Semaphore>,
    pending: Arc<Mutex<Option<RenderJob>>>,
    event_bus: EventBus,
}

impl RenderPool {
    pub fn new(renderer: FrameRenderer, workers: usize, event_bus: EventBus) -> Self {
        Self {
            renderer: Arc::new(renderer),
            permits: Arc::new(Semaphore::new(workers.max(1))),
            pending: Arc::new(Mutex::new(None)),
            event_bus,
        }
    }

    pub fn surface_size(&self) -> SurfaceSize {
        self.renderer.presenter().size()
    }

    pub fn begin_session(&self, game_id: &str) -> SessionTicket {
        self.renderer.presenter().begin_session(game_id)
    }

    pub fn last_turn(&self) -> Option<u32> {
        self.renderer.presenter().last_turn()
    }

    /// 有空闲名额时立即在阻塞线程中渲染，否则放进等待位后返回 None
    pub fn dispatch(
        &self,
        ticket: SessionTicket,
        mapper: Arc<CoordinateMapper>,
        frame: Frame,
    ) -> Option<JoinHandle<()>> {
        let job = RenderJob {
            ticket,
            mapper,
            frame,
        };
        match self.permits.clone().try_acquire_owned() {
            Ok(permit) => return Some(self.spawn_worker(permit, job)),
            Err(TryAcquireError::Closed) => {
                warn!("[RenderPool] 渲染池已关闭，丢弃回合 {}", job.frame.turn);
                return None;
            }
            Err(TryAcquireError::NoPermits) => {}
        }

        debug!(
            "[RenderPool] 渲染池已满，游戏 {} 回合 {} 等待空闲",
            job.ticket.game_id, job.frame.turn
        );
        self.park(job);
        // 停放期间所有任务可能都已退出
        let permit = self.permits.clone().try_acquire_owned().ok()?;
        let job = self.take_pending()?;
        Some(self.spawn_worker(permit, job))
    }

    fn park(&self, job: RenderJob) {
        let replaced = self
            .pending
            .lock()
            .ok()
            .and_then(|mut slot| slot.replace(job));
        if let Some(old) = replaced {
            debug!(
                "[RenderPool] 游戏 {} 回合 {} 被更新的帧替换",
                old.ticket.game_id, old.frame.turn
            );
            self.event_bus.publish(DisplayEvent::StaleFrame {
                game_id: old.ticket.game_id,
                turn: old.frame.turn,
            });
        }
    }

    fn take_pending(&self) -> Option<RenderJob> {
        self.pending.lock().ok().and_then(|mut slot| slot.take())
    }

    fn spawn_worker(&self, permit: OwnedSemaphorePermit, job: RenderJob) -> JoinHandle<()> {
        let pool = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut permit = permit;
            let mut job = job;
            loop {
                pool.run(job);
                if let Some(next) = pool.take_pending() {
                    job = next;
                    continue;
                }
                drop(permit);
                // 释放名额之后再看一次等待位，避免刚停放的帧无人处理
                let Ok(again) = pool.permits.clone().try_acquire_owned() else {
                    return;
                };
                let Some(next) = pool.take_pending() else {
                    return;
                };
                permit = again;
                job = next;
            }
        })
    }

    fn run(&self, job: RenderJob) {
        let RenderJob {
            ticket,
            mapper,
            frame,
        } = job;
        let turn = frame.turn;
        let game_id = ticket.game_id.clone();
        match self.renderer.render(&ticket, &mapper, &frame) {
            Ok(()) => self
                .event_bus
                .publish(DisplayEvent::FrameRendered { game_id, turn }),
            Err(RenderError::Stale { .. } | RenderError::SessionMismatch(_)) => {
                debug!("[RenderPool] 丢弃游戏 {} 的过期帧，回合 {}", game_id, turn);
                self.event_bus
                    .publish(DisplayEvent::StaleFrame { game_id, turn });
            }
            Err(e) => warn!("[RenderPool] 游戏 {} 回合 {} 渲染失败: {}", game_id, turn, e),
        }
    }
}
