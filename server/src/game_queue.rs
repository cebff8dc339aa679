use std::{collections::VecDeque, sync::Arc};

use common::board::BoardSpec;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    engine::GameEngine,
    events::{DisplayEvent, EventBus},
    renderer::RenderPool,
    session::GameSession,
    stream::EventStreamClient,
};

/// 等待播放的游戏，按登记顺序排列，队首可能正在播放
#[derive(Debug, Default)]
pub struct QueueState {
    sessions: VecDeque<GameSession>,
}

impl QueueState {
    /// 已存在时返回 false
    pub fn enqueue(&mut self, game_id: &str) -> bool {
        if self.contains(game_id) {
            return false;
        }
        self.sessions.push_back(GameSession::new(game_id));
        true
    }

    pub fn contains(&self, game_id: &str) -> bool {
        self.sessions.iter().any(|s| s.game_id() == game_id)
    }

    pub fn active(&self) -> Option<&GameSession> {
        self.sessions.iter().find(|s| s.is_active())
    }

    pub fn is_active(&self, game_id: &str) -> bool {
        self.active().is_some_and(|s| s.game_id() == game_id)
    }

    /// 没有正在播放的游戏时激活队首
    pub fn activate_head(&mut self) -> Option<&GameSession> {
        if self.active().is_some() {
            return None;
        }
        let head = self.sessions.front_mut()?;
        head.activate();
        Some(head)
    }

    /// 从任意位置移除，并标记为已结束
    pub fn remove(&mut self, game_id: &str) -> Option<GameSession> {
        let index = self.sessions.iter().position(|s| s.game_id() == game_id)?;
        let mut session = self.sessions.remove(index)?;
        session.end();
        Some(session)
    }

    pub fn attach_board(&mut self, game_id: &str, board: BoardSpec) -> bool {
        self.sessions
            .iter_mut()
            .find(|s| s.game_id() == game_id)
            .is_some_and(|s| s.attach_board(board))
    }

    pub fn game_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|s| s.game_id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// 一局游戏结束的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameOutcome {
    /// 收到 game_end
    Completed,
    /// 事件流失败，视同结束以便继续播放下一局
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub games: Vec<String>,
    pub active: Option<String>,
    /// 正在播放的棋盘，元数据查询完成之前为空
    pub board: Option<BoardSummary>,
    /// 屏幕上最后一次显示的回合
    pub last_turn: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardSummary {
    pub width: i32,
    pub height: i32,
    pub wrapped: bool,
}

impl From<&BoardSpec> for BoardSummary {
    fn from(board: &BoardSpec) -> Self {
        Self {
            width: board.width,
            height: board.height,
            wrapped: board.ruleset.is_wrapped(),
        }
    }
}

struct QueueInner {
    state: QueueState,
    /// 正在运行的事件流
    active_stream: Option<CancellationToken>,
}

/// 播放队列，同一时间只有一局游戏在屏幕上播放
#[derive(Clone)]
pub struct GameQueue {
    inner: Arc<Mutex<QueueInner>>,
    engine: Arc<dyn GameEngine>,
    render_pool: RenderPool,
    event_bus: EventBus,
}

impl GameQueue {
    pub fn new(engine: Arc<dyn GameEngine>, render_pool: RenderPool, event_bus: EventBus) -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueInner {
                state: QueueState::default(),
                active_stream: None,
            })),
            engine,
            render_pool,
            event_bus,
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// 登记一局游戏，重复登记只记录日志
    pub async fn enqueue(&self, game_id: &str) {
        let mut inner = self.inner.lock().await;
        if !inner.state.enqueue(game_id) {
            info!("[GameQueue] 游戏 {} 已在队列中", game_id);
            self.event_bus.publish(DisplayEvent::DuplicateGame {
                game_id: game_id.to_string(),
            });
            return;
        }
        let position = inner.state.len() - 1;
        info!("[GameQueue] 游戏 {} 入队，位置 {}", game_id, position);
        self.event_bus.publish(DisplayEvent::GameQueued {
            game_id: game_id.to_string(),
            position,
        });
        self.start_next(&mut inner);
    }

    /// 正常结束
    pub async fn on_game_end(&self, game_id: &str) {
        self.finish(game_id, GameOutcome::Completed).await;
    }

    /// 事件流失败，与正常结束走同样的清理流程
    pub async fn on_stream_failed(&self, game_id: &str, reason: String) {
        self.finish(game_id, GameOutcome::Failed(reason)).await;
    }

    pub async fn finish(&self, game_id: &str, outcome: GameOutcome) {
        let mut inner = self.inner.lock().await;
        let was_active = inner.state.is_active(game_id);
        if inner.state.remove(game_id).is_none() {
            // 不在队列中的游戏，忽略
            info!("[GameQueue] 游戏 {} 不在队列中，忽略结束通知", game_id);
            return;
        }

        match &outcome {
            GameOutcome::Completed => {
                info!("[GameQueue] 游戏 {} 播放结束", game_id);
                self.event_bus.publish(DisplayEvent::GameEnded {
                    game_id: game_id.to_string(),
                });
            }
            GameOutcome::Failed(reason) => {
                warn!("[GameQueue] 游戏 {} 事件流失败: {}", game_id, reason);
                self.event_bus.publish(DisplayEvent::StreamFailed {
                    game_id: game_id.to_string(),
                    reason: reason.clone(),
                });
            }
        }

        // 被移除的是正在播放的游戏时才需要关闭事件流
        if was_active
            && let Some(token) = inner.active_stream.take()
        {
            token.cancel();
        }
        if inner.state.is_empty() {
            info!("[GameQueue] 队列已空，屏幕保留最后一帧");
            return;
        }
        self.start_next(&mut inner);
    }

    /// 元数据查询完成后记录棋盘信息
    pub async fn attach_board(&self, game_id: &str, board: BoardSpec) -> bool {
        self.inner.lock().await.state.attach_board(game_id, board)
    }

    pub async fn snapshot(&self) -> QueueSnapshot {
        let inner = self.inner.lock().await;
        let active = inner.state.active();
        QueueSnapshot {
            games: inner.state.game_ids(),
            active: active.map(|s| s.game_id().to_string()),
            board: active.and_then(|s| s.board()).map(BoardSummary::from),
            last_turn: active.and(self.render_pool.last_turn()),
        }
    }

    /// 调用方持有队列锁
    fn start_next(&self, inner: &mut QueueInner) {
        let Some(session) = inner.state.activate_head() else {
            return;
        };
        let game_id = session.game_id().to_string();
        info!("[GameQueue] 开始播放游戏 {}", game_id);

        let cancel = CancellationToken::new();
        inner.active_stream = Some(cancel.clone());
        let ticket = self.render_pool.begin_session(&game_id);
        self.event_bus.publish(DisplayEvent::GameStarted { game_id });

        let client = EventStreamClient::new(
            ticket,
            self.engine.clone(),
            self.clone(),
            self.render_pool.clone(),
            cancel,
        );
        tokio::spawn(async move {
            client.run().await;
        });
    }
}
