use std::{future::Future, sync::Arc};

use common::{board::BoardSpec, message::StreamEvent};
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    engine::{GameEngine, StreamError},
    events::DisplayEvent,
    game_queue::GameQueue,
    mapper::CoordinateMapper,
    renderer::{RenderPool, SessionTicket},
};

/// 事件流的结束方式
#[derive(Debug, PartialEq, Eq)]
enum StreamOutcome {
    GameEnded,
    /// 被队列主动关闭
    Cancelled,
}

/// 一局游戏的事件流接收循环
///
/// 先查询一次元数据确定棋盘，然后持续读取事件流:
/// `frame` 交给渲染池，`game_end` 通知队列结束，其它类型只记录日志。
/// 连接失败、意外断开或超过引擎给出的空闲时限都视同结束，
/// 队列会继续播放下一局，不会自动重连。
pub struct EventStreamClient {
    ticket: SessionTicket,
    game_id: String,
    engine: Arc<dyn GameEngine>,
    queue: GameQueue,
    render_pool: RenderPool,
    cancel: CancellationToken,
}

impl EventStreamClient {
    pub fn new(
        ticket: SessionTicket,
        engine: Arc<dyn GameEngine>,
        queue: GameQueue,
        render_pool: RenderPool,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            game_id: ticket.game_id().to_string(),
            ticket,
            engine,
            queue,
            render_pool,
            cancel,
        }
    }

    pub async fn run(self) {
        info!("[EventStreamClient {}] 启动", self.game_id);
        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => Ok(StreamOutcome::Cancelled),
            outcome = self.receive() => outcome,
        };
        match outcome {
            Ok(StreamOutcome::GameEnded) => {
                info!("[EventStreamClient {}] 收到 game_end", self.game_id);
                self.queue.on_game_end(&self.game_id).await;
            }
            Ok(StreamOutcome::Cancelled) => {
                debug!("[EventStreamClient {}] 已被关闭", self.game_id);
            }
            Err(e) => {
                warn!("[EventStreamClient {}] {}", self.game_id, e);
                self.queue.on_stream_failed(&self.game_id, e.to_string()).await;
            }
        }
        info!("[EventStreamClient {}] 退出", self.game_id);
    }

    async fn receive(&self) -> Result<StreamOutcome, StreamError> {
        let info = self
            .within_idle("查询元数据", self.engine.fetch_game(&self.game_id))
            .await??;
        let board = BoardSpec::from(&info);
        info!(
            "[EventStreamClient {}] 棋盘 {}x{}，规则 {}",
            self.game_id, board.width, board.height, info.ruleset.name
        );
        self.queue.attach_board(&self.game_id, board.clone()).await;
        let mapper = Arc::new(CoordinateMapper::new(board, self.render_pool.surface_size()));
        debug!(
            "[EventStreamClient {}] 偏移 {:?}，共 {} 个棋盘副本",
            self.game_id,
            mapper.offset(),
            mapper.tile_origins().len()
        );

        let mut events = self
            .within_idle("打开事件流", self.engine.open_stream(&self.game_id))
            .await??;
        while let Some(message) = self.within_idle("等待消息", events.next()).await? {
            let text = message?;
            match StreamEvent::decode(&text) {
                Ok(StreamEvent::Frame(frame)) => {
                    debug!("[EventStreamClient {}] 回合 {}", self.game_id, frame.turn);
                    // 池满时这一帧进入等待位，不阻塞接收
                    self.render_pool.dispatch(self.ticket.clone(), mapper.clone(), frame);
                }
                Ok(StreamEvent::GameEnd) => return Ok(StreamOutcome::GameEnded),
                Ok(StreamEvent::Unknown(kind)) => {
                    info!("[EventStreamClient {}] 收到 {} 消息", self.game_id, kind);
                    self.report_malformed(format!("未知消息类型 {}", kind));
                }
                Err(e) => {
                    warn!("[EventStreamClient {}] 消息解码失败: {}", self.game_id, e);
                    self.report_malformed(e.to_string());
                }
            }
        }
        Err(StreamError::Closed)
    }

    /// 按引擎的空闲时限等待，超时视为读取失败
    async fn within_idle<T>(
        &self,
        step: &str,
        future: impl Future<Output = T>,
    ) -> Result<T, StreamError> {
        match self.engine.idle_timeout() {
            Some(limit) => tokio::time::timeout(limit, future)
                .await
                .map_err(|_| StreamError::Receive(format!("{}超时 ({:?})", step, limit))),
            None => Ok(future.await),
        }
    }

    fn report_malformed(&self, reason: String) {
        self.queue.event_bus().publish(DisplayEvent::MalformedEvent {
            game_id: self.game_id.clone(),
            reason,
        });
    }
}
