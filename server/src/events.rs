use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    /// 游戏进入播放队列
    GameQueued { game_id: String, position: usize },
    /// 重复登记的游戏，忽略
    DuplicateGame { game_id: String },
    /// 开始播放
    GameStarted { game_id: String },
    FrameRendered { game_id: String, turn: u32 },
    /// 过期帧被丢弃
    StaleFrame { game_id: String, turn: u32 },
    /// 无法解码或类型未知的消息
    MalformedEvent { game_id: String, reason: String },
    /// 事件流连接失败或意外断开
    StreamFailed { game_id: String, reason: String },
    /// 收到 game_end，正常结束
    GameEnded { game_id: String },
}

/// 事件总线
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DisplayEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            sender: broadcast::channel(1024).0,
        }
    }

    /// 发布事件
    pub fn publish(&self, event: DisplayEvent) {
        // 没有订阅者会发送失败，忽略错误
        let _ = self.sender.send(event);
    }

    /// 订阅事件
    pub fn subscribe(&self) -> broadcast::Receiver<DisplayEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
