use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use common::message::{GameInfo, GameInfoResponse};
use futures_util::{StreamExt, stream::BoxStream};
use thiserror::Error;
use tokio::fs::File;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::debug;

#[derive(Debug, Clone, Error)]
pub enum StreamError {
    #[error("查询游戏元数据失败: {0}")]
    Lookup(String),
    #[error("无法打开事件流: {0}")]
    Connect(String),
    #[error("事件流读取失败: {0}")]
    Receive(String),
    /// 没有收到 game_end 连接就结束了
    #[error("事件流意外关闭")]
    Closed,
}

/// 一局游戏的原始消息流，每一项是一条 JSON 文本
pub type EventStream = BoxStream<'static, Result<String, StreamError>>;

/// 远端引擎的各项超时
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineTimeouts {
    /// 建立 TCP 或 websocket 连接
    pub connect: Duration,
    /// 一次元数据查询的总耗时
    pub request: Duration,
    /// 事件流两条消息之间的最长间隔
    pub idle: Duration,
}

impl Default for EngineTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            request: Duration::from_secs(10),
            idle: Duration::from_secs(30),
        }
    }
}

/// 远端游戏引擎
#[async_trait]
pub trait GameEngine: Send + Sync {
    async fn fetch_game(&self, game_id: &str) -> Result<GameInfo, StreamError>;

    async fn open_stream(&self, game_id: &str) -> Result<EventStream, StreamError>;

    /// 查询、连接以及等待下一条消息各自的时间上限，None 表示一直等待
    fn idle_timeout(&self) -> Option<Duration> {
        None
    }
}

/// 通过 HTTP 查询元数据、通过 websocket 订阅事件的引擎
pub struct HttpGameEngine {
    client: reqwest::Client,
    api_base: String,
    stream_base: String,
    timeouts: EngineTimeouts,
}

impl HttpGameEngine {
    pub fn new(
        api_base: impl Into<String>,
        stream_base: impl Into<String>,
        timeouts: EngineTimeouts,
    ) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.request)
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.into(),
            stream_base: stream_base.into(),
            timeouts,
        })
    }
}

#[async_trait]
impl GameEngine for HttpGameEngine {
    async fn fetch_game(&self, game_id: &str) -> Result<GameInfo, StreamError> {
        let url = format!("{}/games/{}", self.api_base.trim_end_matches('/'), game_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| StreamError::Lookup(e.to_string()))?;
        let info: GameInfoResponse = response
            .json()
            .await
            .map_err(|e| StreamError::Lookup(e.to_string()))?;
        Ok(info.game)
    }

    async fn open_stream(&self, game_id: &str) -> Result<EventStream, StreamError> {
        let url = format!(
            "{}/games/{}/events",
            self.stream_base.trim_end_matches('/'),
            game_id
        );
        let (socket, _) = tokio::time::timeout(self.timeouts.connect, connect_async(url.as_str()))
            .await
            .map_err(|_| StreamError::Connect(format!("连接 {} 超时", url)))?
            .map_err(|e| StreamError::Connect(e.to_string()))?;
        debug!("[HttpGameEngine] 已连接 {}", url);
        let stream = socket.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(bytes)) => Some(
                    String::from_utf8(bytes).map_err(|e| StreamError::Receive(e.to_string())),
                ),
                // ping/pong 由 tungstenite 自动处理，close 之后流会自然结束
                Ok(_) => None,
                Err(e) => Some(Err(StreamError::Receive(e.to_string()))),
            }
        });
        Ok(stream.boxed())
    }

    fn idle_timeout(&self) -> Option<Duration> {
        Some(self.timeouts.idle)
    }
}

/// 从按行保存的 JSON 文件回放事件流，用于离线调试
pub struct ReplayEngine {
    path: PathBuf,
    game: GameInfo,
    interval: Duration,
}

impl ReplayEngine {
    pub fn new(path: impl Into<PathBuf>, game: GameInfo, interval: Duration) -> Self {
        Self {
            path: path.into(),
            game,
            interval,
        }
    }
}

#[async_trait]
impl GameEngine for ReplayEngine {
    async fn fetch_game(&self, _game_id: &str) -> Result<GameInfo, StreamError> {
        Ok(self.game.clone())
    }

    async fn open_stream(&self, _game_id: &str) -> Result<EventStream, StreamError> {
        let file = File::open(&self.path)
            .await
            .map_err(|e| StreamError::Connect(format!("{}: {}", self.path.display(), e)))?;
        let interval = self.interval;
        let lines = FramedRead::new(file, LinesCodec::new())
            .filter(|line| {
                let keep = !matches!(line, Ok(text) if text.trim().is_empty());
                async move { keep }
            })
            .then(move |line| async move {
                tokio::time::sleep(interval).await;
                line.map_err(|e| StreamError::Receive(e.to_string()))
            });
        Ok(lines.boxed())
    }
}
