use serde::{Deserialize, Serialize};

use crate::board::{BoardSpec, Frame, RulesetKind};

/// 事件流中的原始消息结构 `{"Type": ..., "Data": ...}`
#[derive(Debug, Serialize, Deserialize)]
pub struct StreamEnvelope {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Data", default)]
    pub data: serde_json::Value,
}

/// 解码后的事件
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Frame(Frame),
    GameEnd,
    /// 未识别的消息类型，只记录日志
    Unknown(String),
}

impl StreamEvent {
    pub const FRAME: &'static str = "frame";
    pub const GAME_END: &'static str = "game_end";

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        let envelope: StreamEnvelope = serde_json::from_str(text)?;
        match envelope.kind.as_str() {
            Self::FRAME => Ok(StreamEvent::Frame(serde_json::from_value(envelope.data)?)),
            // game_end 的 Data 不需要解析
            Self::GAME_END => Ok(StreamEvent::GameEnd),
            _ => Ok(StreamEvent::Unknown(envelope.kind)),
        }
    }
}

/// `GET /games/{id}` 的响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameInfoResponse {
    #[serde(rename = "Game")]
    pub game: GameInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GameInfo {
    #[serde(default, rename = "ID")]
    pub id: String,
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub ruleset: RulesetInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesetInfo {
    pub name: String,
}

impl Default for RulesetInfo {
    fn default() -> Self {
        Self {
            name: "standard".to_string(),
        }
    }
}

impl From<&GameInfo> for BoardSpec {
    fn from(info: &GameInfo) -> Self {
        BoardSpec::new(
            info.width,
            info.height,
            RulesetKind::from_name(&info.ruleset.name),
        )
    }
}
