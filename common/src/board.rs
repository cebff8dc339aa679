use serde::{Deserialize, Serialize};

/// 棋盘逻辑坐标，原点在左下角，y 轴向上
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    #[serde(rename = "X")]
    pub x: i32,
    #[serde(rename = "Y")]
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// 一个回合的完整棋盘快照
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Frame {
    pub turn: u32,
    #[serde(default)]
    pub food: Vec<Point>,
    #[serde(default)]
    pub hazards: Vec<Point>,
    #[serde(default)]
    pub snakes: Vec<Snake>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Snake {
    #[serde(default, rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// 蛇身，第一个元素是蛇头
    #[serde(default)]
    pub body: Vec<Point>,
    /// `#RRGGBB` 格式的颜色
    #[serde(default)]
    pub color: String,
    /// 引擎可能发送 `false`、`null` 或者死亡详情对象
    #[serde(default)]
    pub death: Option<serde_json::Value>,
}

impl Snake {
    pub fn is_alive(&self) -> bool {
        matches!(
            self.death,
            None | Some(serde_json::Value::Null) | Some(serde_json::Value::Bool(false))
        )
    }
}

/// 规则类型，`wrapped` 棋盘上下左右首尾相连
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RulesetKind {
    #[default]
    Standard,
    Wrapped,
    Other(String),
}

impl RulesetKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "standard" => RulesetKind::Standard,
            "wrapped" => RulesetKind::Wrapped,
            other => RulesetKind::Other(other.to_owned()),
        }
    }

    pub fn is_wrapped(&self) -> bool {
        matches!(self, RulesetKind::Wrapped)
    }
}

/// 一局游戏的棋盘尺寸与规则，会话开始时确定，之后不再变化
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardSpec {
    pub width: i32,
    pub height: i32,
    pub ruleset: RulesetKind,
}

impl BoardSpec {
    pub fn new(width: i32, height: i32, ruleset: RulesetKind) -> Self {
        Self {
            width,
            height,
            ruleset,
        }
    }
}
