use serde::{Deserialize, Serialize};

/// `/start`、`/move`、`/end` 请求体，只解析展示端关心的字段
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRequest {
    pub game: GameRef,
    pub board: BoardRef,
    #[serde(default)]
    pub you: serde_json::Value,
    #[serde(default)]
    pub turn: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRef {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardRef {
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveResponse {
    #[serde(rename = "move")]
    pub direction: Direction,
}

/// `GET /` 返回的蛇外观信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfoResponse {
    pub apiversion: String,
    pub author: String,
    pub color: String,
    pub head: String,
    pub tail: String,
}

impl Default for InfoResponse {
    fn default() -> Self {
        Self {
            apiversion: "1".to_string(),
            author: String::new(),
            color: "#888888".to_string(),
            head: "default".to_string(),
            tail: "default".to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_move_response_shape() {
        let json = serde_json::to_string(&MoveResponse {
            direction: Direction::Left,
        })
        .unwrap();
        assert_eq!(json, r#"{"move":"left"}"#);
    }

    #[test]
    fn test_game_request_minimal() {
        let raw = r#"{"game":{"id":"abc"},"board":{"width":11,"height":11},"you":{"id":"me"},"turn":4}"#;
        let request: GameRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(request.game.id, "abc");
        assert_eq!(request.board.width, 11);
        assert_eq!(request.turn, 4);
    }
}
