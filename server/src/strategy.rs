use common::webhook::{Direction, GameRequest, InfoResponse};

/// 提供外观信息和每回合移动方向，展示端本身不做决策
pub trait StrategyProvider: Send + Sync {
    fn info(&self) -> InfoResponse;

    fn choose_move(&self, request: &GameRequest) -> Direction;
}

/// 总是返回固定方向
pub struct StaticStrategy {
    info: InfoResponse,
    direction: Direction,
}

impl StaticStrategy {
    pub fn new(info: InfoResponse, direction: Direction) -> Self {
        Self { info, direction }
    }
}

impl Default for StaticStrategy {
    fn default() -> Self {
        Self::new(InfoResponse::default(), Direction::Up)
    }
}

impl StrategyProvider for StaticStrategy {
    fn info(&self) -> InfoResponse {
        self.info.clone()
    }

    fn choose_move(&self, _request: &GameRequest) -> Direction {
        self.direction
    }
}
