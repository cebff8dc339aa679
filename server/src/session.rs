use common::board::BoardSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Queued,
    Active,
    Ended,
}

/// 一局游戏从入队到结束的记录，只由 `GameQueue` 持有和修改
#[derive(Debug, Clone)]
pub struct GameSession {
    game_id: String,
    /// 元数据查询完成之前为空
    board: Option<BoardSpec>,
    status: SessionStatus,
}

impl GameSession {
    pub fn new(game_id: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            board: None,
            status: SessionStatus::Queued,
        }
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn board(&self) -> Option<&BoardSpec> {
        self.board.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub(crate) fn activate(&mut self) {
        if self.status == SessionStatus::Queued {
            self.status = SessionStatus::Active;
        }
    }

    pub(crate) fn end(&mut self) {
        self.status = SessionStatus::Ended;
    }

    /// 棋盘信息在会话开始时只设置一次
    pub(crate) fn attach_board(&mut self, board: BoardSpec) -> bool {
        if self.board.is_some() {
            return false;
        }
        self.board = Some(board);
        true
    }
}

#[cfg(test)]
mod test {
    use common::board::RulesetKind;

    use super::*;

    #[test]
    fn test_lifecycle() {
        let mut session = GameSession::new("g1");
        assert_eq!(session.status(), SessionStatus::Queued);
        session.activate();
        assert!(session.is_active());
        session.end();
        assert_eq!(session.status(), SessionStatus::Ended);
        // 已结束的会话不能再次激活
        session.activate();
        assert_eq!(session.status(), SessionStatus::Ended);
    }

    #[test]
    fn test_board_set_once() {
        let mut session = GameSession::new("g1");
        assert!(session.attach_board(BoardSpec::new(11, 11, RulesetKind::Standard)));
        assert!(!session.attach_board(BoardSpec::new(7, 7, RulesetKind::Wrapped)));
        assert_eq!(session.board().unwrap().width, 11);
    }
}
