use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::events::{DisplayEvent, EventBus};

/// 运行计数
#[derive(Debug, Default)]
pub struct DisplayStats {
    games_queued: AtomicU64,
    duplicate_games: AtomicU64,
    games_completed: AtomicU64,
    streams_failed: AtomicU64,
    frames_rendered: AtomicU64,
    stale_frames: AtomicU64,
    malformed_events: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub games_queued: u64,
    pub duplicate_games: u64,
    pub games_completed: u64,
    pub streams_failed: u64,
    pub frames_rendered: u64,
    pub stale_frames: u64,
    pub malformed_events: u64,
}

impl DisplayStats {
    pub fn record(&self, event: &DisplayEvent) {
        let counter = match event {
            DisplayEvent::GameQueued { .. } => &self.games_queued,
            DisplayEvent::DuplicateGame { .. } => &self.duplicate_games,
            DisplayEvent::GameStarted { .. } => return,
            DisplayEvent::FrameRendered { .. } => &self.frames_rendered,
            DisplayEvent::StaleFrame { .. } => &self.stale_frames,
            DisplayEvent::MalformedEvent { .. } => &self.malformed_events,
            DisplayEvent::StreamFailed { .. } => &self.streams_failed,
            DisplayEvent::GameEnded { .. } => &self.games_completed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            games_queued: self.games_queued.load(Ordering::Relaxed),
            duplicate_games: self.duplicate_games.load(Ordering::Relaxed),
            games_completed: self.games_completed.load(Ordering::Relaxed),
            streams_failed: self.streams_failed.load(Ordering::Relaxed),
            frames_rendered: self.frames_rendered.load(Ordering::Relaxed),
            stale_frames: self.stale_frames.load(Ordering::Relaxed),
            malformed_events: self.malformed_events.load(Ordering::Relaxed),
        }
    }
}

/// 订阅事件总线并累计计数
pub struct StatsCollector {
    stats: Arc<DisplayStats>,
    event_bus: EventBus,
}

impl StatsCollector {
    pub fn new(stats: Arc<DisplayStats>, event_bus: EventBus) -> Self {
        Self { stats, event_bus }
    }

    pub async fn run(&mut self) {
        info!("[StatsCollector] 启动");
        let mut recv = self.event_bus.subscribe();
        loop {
            match recv.recv().await {
                Ok(event) => {
                    debug!("[StatsCollector] {:?}", event);
                    self.stats.record(&event);
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("[StatsCollector] 处理过慢，丢失 {} 个事件", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        info!("[StatsCollector] 退出");
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;

    #[test]
    fn test_record_counts() {
        let stats = DisplayStats::default();
        stats.record(&DisplayEvent::StaleFrame {
            game_id: "g".to_string(),
            turn: 3,
        });
        stats.record(&DisplayEvent::StaleFrame {
            game_id: "g".to_string(),
            turn: 2,
        });
        stats.record(&DisplayEvent::StreamFailed {
            game_id: "g".to_string(),
            reason: "boom".to_string(),
        });
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.stale_frames, 2);
        assert_eq!(snapshot.streams_failed, 1);
        assert_eq!(snapshot.games_completed, 0);
    }

    #[tokio::test]
    async fn test_collector_subscribes() {
        let event_bus = EventBus::new();
        let stats = Arc::new(DisplayStats::default());
        let mut collector = StatsCollector::new(stats.clone(), event_bus.clone());
        tokio::spawn(async move { collector.run().await });
        // 等待订阅建立
        tokio::time::sleep(Duration::from_millis(50)).await;

        event_bus.publish(DisplayEvent::GameEnded {
            game_id: "g".to_string(),
        });

        let start_time = Instant::now();
        while stats.snapshot().games_completed == 0
            && start_time.elapsed() < Duration::from_secs(2)
        {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(stats.snapshot().games_completed, 1);
    }
}
