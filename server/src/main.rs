use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use arena_display::{
    config::{DisplayConfig, SurfaceKind},
    engine::{GameEngine, HttpGameEngine, ReplayEngine},
    events::{DisplayEvent, EventBus},
    game_queue::GameQueue,
    http::{AppState, router},
    renderer::{FrameRenderer, Presenter, RenderPool},
    stats::{DisplayStats, StatsCollector},
    strategy::StaticStrategy,
    surface::{DisplaySurface, MemorySurface},
    terminal::TerminalSurface,
};
use clap::{Parser, Subcommand};
use common::{
    message::{GameInfo, RulesetInfo},
    webhook::Direction,
};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const REPLAY_GAME_ID: &str = "replay";

#[derive(Debug, Parser)]
#[command(name = "arena-display", version, about = "在点阵屏上播放对局")]
struct Cli {
    /// TOML 配置文件
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// 覆盖配置中的监听端口
    #[arg(long)]
    port: Option<u16>,
    /// 覆盖配置中的显示设备
    #[arg(long, value_enum)]
    surface: Option<SurfaceKind>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 启动 webhook 服务，等待登记游戏
    Serve,
    /// 播放本地录制的事件流，每行一条消息
    Replay {
        file: PathBuf,
        #[arg(long, default_value_t = 11)]
        width: i32,
        #[arg(long, default_value_t = 11)]
        height: i32,
        #[arg(long, default_value = "standard")]
        ruleset: String,
        /// 两条消息之间的间隔
        #[arg(long, default_value_t = 150)]
        interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = DisplayConfig::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(kind) = cli.surface {
        config.surface.kind = kind;
    }

    let event_bus = EventBus::new();
    let stats = Arc::new(DisplayStats::default());
    let mut collector = StatsCollector::new(stats.clone(), event_bus.clone());
    tokio::spawn(async move {
        collector.run().await;
    });

    let render_pool = build_render_pool(&config, event_bus.clone())?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, render_pool, event_bus, stats).await,
        Command::Replay {
            file,
            width,
            height,
            ruleset,
            interval_ms,
        } => {
            let game = GameInfo {
                id: REPLAY_GAME_ID.to_string(),
                width,
                height,
                ruleset: RulesetInfo { name: ruleset },
            };
            let engine = ReplayEngine::new(file, game, Duration::from_millis(interval_ms));
            replay(Arc::new(engine), render_pool, event_bus).await
        }
    }
}

fn build_render_pool(config: &DisplayConfig, event_bus: EventBus) -> anyhow::Result<RenderPool> {
    let size = config.surface.size();
    let surface: Box<dyn DisplaySurface> = match config.surface.kind {
        SurfaceKind::Terminal => {
            Box::new(TerminalSurface::new(size).context("无法初始化终端显示")?)
        }
        SurfaceKind::Memory => Box::new(MemorySurface::new(size)),
    };
    info!(
        "[Main] 显示设备 {:?}，{}x{}",
        config.surface.kind, size.columns, size.rows
    );
    let presenter = Arc::new(Presenter::new(surface));
    let renderer = FrameRenderer::new(presenter, config.palette);
    Ok(RenderPool::new(renderer, config.render.workers, event_bus))
}

async fn serve(
    config: DisplayConfig,
    render_pool: RenderPool,
    event_bus: EventBus,
    stats: Arc<DisplayStats>,
) -> anyhow::Result<()> {
    let engine = HttpGameEngine::new(
        &config.engine.api_base,
        &config.engine.stream_base,
        config.engine.timeouts(),
    )
    .context("无法创建 HTTP 客户端")?;
    let queue = GameQueue::new(Arc::new(engine), render_pool, event_bus);
    let state = AppState {
        queue,
        strategy: Arc::new(StaticStrategy::new(config.snake.clone(), Direction::Up)),
        stats,
    };

    let listener = TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .with_context(|| format!("无法监听 {}:{}", config.server.host, config.server.port))?;
    info!("[Main] 服务器启动成功，监听 {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("[Main] 收到退出信号");
        })
        .await?;
    Ok(())
}

/// 播放单局录像，直到结束或失败
async fn replay(
    engine: Arc<dyn GameEngine>,
    render_pool: RenderPool,
    event_bus: EventBus,
) -> anyhow::Result<()> {
    let mut events = event_bus.subscribe();
    let queue = GameQueue::new(engine, render_pool, event_bus);
    queue.enqueue(REPLAY_GAME_ID).await;

    loop {
        match events.recv().await {
            Ok(DisplayEvent::GameEnded { game_id }) if game_id == REPLAY_GAME_ID => {
                info!("[Main] 录像播放完毕");
                return Ok(());
            }
            Ok(DisplayEvent::StreamFailed { game_id, reason }) if game_id == REPLAY_GAME_ID => {
                anyhow::bail!("录像播放失败: {}", reason);
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("[Main] 丢失 {} 个事件", n);
            }
            Err(broadcast::error::RecvError::Closed) => {
                anyhow::bail!("事件总线已关闭");
            }
        }
    }
}
