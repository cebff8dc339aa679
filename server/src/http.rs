use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderValue, header},
    middleware,
    response::Response,
    routing::{get, post},
};
use common::webhook::{GameRequest, InfoResponse, MoveResponse};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    game_queue::{GameQueue, QueueSnapshot},
    stats::{DisplayStats, StatsSnapshot},
    strategy::StrategyProvider,
};

pub const SERVER_NAME: &str = "BattlesnakeOfficial/starter-snake-python";

#[derive(Clone)]
pub struct AppState {
    pub queue: GameQueue,
    pub strategy: Arc<dyn StrategyProvider>,
    pub stats: Arc<DisplayStats>,
}

#[derive(Debug, Deserialize)]
pub struct InfoParams {
    #[serde(rename = "gameId")]
    game_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub queue: QueueSnapshot,
    pub counters: StatsSnapshot,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_info))
        .route("/start", post(handle_start))
        .route("/move", post(handle_move))
        .route("/end", post(handle_end))
        .route("/stats", get(handle_stats))
        .layer(middleware::map_response(identify_server))
        .with_state(state)
}

/// 登记页面访问时带上 `gameId` 就把这局游戏加入播放队列
async fn handle_info(
    State(state): State<AppState>,
    Query(params): Query<InfoParams>,
) -> Json<InfoResponse> {
    if let Some(game_id) = params.game_id.filter(|id| !id.is_empty()) {
        info!("[Webhook] INFO {}", game_id);
        state.queue.enqueue(&game_id).await;
    }
    Json(state.strategy.info())
}

async fn handle_start(Json(request): Json<GameRequest>) -> &'static str {
    info!("[Webhook] {} START", request.game.id);
    "ok"
}

async fn handle_move(
    State(state): State<AppState>,
    Json(request): Json<GameRequest>,
) -> Json<MoveResponse> {
    let direction = state.strategy.choose_move(&request);
    Json(MoveResponse { direction })
}

async fn handle_end(Json(request): Json<GameRequest>) -> &'static str {
    info!("[Webhook] {} END", request.game.id);
    "ok"
}

async fn handle_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        queue: state.queue.snapshot().await,
        counters: state.stats.snapshot(),
    })
}

async fn identify_server(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(header::SERVER, HeaderValue::from_static(SERVER_NAME));
    response
}

#[cfg(test)]
mod test {
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use common::message::GameInfo;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        engine::{EventStream, GameEngine, StreamError},
        events::EventBus,
        renderer::{FrameRenderer, Palette, Presenter, RenderPool},
        strategy::StaticStrategy,
        surface::{MemorySurface, SurfaceSize},
    };

    /// 永远查询不到元数据，事件流一直挂起
    struct IdleEngine;

    #[async_trait]
    impl GameEngine for IdleEngine {
        async fn fetch_game(&self, _game_id: &str) -> Result<GameInfo, StreamError> {
            std::future::pending().await
        }

        async fn open_stream(&self, _game_id: &str) -> Result<EventStream, StreamError> {
            std::future::pending().await
        }
    }

    fn app_state() -> AppState {
        let event_bus = EventBus::new();
        let presenter = Arc::new(Presenter::new(Box::new(MemorySurface::new(
            SurfaceSize::new(32, 16),
        ))));
        let pool = RenderPool::new(
            FrameRenderer::new(presenter, Palette::default()),
            1,
            event_bus.clone(),
        );
        AppState {
            queue: GameQueue::new(Arc::new(IdleEngine), pool, event_bus),
            strategy: Arc::new(StaticStrategy::default()),
            stats: Arc::new(DisplayStats::default()),
        }
    }

    fn game_request_body() -> Body {
        Body::from(r#"{"game":{"id":"g1"},"board":{"width":11,"height":11},"you":{},"turn":3}"#)
    }

    #[tokio::test]
    async fn test_info_enqueues_game() {
        let state = app_state();
        let app = router(state.clone());
        let response = app
            .oneshot(Request::get("/?gameId=g1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::SERVER], SERVER_NAME);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let info: InfoResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(info.apiversion, "1");

        let snapshot = state.queue.snapshot().await;
        assert_eq!(snapshot.games, vec!["g1".to_string()]);
        assert_eq!(snapshot.active.as_deref(), Some("g1"));
    }

    #[tokio::test]
    async fn test_info_without_game_id() {
        let state = app_state();
        let response = router(state.clone())
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.queue.snapshot().await.games.is_empty());
    }

    #[tokio::test]
    async fn test_move_returns_direction() {
        let response = router(app_state())
            .oneshot(
                Request::post("/move")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(game_request_body())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"move":"up"}"#);
    }

    #[tokio::test]
    async fn test_start_and_end_reply_ok() {
        for path in ["/start", "/end"] {
            let response = router(app_state())
                .oneshot(
                    Request::post(path)
                        .header(header::CONTENT_TYPE, "application/json")
                        .body(game_request_body())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()[header::SERVER], SERVER_NAME);
            let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert_eq!(&body[..], b"ok");
        }
    }

    #[tokio::test]
    async fn test_stats_reports_queue() {
        let state = app_state();
        state.queue.enqueue("g1").await;
        state.queue.enqueue("g2").await;
        let response = router(state)
            .oneshot(Request::get("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["queue"]["games"], serde_json::json!(["g1", "g2"]));
        assert_eq!(json["queue"]["active"], "g1");
        assert_eq!(json["counters"]["frames_rendered"], 0);
    }
}
