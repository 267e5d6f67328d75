//! Region-aware HTTP API
//!
//! Every request passes the region gate first: writes on a replica and
//! requests for another region are answered with a replay header and no
//! handler runs. Everything else reaches the counter API.

use crate::application::StreamSession;
use crate::domain::entities::Snapshot;
use crate::domain::ports::CounterStore;
use crate::domain::services::{Broadcaster, RegionRouter, ReplayReason, RouteDecision};
use crate::domain::value_objects::Region;
use crate::infrastructure::ShutdownController;
use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Header asking the edge to replay the request in another region.
pub const REPLAY_HEADER: &str = "fly-replay";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CounterStore>,
    pub broadcaster: Arc<Broadcaster>,
    pub router: Arc<RegionRouter>,
    pub regions: Arc<Vec<Region>>,
    pub shutdown: ShutdownController,
    /// Interval between SSE keep-alive comments
    pub keep_alive: Duration,
}

/// Error body for API failures.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub struct HttpServer {
    listen_addr: String,
    state: AppState,
}

impl HttpServer {
    pub fn new(listen_addr: String, state: AppState) -> Self {
        Self { listen_addr, state }
    }

    pub fn app(&self) -> Router {
        app(self.state.clone())
    }

    /// Bind and serve until shutdown is initiated.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        tracing::info!("listening on {}", self.listen_addr);
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        let shutdown = self.state.shutdown.clone();
        axum::serve(listener, self.app())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;
        Ok(())
    }
}

/// Build the API router with the region gate applied to all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/regions",
            get(regions_handler).fallback(method_not_allowed),
        )
        .route("/api/inc", post(inc_handler).fallback(method_not_allowed))
        .route(
            "/api/stream",
            get(stream_handler).fallback(method_not_allowed),
        )
        .layer(middleware::from_fn_with_state(state.clone(), region_gate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn region_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path();
    if path == "/" || path.starts_with("/api") {
        tracing::info!(
            method = %request.method(),
            path = %path,
            query = request.uri().query().unwrap_or(""),
            "http request"
        );
    }

    let requested = requested_region(request.uri());
    let mutating = !request.method().is_safe();

    match state.router.decide(mutating, requested.as_deref()) {
        RouteDecision::Local => next.run(request).await,
        RouteDecision::Replay { region, reason } => {
            let value = match HeaderValue::from_str(&format!("region={}", region)) {
                Ok(value) => value,
                Err(_) => {
                    tracing::warn!(region = ?region.as_str(), "cannot replay to invalid region, serving locally");
                    return next.run(request).await;
                }
            };
            match reason {
                ReplayReason::WriteToPrimary => {
                    tracing::info!(%region, "redirecting to primary")
                }
                ReplayReason::Requested => tracing::info!(%region, "redirecting to region"),
            }
            (
                StatusCode::OK,
                [(HeaderName::from_static(REPLAY_HEADER), value)],
            )
                .into_response()
        }
    }
}

/// First `region` value in the query string, if any.
fn requested_region(uri: &Uri) -> Option<String> {
    let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri).ok()?;
    pairs
        .into_iter()
        .find(|(key, _)| key == "region")
        .map(|(_, value)| value)
}

fn http_error(method: &Method, uri: &Uri, error: String, status: StatusCode) -> Response {
    tracing::warn!("http error: {} {}: {}", method, uri, error);
    (status, Json(ErrorResponse { error })).into_response()
}

async fn method_not_allowed(method: Method, uri: Uri) -> Response {
    http_error(
        &method,
        &uri,
        "Method not allowed".to_string(),
        StatusCode::METHOD_NOT_ALLOWED,
    )
}

async fn regions_handler(State(state): State<AppState>) -> Json<Vec<Region>> {
    Json(state.regions.as_ref().clone())
}

async fn inc_handler(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    match state.store.increment(Utc::now()).await {
        Ok(()) => Json(serde_json::json!({})).into_response(),
        Err(e) => http_error(
            &method,
            &uri,
            format!("{:#}", e),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    }
}

fn update_event(snapshot: &Snapshot) -> Result<Event, axum::Error> {
    Event::default().event("update").json_data(snapshot.to_event())
}

async fn stream_handler(State(state): State<AppState>) -> Response {
    let session = StreamSession::open(state.broadcaster.clone(), state.shutdown.clone());
    let id = session.id();

    let events = session
        .into_stream()
        .map(|snapshot| update_event(&snapshot))
        .take_while(move |event| {
            if let Err(e) = event {
                tracing::warn!(session = %id, "cannot encode update event: {}", e);
            }
            futures::future::ready(event.is_ok())
        });

    let mut response = Sse::new(events)
        .keep_alive(KeepAlive::new().interval(state.keep_alive))
        .into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
