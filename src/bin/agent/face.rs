use std::convert::Infallible;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use plan_engine::{Browser, BroadcastSink, EngineEvent, Plan};
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::hands::ChromeBrowser;

/// How many ports above the requested one to try before giving up.
const PORT_FALLBACKS: u16 = 10;

/// A plan accepted over HTTP, with the token that cancels it.
pub type QueuedPlan = (Plan, CancellationToken);

/// Hands every queued plan a child of one parent token. Cancelling fires the
/// parent, reaching the running plan and everything still queued, then starts
/// a fresh parent for later plans.
#[derive(Debug, Clone, Default)]
pub struct CancelScope {
    parent: Arc<Mutex<CancellationToken>>,
}

impl CancelScope {
    pub async fn child(&self) -> CancellationToken {
        self.parent.lock().await.child_token()
    }

    pub async fn cancel_all(&self) {
        let mut parent = self.parent.lock().await;
        parent.cancel();
        *parent = CancellationToken::new();
    }
}

#[derive(Clone)]
pub struct AppState {
    pub plan_tx: mpsc::Sender<QueuedPlan>,
    pub events: BroadcastSink,
    pub cancel: CancelScope,
    pub browser: ChromeBrowser,
}

fn sse_event(event: &EngineEvent) -> Option<Event> {
    let name = match event {
        EngineEvent::Step(_) => "step",
        EngineEvent::Finished(_) => "finished",
    };
    let data = serde_json::to_string(event).ok()?;
    Some(Event::default().event(name).data(data))
}

/// Serve the control API on the first free port from `port` upward.
pub async fn start_server(port: u16, state: AppState) -> Result<()> {
    let app = Router::new()
        .route("/plan", post(plan_handler))
        .route("/cancel", post(cancel_handler))
        .route("/events", get(sse_handler))
        .route("/screenshot", get(screenshot_handler))
        .with_state(Arc::new(state));

    let mut bound = None;
    for p in port..port.saturating_add(PORT_FALLBACKS) {
        match tokio::net::TcpListener::bind(("127.0.0.1", p)).await {
            Ok(listener) => {
                bound = Some((listener, p));
                break;
            }
            Err(e) => warn!(port = p, error = %e, "port unavailable"),
        }
    }
    let (listener, port) = bound.ok_or_else(|| {
        let last = port.saturating_add(PORT_FALLBACKS);
        anyhow!("could not bind any port in {port}..{last}")
    })?;

    info!("control API listening on http://localhost:{port}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!(error = %e, "control API stopped");
        }
    });

    Ok(())
}

async fn plan_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> Response {
    let plan = match Plan::from_value(&payload) {
        Ok(plan) => plan,
        Err(e) => {
            info!(error = %e, "rejected plan");
            let body = json!({ "error": e.to_string(), "problems": e.problems() });
            return (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response();
        }
    };

    let steps = plan.len();
    let token = state.cancel.child().await;
    match state.plan_tx.try_send((plan, token)) {
        Ok(()) => {
            info!(steps, "plan queued");
            (StatusCode::ACCEPTED, Json(json!({ "queued": steps }))).into_response()
        }
        Err(mpsc::error::TrySendError::Full(_)) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "a plan is already waiting to run" })),
        )
            .into_response(),
        Err(mpsc::error::TrySendError::Closed(_)) => {
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

async fn cancel_handler(State(state): State<Arc<AppState>>) -> &'static str {
    info!("cancel requested");
    state.cancel.cancel_all().await;
    "ok"
}

async fn sse_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => sse_event(&event).map(Ok::<_, Infallible>),
        Err(_) => None,
    });
    Sse::new(stream)
}

async fn screenshot_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.browser.screenshot().await {
        Some(bytes) => ([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
