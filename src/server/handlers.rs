//! HTTP request handlers for the web server.

use std::convert::Infallible;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::{CancellationToken, DropGuard};

use super::AppState;
use crate::events::{EventLog, SpiderEvent};
use crate::models::ScrapeRequest;

/// Final frame of every event stream.
pub const FINISHED_MESSAGE: &str = "spider task finished";

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreated {
    pub task_id: String,
}

/// Validate and store a batch; the run starts when its stream is opened.
pub async fn submit_task(
    State(state): State<AppState>,
    body: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.body_text()),
    };
    if let Err(e) = request.validate() {
        return error_response(StatusCode::BAD_REQUEST, e.to_string());
    }

    let task_id = state.tasks.insert(request);
    tracing::debug!("Stored task {}", task_id);
    Json(TaskCreated { task_id }).into_response()
}

/// SSE frames cannot carry carriage returns.
fn sse_event(line: &str) -> Event {
    Event::default().data(line.replace('\r', ""))
}

struct StreamState {
    rx: UnboundedReceiver<SpiderEvent>,
    /// Cancels the run if the client goes away before it finishes.
    cancel_on_drop: Option<DropGuard>,
    done: bool,
}

fn event_stream(
    rx: UnboundedReceiver<SpiderEvent>,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let state = StreamState {
        rx,
        cancel_on_drop: Some(cancel.drop_guard()),
        done: false,
    };
    stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }
        loop {
            match state.rx.recv().await {
                Some(SpiderEvent::Log(line)) => return Some((Ok(sse_event(&line)), state)),
                Some(SpiderEvent::Finished) | None => {
                    if let Some(guard) = state.cancel_on_drop.take() {
                        guard.disarm();
                    }
                    state.done = true;
                    return Some((Ok(sse_event(FINISHED_MESSAGE)), state));
                }
                Some(_) => continue,
            }
        }
    })
}

/// Claim a task, start its run and stream the run's log lines.
pub async fn stream_task(State(state): State<AppState>, Path(task_id): Path<String>) -> Response {
    let Some(request) = state.tasks.claim(&task_id) else {
        return error_response(StatusCode::NOT_FOUND, "Task not found");
    };

    let (log, rx) = EventLog::channel();
    let cancel = CancellationToken::new();
    let spider = state.spider.clone();
    let run_cancel = cancel.clone();
    tokio::spawn(async move {
        spider.run(request, log, run_cancel).await;
    });

    Sse::new(event_stream(rx, cancel))
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Download the output workbook.
pub async fn download(State(state): State<AppState>) -> Response {
    match state.spider.sink().read_output().await {
        Ok(Some(bytes)) => (
            [
                (header::CONTENT_TYPE, XLSX_CONTENT_TYPE),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"output.xlsx\"",
                ),
            ],
            bytes,
        )
            .into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "No output workbook yet"),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

fn default_headless() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct StoreRequest {
    pub url: String,
    #[serde(default = "default_headless")]
    pub headless: bool,
}

#[derive(Debug, Serialize)]
pub struct StoreAsins {
    pub asins: Vec<String>,
}

/// Harvest product ASINs from a storefront page.
pub async fn store_asins(
    State(state): State<AppState>,
    body: Result<Json<StoreRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.body_text()),
    };
    if url::Url::parse(&request.url).is_err() {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("invalid URL '{}'", request.url),
        );
    }

    match state
        .spider
        .spider_asin_from_store_url(
            &request.url,
            request.headless,
            EventLog::detached(),
            CancellationToken::new(),
        )
        .await
    {
        Ok(asins) => Json(StoreAsins { asins }).into_response(),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, e.to_string()),
    }
}
