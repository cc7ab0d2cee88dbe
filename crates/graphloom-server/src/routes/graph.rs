//! Graph routes — ingest, retrieval, summaries, visualization, deletion.

use std::collections::HashMap;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;

use crate::state::AppState;
use graphloom_core::Error;

type SseStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

/// Node colours cycle through this palette per node type, in first-seen
/// order, so a type keeps its colour within one response.
const TYPE_PALETTE: &[&str] = &[
    "#4e79a7", "#f28e2b", "#e15759", "#76b7b2", "#59a14f", "#edc949", "#af7aa1", "#ff9da7",
    "#9c755f", "#bab0ab",
];

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/indices", get(list_indices))
        .route("/graph/{index}", get(get_graph).delete(delete_index))
        .route("/graph/{index}/insert", post(insert_text))
        .route("/graph/{index}/insert-chunked", post(insert_chunked))
        .route("/graph/{index}/search", post(search))
        .route("/graph/{index}/search/stream", post(search_stream))
        .route("/graph/{index}/search/community", post(search_community))
        .route("/graph/{index}/communities/rebuild", post(rebuild_communities))
        .route("/graph/{index}/global/rebuild", post(rebuild_global))
}

fn error_response(e: Error) -> (StatusCode, Json<serde_json::Value>) {
    let status = match e {
        Error::InputValidation(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": e.to_string() })))
}

// ---------------------------------------------------------------
// Indices and visualization
// ---------------------------------------------------------------

async fn list_indices(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.engine.list_indices().await {
        Ok(indices) => (StatusCode::OK, Json(serde_json::json!({ "indices": indices }))),
        Err(e) => error_response(e),
    }
}

async fn get_graph(
    State(state): State<Arc<AppState>>,
    Path(index): Path<String>,
) -> impl IntoResponse {
    let (nodes, edges) = match state.engine.graph_snapshot(&index).await {
        Ok(snapshot) => snapshot,
        Err(e) => return error_response(e),
    };

    let mut colors: HashMap<&str, &str> = HashMap::new();
    let mut next = 0usize;
    let node_values: Vec<serde_json::Value> = nodes
        .iter()
        .map(|n| {
            let color = *colors.entry(n.node_type.as_str()).or_insert_with(|| {
                let c = TYPE_PALETTE[next % TYPE_PALETTE.len()];
                next += 1;
                c
            });
            serde_json::json!({
                "id": n.id,
                "name": n.name,
                "type": n.node_type,
                "desc": n.desc,
                "color": color,
            })
        })
        .collect();

    let edge_values: Vec<serde_json::Value> = edges
        .iter()
        .map(|e| {
            serde_json::json!({
                "id": e.id,
                "source": e.source,
                "target": e.target,
                "relationship": e.relationship,
            })
        })
        .collect();

    (
        StatusCode::OK,
        Json(serde_json::json!({ "nodes": node_values, "edges": edge_values })),
    )
}

// ---------------------------------------------------------------
// Ingest
// ---------------------------------------------------------------

#[derive(Deserialize)]
struct InsertRequest {
    text: String,
}

async fn insert_text(
    State(state): State<Arc<AppState>>,
    Path(index): Path<String>,
    Json(req): Json<InsertRequest>,
) -> impl IntoResponse {
    match state.engine.insert_graph_data(&index, &req.text).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "status": "inserted" }))),
        Err(e) => error_response(e),
    }
}

async fn insert_chunked(
    State(state): State<Arc<AppState>>,
    Path(index): Path<String>,
    Json(req): Json<InsertRequest>,
) -> impl IntoResponse {
    match state.engine.insert_chunked(&index, &req.text).await {
        Ok(chunks) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "inserted", "chunks": chunks })),
        ),
        Err(e) => error_response(e),
    }
}

// ---------------------------------------------------------------
// Search
// ---------------------------------------------------------------

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
}

/// SSE stream event shapes.
#[derive(Serialize)]
#[serde(tag = "type")]
enum StreamEvent {
    #[serde(rename = "token")]
    Token { content: String },
    #[serde(rename = "error")]
    Error { error: String },
}

async fn search(
    State(state): State<Arc<AppState>>,
    Path(index): Path<String>,
    Json(req): Json<SearchRequest>,
) -> impl IntoResponse {
    match state.engine.search_graph(&index, &req.query).await {
        Ok(answer) => (StatusCode::OK, Json(serde_json::json!({ "answer": answer }))),
        Err(e) => error_response(e),
    }
}

async fn search_community(
    State(state): State<Arc<AppState>>,
    Path(index): Path<String>,
    Json(req): Json<SearchRequest>,
) -> impl IntoResponse {
    match state.engine.search_graph_community(&index, &req.query).await {
        Ok(answer) => (StatusCode::OK, Json(serde_json::json!({ "answer": answer }))),
        Err(e) => error_response(e),
    }
}

async fn search_stream(
    State(state): State<Arc<AppState>>,
    Path(index): Path<String>,
    Json(req): Json<SearchRequest>,
) -> Sse<SseStream> {
    let engine = state.engine.clone();
    let answer_stream = engine.search_graph_stream(index, req.query);

    let sse_stream: SseStream = Box::pin(async_stream::stream! {
        tokio::pin!(answer_stream);
        while let Some(fragment) = answer_stream.next().await {
            match fragment {
                Ok(content) => {
                    let event = StreamEvent::Token { content };
                    yield Ok::<_, Infallible>(Event::default().data(
                        serde_json::to_string(&event).unwrap()
                    ));
                }
                Err(e) => {
                    let event = StreamEvent::Error { error: e.to_string() };
                    yield Ok(Event::default().data(
                        serde_json::to_string(&event).unwrap()
                    ));
                    return;
                }
            }
        }
        yield Ok(Event::default().data("[DONE]".to_string()));
    });

    Sse::new(sse_stream)
}

// ---------------------------------------------------------------
// Summaries and deletion
// ---------------------------------------------------------------

async fn rebuild_communities(
    State(state): State<Arc<AppState>>,
    Path(index): Path<String>,
) -> impl IntoResponse {
    match state.engine.rebuild_communities(&index).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "status": "rebuilt" }))),
        Err(e) => error_response(e),
    }
}

async fn rebuild_global(
    State(state): State<Arc<AppState>>,
    Path(index): Path<String>,
) -> impl IntoResponse {
    match state.engine.rebuild_global(&index).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "status": "rebuilt" }))),
        Err(e) => error_response(e),
    }
}

async fn delete_index(
    State(state): State<Arc<AppState>>,
    Path(index): Path<String>,
) -> impl IntoResponse {
    match state.engine.delete_index(&index).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "deleted": true, "index": index }))),
        Err(e) => error_response(e),
    }
}
