use axum::{
    body::Body,
    extract::State,
    http::{ header, HeaderMap, StatusCode },
    response::{ IntoResponse, Response },
    routing::post,
    Json,
    Router,
};
use futures::{ stream, StreamExt };
use log::info;
use serde::{ Deserialize, Serialize };
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{ Any, CorsLayer };

use super::auth::TokenVerifier;
use super::stream::{ body_chunks, ChannelSink, SinkEvent };
use crate::pipeline::ChatTurnPipeline;

const SINK_BUFFER: usize = 32;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    details: String,
}

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ChatTurnPipeline>,
    pub verifier: Arc<dyn TokenVerifier>,
    /// Expose underlying error messages in 500 bodies (non-production only).
    pub expose_error_details: bool,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new().route("/api/chat", post(chat_handler)).layer(cors).with_state(state)
}

async fn chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ChatRequest>
) -> Response {
    let Some(user_id) = bearer_token(&headers).and_then(|token| state.verifier.verify(token))
    else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Missing or invalid bearer token".to_string(),
                details: String::new(),
            }),
        ).into_response();
    };

    info!("Chat turn started for user '{}'", user_id);

    let (mut sink, mut rx) = ChannelSink::channel(SINK_BUFFER);
    let pipeline = state.pipeline.clone();
    let prompt = req.prompt;
    tokio::spawn(async move {
        pipeline.handle_turn(&user_id, &prompt, &mut sink).await;
    });

    // Response headers are fixed by the first event: a fragment commits us to
    // a streamed 200, a pre-stream abort still allows a clean 500.
    match rx.recv().await {
        Some(SinkEvent::Fragment(first)) => {
            let body = stream
                ::iter([first])
                .chain(body_chunks(rx))
                .map(Ok::<String, Infallible>);
            streamed_response(Body::from_stream(body))
        }
        Some(SinkEvent::Abort(detail)) => {
            let details = if state.expose_error_details {
                detail
            } else {
                "Internal server error".to_string()
            };
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Failed to process chat request".to_string(),
                    details,
                }),
            ).into_response()
        }
        Some(SinkEvent::End) | None => streamed_response(Body::empty()),
    }
}

fn streamed_response(body: Body) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    ).into_response()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
