use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::{Form, Json};

use super::server::AppState;

const CHAT_PAGE: &str = include_str!("../templates/chat.html");

#[derive(serde::Deserialize)]
pub(crate) struct ChatForm {
    pub msg: Option<String>,
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
}

pub(crate) async fn index_handler() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

pub(crate) async fn chat_handler(State(state): State<AppState>, request: Request) -> Response {
    let msg = match read_msg(request).await {
        Ok(Some(msg)) if !msg.trim().is_empty() => msg,
        Ok(_) => {
            return (StatusCode::BAD_REQUEST, "missing form field: msg").into_response();
        }
        Err(rejection) => return rejection,
    };

    tracing::info!(question = %msg, "received question");
    match state.qa.answer(&msg).await {
        Ok(reply) => {
            tracing::info!(answer = %reply.answer, sources = ?reply.sources, "answered question");
            reply.answer.into_response()
        }
        Err(e) => {
            tracing::error!("failed to answer question: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to generate an answer",
            )
                .into_response()
        }
    }
}

/// `msg` from the query string (GET), an urlencoded body, or a multipart body.
async fn read_msg(request: Request) -> Result<Option<String>, Response> {
    let multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));
    if multipart {
        return read_multipart_msg(request).await;
    }

    match Form::<ChatForm>::from_request(request, &()).await {
        Ok(Form(form)) => Ok(form.msg),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            Err(rejection.into_response())
        }
        Err(rejection) => {
            tracing::debug!("rejected chat form: {rejection}");
            Err((StatusCode::BAD_REQUEST, "missing form field: msg").into_response())
        }
    }
}

async fn read_multipart_msg(request: Request) -> Result<Option<String>, Response> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(IntoResponse::into_response)?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(IntoResponse::into_response)?
    {
        if field.name() == Some("msg") {
            return field
                .text()
                .await
                .map(Some)
                .map_err(IntoResponse::into_response);
        }
    }
    Ok(None)
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}
