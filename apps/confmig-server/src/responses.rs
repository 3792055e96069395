use axum::{http::StatusCode, response::IntoResponse, Json};
use confmig_core::ReadError;
use confmig_protocol::ProblemDetails;

pub fn problem(
    status: StatusCode,
    title: &str,
    detail: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        Json(ProblemDetails {
            r#type: "about:blank".to_string(),
            title: title.to_string(),
            status: status.as_u16(),
            detail: Some(detail.into()),
        }),
    )
        .into_response()
}

pub fn run_already_active(detail: impl Into<String>) -> axum::response::Response {
    problem(StatusCode::CONFLICT, "Run Already Active", detail)
}

pub fn read_error(err: &ReadError) -> axum::response::Response {
    match err {
        ReadError::Unauthorized(_) => {
            problem(StatusCode::UNAUTHORIZED, "Unauthorized", err.to_string())
        }
        ReadError::UnreachableBackend(_) => {
            problem(StatusCode::BAD_GATEWAY, "Backend Unreachable", err.to_string())
        }
    }
}
