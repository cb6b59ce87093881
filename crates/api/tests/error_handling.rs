//! Tests for the mapping from domain errors to HTTP responses.

mod common;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use biolink_api::error::AppError;
use biolink_core::error::CoreError;
use biolink_pipeline::{PipelineError, StoreError};
use common::body_json;

async fn status_and_code(err: AppError) -> (StatusCode, String) {
    let response = err.into_response();
    let status = response.status();
    let json = body_json(response).await;
    (status, json["code"].as_str().unwrap_or_default().to_string())
}

#[tokio::test]
async fn core_errors_map_to_client_statuses() {
    let cases = [
        (
            AppError::Core(CoreError::Validation("bad".into())),
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
        ),
        (
            AppError::Core(CoreError::Conflict("overlap".into())),
            StatusCode::CONFLICT,
            "CONFLICT",
        ),
        (
            AppError::Core(CoreError::BlockNotFound("b1".into())),
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
        ),
    ];
    for (err, status, code) in cases {
        assert_eq!(status_and_code(err).await, (status, code.to_string()));
    }
}

#[tokio::test]
async fn internal_errors_are_sanitized() {
    let response = AppError::Core(CoreError::Internal("secret detail".into())).into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert!(!json["error"].as_str().unwrap().contains("secret"));
}

#[tokio::test]
async fn pipeline_errors_map_to_statuses() {
    assert_eq!(
        status_and_code(AppError::Pipeline(PipelineError::NotSaved)).await,
        (StatusCode::CONFLICT, "NOT_SAVED".to_string())
    );
    assert_eq!(
        status_and_code(AppError::Pipeline(PipelineError::PageGone(3))).await,
        (StatusCode::NOT_FOUND, "NOT_FOUND".to_string())
    );
}

#[tokio::test]
async fn store_errors_map_to_statuses() {
    assert_eq!(
        status_and_code(AppError::Store(StoreError::Unavailable("down".into()))).await,
        (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE".to_string())
    );
    assert_eq!(
        status_and_code(AppError::Store(StoreError::NothingToPublish(1))).await,
        (StatusCode::NOT_FOUND, "NOTHING_TO_PUBLISH".to_string())
    );
    assert_eq!(
        status_and_code(AppError::Store(StoreError::Conflict("slug".into()))).await,
        (StatusCode::CONFLICT, "CONFLICT".to_string())
    );
}

#[tokio::test]
async fn wrapped_core_errors_keep_their_status() {
    let err = AppError::Pipeline(PipelineError::Core(CoreError::Validation("nope".into())));
    assert_eq!(
        status_and_code(err).await,
        (StatusCode::BAD_REQUEST, "VALIDATION_ERROR".to_string())
    );
}
