// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;
use validator::ValidationErrors;

use crate::domain::repositories::task_repository::RepositoryError;
use crate::utils::errors::DispatchError;

/// 应用错误类型
///
/// 封装所有可能的应用层错误，提供统一的错误处理接口
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl AppError {
    /// 对应的HTTP状态码
    pub fn status_code(&self) -> StatusCode {
        if let Some(err) = self.0.downcast_ref::<RepositoryError>() {
            return repository_status(err);
        }
        if let Some(DispatchError::Repository(err)) = self.0.downcast_ref::<DispatchError>() {
            return repository_status(err);
        }
        if self.0.downcast_ref::<ValidationErrors>().is_some() {
            return StatusCode::BAD_REQUEST;
        }
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Database(_) | RepositoryError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = self.0.to_string();
        if status.is_server_error() {
            error!("Request failed: {}", error_message);
        }

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
