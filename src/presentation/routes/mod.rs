// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::presentation::handlers::{callback_handler, task_handler};
use axum::{
    routing::{get, post},
    Router,
};

/// 创建应用路由
///
/// 处理器依赖通过 `Extension` 层注入
///
/// # 返回值
///
/// 返回配置好的路由
pub fn routes() -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/v1/version", get(version));

    let task_routes = Router::new()
        .route(
            "/v1/interviews/{interview_id}/tasks",
            post(task_handler::enqueue_interview),
        )
        .route("/v1/tasks/{task_id}", get(task_handler::get_task))
        .route("/v1/workers", get(task_handler::list_workers))
        .route("/v1/evaluations/run", post(task_handler::run_evaluation));

    let callback_routes = Router::new()
        .route(
            "/v1/callbacks/tasks/{task_id}/processed",
            post(callback_handler::task_processed),
        )
        .route(
            "/v1/callbacks/tasks/{task_id}/failed",
            post(callback_handler::task_failed),
        )
        .route(
            "/v1/callbacks/tasks/{task_id}/status",
            post(callback_handler::task_status),
        )
        .route(
            "/v1/callbacks/tasks/{task_id}/retry",
            post(callback_handler::task_retry),
        )
        .route(
            "/v1/callbacks/workers/{worker_id}/idle",
            post(callback_handler::worker_idle),
        );

    Router::new()
        .merge(public_routes)
        .merge(task_routes)
        .merge(callback_routes)
}

/// 健康检查端点
///
/// # 返回值
///
/// 返回"OK"字符串
pub async fn health_check() -> &'static str {
    "OK"
}

/// 版本信息端点
///
/// # 返回值
///
/// 返回应用版本号
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
