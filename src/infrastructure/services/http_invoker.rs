// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::worker::Worker;
use crate::domain::services::invoker::{InvocationError, WorkerInvoker, WorkerPayload};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::debug;

/// 工作器接收任务的路径
pub const PROCESS_INTERVIEW_PATH: &str = "process-interview";

/// 基于 HTTP 的工作器调用实现
///
/// 每次分派向 `{worker.url}/process-interview` 发送一次 POST，
/// 收到 2xx 即视为交接成功，不等待处理结果
pub struct HttpWorkerInvoker {
    /// HTTP 客户端
    client: reqwest::Client,
}

impl HttpWorkerInvoker {
    /// 创建新的调用器
    ///
    /// # 参数
    ///
    /// * `timeout` - 单次调用的超时时间
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self { client }
    }

    fn endpoint(worker: &Worker) -> String {
        format!(
            "{}/{}",
            worker.url.trim_end_matches('/'),
            PROCESS_INTERVIEW_PATH
        )
    }
}

#[async_trait]
impl WorkerInvoker for HttpWorkerInvoker {
    async fn invoke(
        &self,
        worker: &Worker,
        payload: &WorkerPayload,
    ) -> Result<(), InvocationError> {
        let url = Self::endpoint(worker);
        let started = Instant::now();

        let result = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("X-Dispatch-Task-ID", payload.task_id.to_string())
            .json(payload)
            .send()
            .await;

        metrics::histogram!("worker_invocation_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        let response = result.map_err(|e| InvocationError::Transport(e.to_string()))?;
        let status = response.status();
        debug!("Worker {} answered {} for task {}", worker.id, status, payload.task_id);

        if status.is_success() {
            Ok(())
        } else {
            Err(InvocationError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}
