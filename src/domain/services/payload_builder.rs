// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::Task;
use crate::domain::models::worker::Worker;
use crate::domain::repositories::interview_repository::InterviewRepository;
use crate::domain::repositories::task_repository::RepositoryError;
use crate::domain::services::invoker::{CallbackUrls, WorkerPayload};
use crate::domain::services::media_signer::MediaUrlSigner;
use chrono::Duration;
use std::sync::Arc;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

/// 请求构建错误
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("Interview {0} not found")]
    InterviewNotFound(Uuid),
    #[error("Interview {0} has no video filename")]
    MissingFilename(Uuid),
    #[error("Interview {0} has no timestamps")]
    MissingTimestamps(Uuid),
    #[error("Invalid callback url: {0}")]
    InvalidCallbackUrl(#[from] url::ParseError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// 工作器请求构建器
///
/// 读取面试快照，签发视频地址并生成回调地址
pub struct PayloadBuilder {
    interviews: Arc<dyn InterviewRepository>,
    signer: Arc<dyn MediaUrlSigner>,
    public_base_url: Url,
    media_url_ttl: Duration,
}

impl PayloadBuilder {
    /// 创建请求构建器
    ///
    /// # 参数
    ///
    /// * `interviews` - 面试仓库
    /// * `signer` - 媒体地址签名器
    /// * `public_base_url` - 本服务对外可访问的地址，用于拼接回调
    /// * `media_url_ttl` - 视频地址有效期
    pub fn new(
        interviews: Arc<dyn InterviewRepository>,
        signer: Arc<dyn MediaUrlSigner>,
        public_base_url: Url,
        media_url_ttl: Duration,
    ) -> Self {
        Self {
            interviews,
            signer,
            public_base_url,
            media_url_ttl,
        }
    }

    /// 为已绑定的任务构建请求
    pub async fn build(
        &self,
        task: &Task,
        worker: &Worker,
    ) -> Result<WorkerPayload, PayloadError> {
        let interview = self
            .interviews
            .find_snapshot(task.interview_id)
            .await?
            .ok_or(PayloadError::InterviewNotFound(task.interview_id))?;

        let filename = interview
            .filename
            .as_deref()
            .filter(|f| !f.is_empty())
            .ok_or(PayloadError::MissingFilename(interview.id))?;

        if interview.timestamps.is_empty() {
            return Err(PayloadError::MissingTimestamps(interview.id));
        }

        let video_url = self.signer.signed_view_url(filename, self.media_url_ttl);

        Ok(WorkerPayload {
            task_id: task.id,
            interview_id: interview.id,
            questions: interview.questions(),
            timestamps: interview.timestamps,
            video_url,
            callback_urls: self.callback_urls(task.id, worker.id)?,
        })
    }

    /// 生成回调地址
    ///
    /// 空闲回调带上本任务ID，工作器已被分配新任务时旧的空闲通知会被忽略
    pub fn callback_urls(
        &self,
        task_id: Uuid,
        worker_id: Uuid,
    ) -> Result<CallbackUrls, PayloadError> {
        Ok(CallbackUrls {
            on_processed: self.join(&format!("v1/callbacks/tasks/{}/processed", task_id))?,
            on_status: self.join(&format!("v1/callbacks/tasks/{}/status", task_id))?,
            on_next_task: self.join(&format!(
                "v1/callbacks/workers/{}/idle?after_task={}",
                worker_id, task_id
            ))?,
            on_retry: self.join(&format!("v1/callbacks/tasks/{}/retry", task_id))?,
        })
    }

    fn join(&self, path: &str) -> Result<String, url::ParseError> {
        // Url::join drops the last segment unless the base ends with '/'
        let mut base = self.public_base_url.clone();
        if !base.path().ends_with('/') {
            let path_with_slash = format!("{}/", base.path());
            base.set_path(&path_with_slash);
        }
        Ok(base.join(path)?.to_string())
    }
}

#[cfg(test)]
#[path = "payload_builder_test.rs"]
mod tests;
