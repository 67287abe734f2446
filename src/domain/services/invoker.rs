// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::interview::QuestionTimestamp;
use crate::domain::models::worker::Worker;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// 调用错误类型
///
/// 两种错误都表示交接未完成，任务与工作器需要回滚到分派前的状态
#[derive(Error, Debug)]
pub enum InvocationError {
    /// 网络或超时错误
    #[error("Transport error: {0}")]
    Transport(String),
    /// 工作器拒绝了请求
    #[error("Worker rejected the request with status {status}")]
    Rejected { status: u16 },
}

/// 发给工作器的处理请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerPayload {
    pub task_id: Uuid,
    pub interview_id: Uuid,
    pub timestamps: Vec<QuestionTimestamp>,
    pub video_url: String,
    pub questions: BTreeMap<String, String>,
    pub callback_urls: CallbackUrls,
}

/// 工作器回调地址
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackUrls {
    /// 处理完成
    pub on_processed: String,
    /// 状态更新
    pub on_status: String,
    /// 工作器空闲，可领取下一个任务
    pub on_next_task: String,
    /// 请求重试
    pub on_retry: String,
}

/// 工作器调用特质
///
/// 成功只代表工作器接收了任务，处理结果通过回调异步到达
#[async_trait]
pub trait WorkerInvoker: Send + Sync {
    async fn invoke(&self, worker: &Worker, payload: &WorkerPayload)
        -> Result<(), InvocationError>;
}
