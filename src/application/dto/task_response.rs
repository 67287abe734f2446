// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::worker::Worker;
use serde::Serialize;

/// 工作器列表响应DTO
#[derive(Debug, Serialize)]
pub struct WorkerListResponseDto {
    pub total: usize,
    pub available: usize,
    pub workers: Vec<Worker>,
}

impl From<Vec<Worker>> for WorkerListResponseDto {
    fn from(workers: Vec<Worker>) -> Self {
        let available = workers.iter().filter(|w| w.is_available()).count();
        Self {
            total: workers.len(),
            available,
            workers,
        }
    }
}

/// 评估触发响应DTO
#[derive(Debug, Serialize)]
pub struct EvaluationTriggerResponseDto {
    /// 请求已受理，评估在后台运行
    pub accepted: bool,
    /// 受理时是否已有评估在运行
    pub evaluation_running: bool,
}
