// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::queue::reconciler::{ReportedStatus, StatusUpdate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// 失败原因的最大长度
pub const MAX_REASON_LENGTH: u64 = 2000;

/// 任务失败回调请求DTO
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct FailedCallbackRequestDto {
    /// 失败原因
    #[validate(length(min = 1, max = 2000))]
    pub reason: String,
}

/// 通用状态回调请求DTO
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct StatusCallbackRequestDto {
    /// 工作器报告的状态
    pub status: ReportedStatus,

    /// 可选的失败原因
    #[validate(length(max = 2000))]
    pub reason: Option<String>,
}

/// 空闲回调的查询参数
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WorkerIdleQuery {
    /// 工作器刚结束的任务
    pub after_task: Option<Uuid>,
}

impl From<StatusCallbackRequestDto> for StatusUpdate {
    fn from(dto: StatusCallbackRequestDto) -> Self {
        StatusUpdate {
            status: dto.status,
            reason: dto.reason,
        }
    }
}
