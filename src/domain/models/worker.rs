// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 处理工作器实体
///
/// 外部的视频处理进程，同一时间最多处理一个任务。
/// BUSY 的工作器恰好绑定一个执行中任务，AVAILABLE 的工作器不绑定任何任务。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    /// 工作器唯一标识符
    pub id: Uuid,
    /// 工作器名称
    pub name: String,
    /// 工作器服务地址
    pub url: String,
    /// 工作器状态
    pub status: WorkerStatus,
    /// 当前绑定的任务
    pub current_task_id: Option<Uuid>,
    /// 注册时间，负载相同时先注册者优先
    pub registered_at: DateTime<FixedOffset>,
    /// 更新时间
    pub updated_at: DateTime<FixedOffset>,
}

/// 工作器状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerStatus {
    /// 空闲
    #[default]
    Available,
    /// 忙碌
    Busy,
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WorkerStatus::Available => write!(f, "AVAILABLE"),
            WorkerStatus::Busy => write!(f, "BUSY"),
        }
    }
}

impl FromStr for WorkerStatus {
    type Err = ();

    /// 兼容旧数据中的 WAITING / ACTIVE 状态
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" | "WAITING" => Ok(WorkerStatus::Available),
            "BUSY" | "ACTIVE" => Ok(WorkerStatus::Busy),
            _ => Err(()),
        }
    }
}

impl Worker {
    /// 注册一个新的空闲工作器
    ///
    /// # 参数
    ///
    /// * `name` - 工作器名称
    /// * `url` - 工作器服务地址
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        let now: DateTime<FixedOffset> = Utc::now().into();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            url: url.into(),
            status: WorkerStatus::Available,
            current_task_id: None,
            registered_at: now,
            updated_at: now,
        }
    }

    /// 是否空闲
    pub fn is_available(&self) -> bool {
        self.status == WorkerStatus::Available
    }
}
