// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// 任务实体
///
/// 表示与一场面试绑定的一个工作单元。处理流水线与评估流水线
/// 各自拥有独立的任务记录，二者引用同一场面试。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// 任务唯一标识符
    pub id: Uuid,
    /// 关联的面试ID
    pub interview_id: Uuid,
    /// 所属流水线
    pub pipeline: Pipeline,
    /// 任务状态
    pub status: TaskStatus,
    /// 最近一次绑定的工作器，执行中时即为当前绑定
    pub worker_id: Option<Uuid>,
    /// 已分派次数
    pub attempt_count: i32,
    /// 最近一次失败原因
    pub last_error: Option<String>,
    /// 创建时间，决定FIFO顺序
    pub created_at: DateTime<FixedOffset>,
    /// 最近一次进入执行中状态的时间
    pub started_at: Option<DateTime<FixedOffset>>,
    /// 进入完成或失败状态的时间
    pub completed_at: Option<DateTime<FixedOffset>>,
    /// 更新时间
    pub updated_at: DateTime<FixedOffset>,
}

/// 流水线枚举
///
/// 处理与评估两条流水线结构相同，仅状态词汇不同
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Pipeline {
    /// 视频处理流水线，由外部工作器执行
    #[default]
    Processing,
    /// 评估流水线，由LLM执行
    Evaluation,
}

impl Pipeline {
    /// 入口就绪状态，同时也是显式重试的目标状态
    pub fn entry_status(self) -> TaskStatus {
        match self {
            Pipeline::Processing => TaskStatus::Pending,
            Pipeline::Evaluation => TaskStatus::Processed,
        }
    }

    /// 执行中状态
    pub fn in_flight_status(self) -> TaskStatus {
        match self {
            Pipeline::Processing => TaskStatus::Processing,
            Pipeline::Evaluation => TaskStatus::Evaluating,
        }
    }

    /// 成功完成状态
    pub fn done_status(self) -> TaskStatus {
        match self {
            Pipeline::Processing => TaskStatus::Processed,
            Pipeline::Evaluation => TaskStatus::Evaluated,
        }
    }

    /// 失败状态
    pub fn failed_status(self) -> TaskStatus {
        match self {
            Pipeline::Processing => TaskStatus::FailedProcessing,
            Pipeline::Evaluation => TaskStatus::FailedEvaluation,
        }
    }

    /// 就绪状态集合
    pub fn ready_statuses(self) -> [TaskStatus; 2] {
        [self.entry_status(), self.failed_status()]
    }

    /// 判断状态是否属于该流水线的就绪集合
    pub fn is_ready(self, status: TaskStatus) -> bool {
        self.ready_statuses().contains(&status)
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Pipeline::Processing => write!(f, "processing"),
            Pipeline::Evaluation => write!(f, "evaluation"),
        }
    }
}

impl FromStr for Pipeline {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Pipeline::Processing),
            "evaluation" => Ok(Pipeline::Evaluation),
            _ => Err(()),
        }
    }
}

/// 任务状态枚举
///
/// 处理流水线：PENDING → PROCESSING → PROCESSED | FAILED_PROCESSING
/// 评估流水线：PROCESSED → EVALUATING → EVALUATED | FAILED_EVALUATION
/// 失败状态可通过显式重试回到入口状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// 等待分派
    #[default]
    Pending,
    /// 工作器处理中
    Processing,
    /// 处理完成，同时是评估任务的入口状态
    Processed,
    /// 处理失败
    FailedProcessing,
    /// 评估中
    Evaluating,
    /// 评估完成
    Evaluated,
    /// 评估失败
    FailedEvaluation,
}

impl TaskStatus {
    /// 是否为执行中状态
    pub fn is_in_flight(self) -> bool {
        matches!(self, TaskStatus::Processing | TaskStatus::Evaluating)
    }

    /// 是否为失败状态
    pub fn is_failed(self) -> bool {
        matches!(
            self,
            TaskStatus::FailedProcessing | TaskStatus::FailedEvaluation
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "PENDING"),
            TaskStatus::Processing => write!(f, "PROCESSING"),
            TaskStatus::Processed => write!(f, "PROCESSED"),
            TaskStatus::FailedProcessing => write!(f, "FAILED_PROCESSING"),
            TaskStatus::Evaluating => write!(f, "EVALUATING"),
            TaskStatus::Evaluated => write!(f, "EVALUATED"),
            TaskStatus::FailedEvaluation => write!(f, "FAILED_EVALUATION"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TaskStatus::Pending),
            "PROCESSING" => Ok(TaskStatus::Processing),
            "PROCESSED" => Ok(TaskStatus::Processed),
            "FAILED_PROCESSING" => Ok(TaskStatus::FailedProcessing),
            "EVALUATING" => Ok(TaskStatus::Evaluating),
            "EVALUATED" => Ok(TaskStatus::Evaluated),
            "FAILED_EVALUATION" => Ok(TaskStatus::FailedEvaluation),
            _ => Err(()),
        }
    }
}

/// 领域错误类型
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    /// 无效的状态转换
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: TaskStatus, to: TaskStatus },

    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl Task {
    /// 创建一个新的任务
    ///
    /// 任务以所在流水线的入口状态创建
    ///
    /// # 参数
    ///
    /// * `interview_id` - 关联的面试ID
    /// * `pipeline` - 所属流水线
    ///
    /// # 返回值
    ///
    /// 返回新创建的任务实例
    pub fn new(interview_id: Uuid, pipeline: Pipeline) -> Self {
        let now: DateTime<FixedOffset> = Utc::now().into();
        Self {
            id: Uuid::new_v4(),
            interview_id,
            pipeline,
            status: pipeline.entry_status(),
            worker_id: None,
            attempt_count: 0,
            last_error: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    /// 是否处于就绪状态
    pub fn is_ready(&self) -> bool {
        self.pipeline.is_ready(self.status)
    }

    /// 在给定的自动重试上限下是否可被分派
    ///
    /// 入口状态始终可分派；失败状态只在分派次数低于上限时可分派，
    /// 超过上限后必须等待显式重试
    pub fn is_dispatchable(&self, max_auto_attempts: i32) -> bool {
        if self.status == self.pipeline.entry_status() {
            return true;
        }
        self.status == self.pipeline.failed_status() && self.attempt_count < max_auto_attempts
    }

    /// 绑定到工作器并进入执行中状态
    ///
    /// 上一次的失败原因会被清除
    ///
    /// # 参数
    ///
    /// * `worker_id` - 工作器ID，评估流水线没有外部工作器时为 None
    ///
    /// # 返回值
    ///
    /// * `Ok(Task)` - 进入执行中状态的任务
    /// * `Err(DomainError)` - 当前状态不在就绪集合中
    pub fn start(mut self, worker_id: Option<Uuid>) -> Result<Self, DomainError> {
        if !self.is_ready() {
            return Err(self.invalid(self.pipeline.in_flight_status()));
        }
        let now: DateTime<FixedOffset> = Utc::now().into();
        self.status = self.pipeline.in_flight_status();
        if worker_id.is_some() {
            self.worker_id = worker_id;
        }
        self.attempt_count += 1;
        self.last_error = None;
        self.started_at = Some(now);
        self.completed_at = None;
        self.updated_at = now;
        Ok(self)
    }

    /// 完成任务
    pub fn complete(mut self) -> Result<Self, DomainError> {
        if self.status != self.pipeline.in_flight_status() {
            return Err(self.invalid(self.pipeline.done_status()));
        }
        let now: DateTime<FixedOffset> = Utc::now().into();
        self.status = self.pipeline.done_status();
        self.last_error = None;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(self)
    }

    /// 标记任务失败
    ///
    /// # 参数
    ///
    /// * `reason` - 失败原因
    pub fn fail(mut self, reason: impl Into<String>) -> Result<Self, DomainError> {
        if self.status != self.pipeline.in_flight_status() {
            return Err(self.invalid(self.pipeline.failed_status()));
        }
        let now: DateTime<FixedOffset> = Utc::now().into();
        self.status = self.pipeline.failed_status();
        self.last_error = Some(reason.into());
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(self)
    }

    /// 显式重试，失败状态回到入口状态
    pub fn retry(mut self) -> Result<Self, DomainError> {
        if self.status != self.pipeline.failed_status() {
            return Err(self.invalid(self.pipeline.entry_status()));
        }
        self.status = self.pipeline.entry_status();
        self.last_error = None;
        self.completed_at = None;
        self.updated_at = Utc::now().into();
        Ok(self)
    }

    /// 执行超时后收回，回到入口状态等待重新分派
    ///
    /// # 参数
    ///
    /// * `reason` - 记录到 `last_error` 的原因
    pub fn reclaim(mut self, reason: impl Into<String>) -> Result<Self, DomainError> {
        if self.status != self.pipeline.in_flight_status() {
            return Err(self.invalid(self.pipeline.entry_status()));
        }
        self.status = self.pipeline.entry_status();
        self.last_error = Some(reason.into());
        self.updated_at = Utc::now().into();
        Ok(self)
    }

    fn invalid(&self, to: TaskStatus) -> DomainError {
        DomainError::InvalidStateTransition {
            from: self.status,
            to,
        }
    }
}
