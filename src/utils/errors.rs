// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::task_repository::RepositoryError;
use thiserror::Error;

/// 分派核心的错误类型
///
/// 未找到、状态不匹配、调用失败都以结果值返回，
/// 只有存储层不可用这类意外情况才会成为错误
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("仓库错误: {0}")]
    Repository(#[from] RepositoryError),

    #[error("内部错误: {0}")]
    Internal(String),
}
