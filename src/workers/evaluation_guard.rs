// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// 评估互斥锁
///
/// 进程内同一时间只允许一次评估运行。仅在单实例部署下成立，
/// 多实例部署需要改为数据库租约。
#[derive(Clone, Debug)]
pub struct EvaluationGuard {
    semaphore: Arc<Semaphore>,
}

/// 评估许可，离开作用域时自动释放
#[derive(Debug)]
pub struct EvaluationPermit {
    _permit: OwnedSemaphorePermit,
}

impl Default for EvaluationGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl EvaluationGuard {
    pub fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
        }
    }

    /// 尝试获取许可，已被持有时立即返回 None
    pub fn try_acquire(&self) -> Option<EvaluationPermit> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| EvaluationPermit { _permit: permit })
    }

    /// 是否有评估正在运行
    pub fn is_held(&self) -> bool {
        self.semaphore.available_permits() == 0
    }
}
