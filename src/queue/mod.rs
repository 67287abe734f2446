// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 提供任务分派、回调状态协调与周期巡检
pub mod dispatcher;
pub mod reconciler;
pub mod scheduler;
