// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// HTTP请求处理器模块
///
/// 工作器回调与任务查询的处理逻辑
pub mod callback_handler;
pub mod task_handler;
