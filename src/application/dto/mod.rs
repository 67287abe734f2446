// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 数据传输对象模块
///
/// 回调请求体与查询响应
pub mod callback_request;
pub mod task_response;
