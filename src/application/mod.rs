// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 定义 HTTP 接口与领域层之间传输的数据对象
pub mod dto;
