// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 提供评估触发器及其进程内互斥锁
pub mod evaluation_guard;
pub mod evaluation_worker;
