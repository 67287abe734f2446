// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 任务（task）：处理与评估流水线中的工作单元及其状态机
/// - 工作器（worker）：外部视频处理端点
/// - 面试（interview）：分派时读取的面试快照
/// - 评估（evaluation）：LLM评估的输入与结果
pub mod evaluation;
pub mod interview;
pub mod task;
pub mod worker;
