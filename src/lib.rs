// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// HTTP 接口使用的数据传输对象
pub mod application;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含核心业务实体、服务和仓库接口
pub mod domain;

/// 基础设施模块
///
/// 提供外部服务集成，如数据库、工作器调用、LLM 与指标导出
pub mod infrastructure;

/// 表示层模块
///
/// 处理HTTP请求和响应，包括路由和处理器
pub mod presentation;

/// 队列模块
///
/// 实现任务分派、回调协调和周期巡检
pub mod queue;

/// 工具模块
///
/// 提供错误类型与日志初始化
pub mod utils;

/// 工作器模块
///
/// 实现评估触发器
pub mod workers;
