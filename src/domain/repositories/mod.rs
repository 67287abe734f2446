// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 该模块定义了领域层的仓库接口，遵循依赖倒置原则。
/// 仓库接口定义了数据持久化的抽象契约，具体实现由基础设施层提供。
///
/// 包含的仓库接口：
/// - 面试仓库（interview_repository）：读取面试快照与评估输入，回写评估结果
/// - 任务仓库（task_repository）：任务的创建、查询与条件状态更新
/// - 工作器仓库（worker_repository）：工作器的注册、占用与释放
pub mod interview_repository;
pub mod task_repository;
pub mod worker_repository;
