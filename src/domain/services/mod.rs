// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 该模块定义调度核心依赖的外部协作方接口，以及不依赖具体技术的领域服务：
/// - 评估服务（evaluation_provider）：LLM评估接口
/// - 调用器（invoker）：向外部工作器交接任务的接口与请求结构
/// - 媒体签名（media_signer）：生成有时效的视频地址
/// - 请求构建（payload_builder）：组装发给工作器的请求
pub mod evaluation_provider;
pub mod invoker;
pub mod media_signer;
pub mod payload_builder;
