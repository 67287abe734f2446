// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施服务模块
///
/// 提供工作器调用、媒体地址签名与 LLM 评估的具体实现
pub mod hmac_media_signer;
pub mod http_invoker;
pub mod llm_evaluation_provider;
