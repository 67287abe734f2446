// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::Duration;

/// 媒体地址签名特质
pub trait MediaUrlSigner: Send + Sync {
    /// 生成在 `ttl` 内有效的视频查看地址
    fn signed_view_url(&self, filename: &str, ttl: Duration) -> String;
}
