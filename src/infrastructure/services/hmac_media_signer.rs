// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::services::media_signer::MediaUrlSigner;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 媒体地址签名器
///
/// 生成 `{base_url}/{filename}?expires={unix}&signature={hex}` 形式的地址，
/// 签名内容为未编码的 `{filename}.{expires}`，地址中的文件名按路径段编码
pub struct HmacMediaSigner {
    base_url: Url,
    secret: String,
}

impl HmacMediaSigner {
    /// 创建签名器
    ///
    /// # 参数
    ///
    /// * `base_url` - 媒体服务基础地址
    /// * `secret` - 签名密钥
    ///
    /// # 返回值
    ///
    /// * `Ok(HmacMediaSigner)` - 签名器
    /// * `Err(url::ParseError)` - 基础地址无法解析
    pub fn new(base_url: &str, secret: impl Into<String>) -> Result<Self, url::ParseError> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            secret: secret.into(),
        })
    }

    /// 计算签名
    pub fn signature(&self, filename: &str, expires: i64) -> String {
        let message = format!("{}.{}", filename, expires);
        // HMAC accepts keys of any length
        let mut mac = match HmacSha256::new_from_slice(self.secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return String::new(),
        };
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl MediaUrlSigner for HmacMediaSigner {
    fn signed_view_url(&self, filename: &str, ttl: Duration) -> String {
        let expires = (Utc::now() + ttl).timestamp();
        let signature = self.signature(filename, expires);
        let filename = filename.trim_start_matches('/');

        let mut url = self.base_url.clone();
        match url.path_segments_mut() {
            // 逐段追加，空格、? 和 # 会被百分号编码
            Ok(mut path) => {
                path.pop_if_empty().extend(filename.split('/'));
            }
            Err(()) => {
                warn!("Media base URL {} cannot carry a path", self.base_url);
                return format!(
                    "{}/{}?expires={}&signature={}",
                    self.base_url.as_str().trim_end_matches('/'),
                    filename,
                    expires,
                    signature
                );
            }
        }
        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &signature);
        url.to_string()
    }
}
