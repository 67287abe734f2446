// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// 面试快照
///
/// 分派处理任务时读取的面试只读视图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewSnapshot {
    /// 面试ID
    pub id: Uuid,
    /// 存储中的视频文件名
    pub filename: Option<String>,
    /// 每道题目的时间戳
    pub timestamps: Vec<QuestionTimestamp>,
}

/// 题目时间戳
///
/// 未识别的字段原样保留，转发给工作器
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionTimestamp {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_text: Option<String>,
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub end: f64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl InterviewSnapshot {
    /// 题目ID到题目文本的映射
    ///
    /// 只收录同时带有题目ID与题目文本的时间戳
    pub fn questions(&self) -> BTreeMap<String, String> {
        self.timestamps
            .iter()
            .filter_map(|t| match (&t.question_id, &t.question_text) {
                (Some(id), Some(text)) => Some((id.clone(), text.clone())),
                _ => None,
            })
            .collect()
    }
}
