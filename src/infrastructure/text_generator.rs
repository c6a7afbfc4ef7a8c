//! 文本生成能力 - 基础设施层
//!
//! 流水线里所有 LLM 调用都经过 `TextGenerator`，测试里换成固定输出的替身

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::LlmError;

/// 一次结构化生成请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// 系统消息，包含输出结构约束
    pub system: String,
    /// 用户消息
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// 文本生成能力
///
/// 职责：
/// - 发送一次请求，返回解析好的 JSON
/// - 不认识订单 / 过滤条件
/// - 不重试
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<JsonValue, LlmError>;
}

/// 从模型回复中取出 JSON 对象
///
/// 兼容 ```json 代码块和前后的说明文字
pub fn parse_json_response(content: &str) -> Result<JsonValue, LlmError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(LlmError::malformed("回复为空", content));
    }

    if let Ok(value) = serde_json::from_str::<JsonValue>(trimmed) {
        return Ok(value);
    }

    let start = trimmed.find('{');
    let end = trimmed.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str(&trimmed[start..=end])
                .map_err(|e| LlmError::malformed(e.to_string(), content))
        }
        _ => Err(LlmError::malformed("回复中没有 JSON 对象", content)),
    }
}
