//! 订单抽取服务 - 业务能力层
//!
//! 把原始订单文本交给 LLM 转成结构化订单。
//! 估算 token 超过阈值时按连续分组切块，分块并发抽取，按分块顺序拼接。

use std::ops::Range;
use std::sync::Arc;

use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::{LlmError, PipelineError};
use crate::infrastructure::{Prompt, TextGenerator};
use crate::models::us_state::normalize_state;
use crate::models::{ParsedOrder, RawBatch};

/// 按 4 字符 ≈ 1 token 估算
const CHARS_PER_TOKEN: usize = 4;

const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are a data extraction assistant. You convert raw customer-order text into JSON.

Respond with a single JSON object and nothing else, matching this shape:
{"orders": [{"source_index": <integer>, "order_id": <string>, "buyer": <string>, "city": <string>, "state": <string>, "total": <number>, "items": [<string>, ...]}]}

Rules:
- Each input line starts with [n]; copy n into source_index for the order parsed from that line
- Extract every order completely and accurately, one object per input line that contains an order
- For state, convert full names to 2-letter codes (e.g. "Ohio" -> "OH")
- For total, emit the numeric value without the $ sign
- For items, emit a list of strings exactly as written
- Do NOT invent orders or values that are not in the text"#;

/// 订单抽取服务
///
/// 职责：
/// - 估算 token，决定是否分块
/// - 每个分块调用一次 LLM
/// - 不做校验、不做去重
pub struct RecordExtractor {
    generator: Arc<dyn TextGenerator>,
    token_threshold: usize,
    max_concurrent_chunks: usize,
}

impl RecordExtractor {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        token_threshold: usize,
        max_concurrent_chunks: usize,
    ) -> Self {
        Self {
            generator,
            token_threshold: token_threshold.max(1),
            max_concurrent_chunks: max_concurrent_chunks.max(1),
        }
    }

    pub fn from_config(generator: Arc<dyn TextGenerator>, config: &Config) -> Self {
        Self::new(
            generator,
            config.chunk_token_threshold,
            config.max_concurrent_chunks,
        )
    }

    /// 抽取整批订单
    ///
    /// 任一分块失败则整批失败
    pub async fn extract(&self, batch: &RawBatch) -> Result<Vec<ParsedOrder>, PipelineError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let chunks = plan_chunks(batch, self.token_threshold);
        let total_chunks = chunks.len();
        if total_chunks > 1 {
            info!(
                "✂️ 约 {} tokens，分成 {} 块 (每块约 {} 条)",
                estimate_tokens(batch),
                total_chunks,
                chunks[0].len()
            );
        }

        let per_chunk: Vec<Vec<ParsedOrder>> = futures::stream::iter(chunks.into_iter().enumerate())
            .map(|(idx, range)| self.extract_chunk(batch, range, idx + 1, total_chunks))
            .buffered(self.max_concurrent_chunks)
            .try_collect()
            .await?;

        let orders: Vec<ParsedOrder> = per_chunk.into_iter().flatten().collect();
        info!("✓ 抽取完成: {} 条原始文本 → {} 条订单", batch.len(), orders.len());
        Ok(orders)
    }

    async fn extract_chunk(
        &self,
        batch: &RawBatch,
        range: Range<usize>,
        chunk: usize,
        total_chunks: usize,
    ) -> Result<Vec<ParsedOrder>, PipelineError> {
        let blobs = &batch.blobs()[range.clone()];
        let prompt = build_extraction_prompt(blobs, chunk, total_chunks);
        debug!(
            "分块 {}/{}: {} 条, 提示词 {} 字符",
            chunk,
            total_chunks,
            blobs.len(),
            prompt.user.len()
        );

        let fail = |source: LlmError| {
            error!("分块 {}/{} 抽取失败: {}", chunk, total_chunks, source);
            PipelineError::ExtractionFailed {
                chunk,
                total_chunks,
                source,
            }
        };

        let response = self.generator.complete(&prompt).await.map_err(fail)?;
        let orders = parse_extraction(&response, range).map_err(fail)?;

        debug!("分块 {}/{}: 抽取 {} 条", chunk, total_chunks, orders.len());
        Ok(orders)
    }
}

/// 估算整批的 token 数（blob 之间按换行连接）
pub fn estimate_tokens(batch: &RawBatch) -> usize {
    let separators = batch.len().saturating_sub(1);
    (batch.char_count() + separators) / CHARS_PER_TOKEN
}

/// 把整批切成连续分块，每个 blob 恰好属于一个分块
pub fn plan_chunks(batch: &RawBatch, token_threshold: usize) -> Vec<Range<usize>> {
    let len = batch.len();
    if len == 0 {
        return Vec::new();
    }

    let estimated = estimate_tokens(batch);
    if estimated <= token_threshold {
        return vec![0..len];
    }

    let avg_tokens_per_blob = estimated as f64 / len as f64;
    let per_chunk = ((token_threshold as f64 / avg_tokens_per_blob) as usize).max(1);

    (0..len)
        .step_by(per_chunk)
        .map(|start| start..(start + per_chunk).min(len))
        .collect()
}

fn build_extraction_prompt(blobs: &[String], chunk: usize, total_chunks: usize) -> Prompt {
    let numbered: Vec<String> = blobs
        .iter()
        .enumerate()
        .map(|(i, blob)| format!("[{}] {}", i, blob.replace('\n', " ")))
        .collect();

    let chunk_note = if total_chunks > 1 {
        format!(
            "\n\nNote: This is chunk {} of {}. Parse all orders in this chunk.",
            chunk, total_chunks
        )
    } else {
        String::new()
    };

    Prompt::new(
        EXTRACTION_SYSTEM_PROMPT,
        format!("Raw order data:\n{}{}", numbered.join("\n"), chunk_note),
    )
}

/// 模型输出的结构
#[derive(Debug, Deserialize)]
struct ExtractionOutput {
    orders: Vec<ExtractedOrder>,
}

#[derive(Debug, Deserialize)]
struct ExtractedOrder {
    #[serde(default)]
    source_index: Option<usize>,
    #[serde(deserialize_with = "string_or_number")]
    order_id: String,
    buyer: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    state: String,
    #[serde(deserialize_with = "amount")]
    total: f64,
    #[serde(default)]
    items: Vec<String>,
}

/// 解析一块的模型输出，并把块内序号换算成整批序号
fn parse_extraction(response: &JsonValue, range: Range<usize>) -> Result<Vec<ParsedOrder>, LlmError> {
    let output: ExtractionOutput = serde_json::from_value(response.clone())
        .map_err(|e| LlmError::malformed(e.to_string(), &response.to_string()))?;

    let orders = output
        .orders
        .into_iter()
        .map(|o| {
            let state = o.state.trim();
            ParsedOrder {
                source_index: o
                    .source_index
                    .filter(|local| *local < range.len())
                    .map(|local| range.start + local),
                order_id: o.order_id.trim().to_string(),
                buyer: o.buyer.trim().to_string(),
                city: o.city.trim().to_string(),
                state: normalize_state(state)
                    .map(str::to_string)
                    .unwrap_or_else(|| state.to_ascii_uppercase()),
                items: o
                    .items
                    .into_iter()
                    .map(|item| item.trim().to_string())
                    .filter(|item| !item.is_empty())
                    .collect(),
                total: (o.total * 100.0).round() / 100.0,
            }
        })
        .collect();

    Ok(orders)
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match JsonValue::deserialize(deserializer)? {
        JsonValue::String(s) => Ok(s),
        JsonValue::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

/// 金额：数字，或 "$1,299.99" 形式的字符串
fn amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = JsonValue::deserialize(deserializer)?;
    let parsed = match &value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().trim_start_matches('$').replace(',', "").parse().ok(),
        _ => None,
    };
    parsed
        .filter(|v: &f64| v.is_finite())
        .ok_or_else(|| serde::de::Error::custom(format!("invalid amount: {}", value)))
}
