//! 订单数据模型
//!
//! RawBatch → ParsedOrder → ValidatedOrder

use serde::{Deserialize, Serialize};

/// 一次拉取到的原始订单文本
///
/// 每个 blob 对应一条候选订单，拉取后不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBatch {
    blobs: Vec<String>,
}

impl RawBatch {
    pub fn new(blobs: Vec<String>) -> Self {
        Self { blobs }
    }

    pub fn blobs(&self) -> &[String] {
        &self.blobs
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.blobs.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// 所有 blob 的字符总数（不含换行）
    pub fn char_count(&self) -> usize {
        self.blobs.iter().map(|b| b.chars().count()).sum()
    }
}

/// LLM 抽取出的结构化订单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedOrder {
    /// 来源 blob 在 RawBatch 中的位置，由抽取阶段建立
    #[serde(skip)]
    pub source_index: Option<usize>,
    pub order_id: String,
    pub buyer: String,
    pub city: String,
    /// 两位大写州代码
    pub state: String,
    pub items: Vec<String>,
    pub total: f64,
}

/// 通过幻觉校验的订单
///
/// 只能由 `HallucinationValidator` 构造；过滤和打分只接受这个类型
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidatedOrder(ParsedOrder);

impl ValidatedOrder {
    pub(crate) fn new(order: ParsedOrder) -> Self {
        Self(order)
    }

    pub fn order(&self) -> &ParsedOrder {
        &self.0
    }

    pub fn order_id(&self) -> &str {
        &self.0.order_id
    }

    pub fn into_inner(self) -> ParsedOrder {
        self.0
    }
}

impl std::ops::Deref for ValidatedOrder {
    type Target = ParsedOrder;

    fn deref(&self) -> &ParsedOrder {
        &self.0
    }
}
