//! 对外返回的数据结构

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::filter::FilterSet;
use crate::models::order::ValidatedOrder;

/// `POST /query` 请求体
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryRequest {
    pub query: String,
}

/// 复购预测标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReorderLabel {
    LikelyReorder,
    UnlikelyReorder,
}

/// 打分时使用的特征（便于前端解释）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeaturesUsed {
    pub num_items: usize,
    pub has_electronics: bool,
    pub state_reorder_score: f64,
    pub total_normalized: f64,
    pub electronics_x_spend: f64,
    pub avg_item_price: f64,
}

/// 单个订单的复购预测
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReorderPrediction {
    pub order_id: String,
    pub reorder_probability: f64,
    pub predicted_label: ReorderLabel,
    pub features_used: FeaturesUsed,
}

/// 一次查询的最终响应
///
/// 只能通过 `success` / `failure` 构造，构造后不再修改：
/// `total_matched` 总是等于 `orders` 的长度，预测与订单一一对应
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope {
    success: bool,
    total_parsed: usize,
    total_matched: usize,
    filters_applied: FilterSet,
    orders: Vec<ValidatedOrder>,
    validation_warnings: Vec<String>,
    ml_predictions: Vec<ReorderPrediction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ResponseEnvelope {
    /// 成功响应
    pub fn success(
        total_parsed: usize,
        filters_applied: FilterSet,
        orders: Vec<ValidatedOrder>,
        validation_warnings: Vec<String>,
        ml_predictions: Vec<ReorderPrediction>,
    ) -> Self {
        debug_assert_eq!(orders.len(), ml_predictions.len());
        Self {
            success: true,
            total_parsed,
            total_matched: orders.len(),
            filters_applied,
            orders,
            validation_warnings,
            ml_predictions,
            error: None,
        }
    }

    /// 失败响应，所有集合为空
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            total_parsed: 0,
            total_matched: 0,
            filters_applied: FilterSet::match_all(),
            orders: Vec::new(),
            validation_warnings: Vec::new(),
            ml_predictions: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn total_parsed(&self) -> usize {
        self.total_parsed
    }

    pub fn total_matched(&self) -> usize {
        self.total_matched
    }

    pub fn filters_applied(&self) -> &FilterSet {
        &self.filters_applied
    }

    pub fn orders(&self) -> &[ValidatedOrder] {
        &self.orders
    }

    pub fn validation_warnings(&self) -> &[String] {
        &self.validation_warnings
    }

    pub fn ml_predictions(&self) -> &[ReorderPrediction] {
        &self.ml_predictions
    }

    /// 失败原因，成功时为 `None`
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// 训练数据中的洞察说明
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FollowupInsight {
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
}

/// `GET /stats` 返回的模型诊断信息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelStats {
    /// 测试集准确率（百分比）
    pub accuracy: f64,
    pub training_samples: usize,
    pub test_samples: usize,
    /// 州 → 复购率（百分比）
    pub state_reorder_rates: BTreeMap<String, f64>,
    /// 特征名 → 重要性（百分比）
    pub feature_importance: BTreeMap<String, f64>,
    pub coefficients: BTreeMap<String, f64>,
    pub intercept: f64,
    pub item_followup_insights: Vec<FollowupInsight>,
}
