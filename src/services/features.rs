//! 复购模型特征
//!
//! 训练和打分共用同一套特征计算，保证两边一致

use phf::phf_set;

use crate::models::training::state_reorder_score;
use crate::models::{FeaturesUsed, ParsedOrder, TrainingRow};

/// 特征名，顺序与 `FeatureVector::values` 一致
pub const FEATURE_NAMES: [&str; 6] = [
    "num_items",
    "has_electronics",
    "state_reorder_score",
    "total_normalized",
    "electronics_x_spend",
    "avg_item_price",
];

pub const FEATURE_COUNT: usize = FEATURE_NAMES.len();

const TOTAL_MIN: f64 = 50.0;
const TOTAL_MAX: f64 = 1500.0;

/// 电子产品（小写精确匹配）
static ELECTRONICS_ITEMS: phf::Set<&'static str> = phf_set! {
    "laptop",
    "macbook",
    "gaming pc",
    "desktop computer",
    "tablet",
    "drone",
    "gaming laptop",
    "4k television",
    "smart watch",
    "monitor",
    "dual monitors",
};

pub fn is_electronics(item: &str) -> bool {
    ELECTRONICS_ITEMS.contains(item.trim().to_lowercase().as_str())
}

/// 商品均价的归一化区间，取自训练集
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceScale {
    pub min: f64,
    pub max: f64,
}

impl PriceScale {
    pub fn fit(rows: &[TrainingRow]) -> Self {
        let prices = rows
            .iter()
            .map(|r| average_price(r.order_total, r.num_items as usize));
        let (min, max) = prices.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p), hi.max(p))
        });
        if min.is_finite() && max.is_finite() {
            Self { min, max }
        } else {
            Self { min: 0.0, max: 0.0 }
        }
    }

    /// 映射到 [0, 1]；区间退化时取 0
    pub fn normalize(&self, price: f64) -> f64 {
        let span = self.max - self.min;
        if span <= f64::EPSILON {
            return 0.0;
        }
        ((price - self.min) / span).clamp(0.0, 1.0)
    }
}

/// 一个订单的六个特征
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub num_items: usize,
    pub has_electronics: bool,
    pub state_reorder_score: f64,
    pub total_normalized: f64,
    pub electronics_x_spend: f64,
    pub avg_item_price: f64,
}

impl FeatureVector {
    fn build(
        num_items: usize,
        has_electronics: bool,
        state: &str,
        total: f64,
        scale: &PriceScale,
    ) -> Self {
        let total_normalized = normalize_total(total);
        let electronics_x_spend = if has_electronics { total_normalized } else { 0.0 };
        Self {
            num_items,
            has_electronics,
            state_reorder_score: state_reorder_score(state),
            total_normalized,
            electronics_x_spend,
            avg_item_price: scale.normalize(average_price(total, num_items)),
        }
    }

    pub fn from_order(order: &ParsedOrder, scale: &PriceScale) -> Self {
        let has_electronics = order.items.iter().any(|item| is_electronics(item));
        Self::build(
            order.items.len(),
            has_electronics,
            &order.state,
            order.total,
            scale,
        )
    }

    pub fn from_row(row: &TrainingRow, scale: &PriceScale) -> Self {
        Self::build(
            row.num_items as usize,
            row.has_electronics == 1,
            &row.state,
            row.order_total,
            scale,
        )
    }

    pub fn values(&self) -> [f64; FEATURE_COUNT] {
        [
            self.num_items as f64,
            if self.has_electronics { 1.0 } else { 0.0 },
            self.state_reorder_score,
            self.total_normalized,
            self.electronics_x_spend,
            self.avg_item_price,
        ]
    }

    /// 对外展示用，小数保留三位
    pub fn to_features_used(&self) -> FeaturesUsed {
        FeaturesUsed {
            num_items: self.num_items,
            has_electronics: self.has_electronics,
            state_reorder_score: self.state_reorder_score,
            total_normalized: round3(self.total_normalized),
            electronics_x_spend: round3(self.electronics_x_spend),
            avg_item_price: round3(self.avg_item_price),
        }
    }
}

fn normalize_total(total: f64) -> f64 {
    ((total - TOTAL_MIN) / (TOTAL_MAX - TOTAL_MIN)).clamp(0.0, 1.0)
}

fn average_price(total: f64, num_items: usize) -> f64 {
    total / num_items.max(1) as f64
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
