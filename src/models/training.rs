//! 复购模型训练数据

use phf::phf_set;
use serde::{Deserialize, Serialize};

/// 高复购州
pub static HIGH_REORDER_STATES: phf::Set<&'static str> = phf_set! {"OH", "TX", "CA", "IL", "FL"};
/// 中复购州
pub static MED_REORDER_STATES: phf::Set<&'static str> =
    phf_set! {"IN", "MI", "MN", "CO", "MA", "TN", "OR"};
/// 低复购州
pub static LOW_REORDER_STATES: phf::Set<&'static str> =
    phf_set! {"WA", "AZ", "ND", "SD", "NE", "KS"};

/// 州的复购分数：高 1.0 / 中 0.5 / 其他 0.0
pub fn state_reorder_score(state: &str) -> f64 {
    let code = state.trim().to_ascii_uppercase();
    if HIGH_REORDER_STATES.contains(code.as_str()) {
        1.0
    } else if MED_REORDER_STATES.contains(code.as_str()) {
        0.5
    } else {
        0.0
    }
}

/// 数据集中出现的全部州（排序后）
pub fn all_tiered_states() -> Vec<&'static str> {
    let mut states: Vec<&'static str> = HIGH_REORDER_STATES
        .iter()
        .chain(MED_REORDER_STATES.iter())
        .chain(LOW_REORDER_STATES.iter())
        .copied()
        .collect();
    states.sort_unstable();
    states
}

/// 训练数据的一行，列名与 CSV 表头一致
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRow {
    pub num_items: u32,
    pub has_electronics: u8,
    pub state: String,
    pub order_total: f64,
    pub avg_item_price: f64,
    pub will_reorder: u8,
}

/// 完整训练集
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub rows: Vec<TrainingRow>,
}

impl TrainingSet {
    pub fn new(rows: Vec<TrainingRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 正样本比例
    pub fn positive_rate(&self) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }
        let positives = self.rows.iter().filter(|r| r.will_reorder == 1).count();
        positives as f64 / self.rows.len() as f64
    }
}
