//! 训练数据加载
//!
//! 两种来源：CSV 文件，或按固定种子生成的合成数据集

use std::f64::consts::PI;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::error::TrainingError;
use crate::models::training::{all_tiered_states, state_reorder_score, TrainingRow, TrainingSet};

/// 合成数据的价格区间
pub const MIN_ORDER_TOTAL: f64 = 50.0;
pub const MAX_ORDER_TOTAL: f64 = 1500.0;

/// 从 CSV 文件加载训练集
///
/// 表头：`num_items,has_electronics,state,order_total,avg_item_price,will_reorder`
pub fn load_training_csv(path: &Path) -> Result<TrainingSet, TrainingError> {
    let unreadable = |source| TrainingError::DatasetUnreadable {
        path: path.display().to_string(),
        source,
    };

    let mut reader = csv::Reader::from_path(path).map_err(unreadable)?;
    let mut rows = Vec::new();
    for (idx, record) in reader.deserialize::<TrainingRow>().enumerate() {
        let row = record.map_err(unreadable)?;
        check_row(&row, idx + 1)?;
        rows.push(row);
    }

    info!("加载训练数据 {} 行: {}", rows.len(), path.display());
    Ok(TrainingSet::new(rows))
}

fn check_row(row: &TrainingRow, line: usize) -> Result<(), TrainingError> {
    let invalid = |reason: &str| TrainingError::InvalidRow {
        row: line,
        reason: reason.to_string(),
    };
    if row.num_items == 0 {
        return Err(invalid("num_items 必须大于 0"));
    }
    if row.has_electronics > 1 || row.will_reorder > 1 {
        return Err(invalid("has_electronics / will_reorder 只能是 0 或 1"));
    }
    if !row.order_total.is_finite() || row.order_total < 0.0 {
        return Err(invalid("order_total 不合法"));
    }
    Ok(())
}

/// 生成固定的合成训练集
///
/// 同一个 `(n, seed)` 永远生成同一份数据
pub fn generate_synthetic(n: usize, seed: u64) -> TrainingSet {
    let mut rng = StdRng::seed_from_u64(seed);
    let states = all_tiered_states();

    let rows = (0..n)
        .map(|_| {
            let state = states[rng.gen_range(0..states.len())];
            let num_items: u32 = rng.gen_range(1..7);
            let has_electronics = rng.gen_bool(0.4);
            let order_total = round_cents(rng.gen_range(MIN_ORDER_TOTAL..MAX_ORDER_TOTAL));
            let total_norm = (order_total - MIN_ORDER_TOTAL) / (MAX_ORDER_TOTAL - MIN_ORDER_TOTAL);
            let elec = if has_electronics { 1.0 } else { 0.0 };

            let logit = -1.5
                + 1.4 * state_reorder_score(state)
                + 0.6 * elec
                + 0.12 * num_items as f64
                + 0.4 * total_norm
                + 0.5 * elec * total_norm
                + 0.35 * standard_normal(&mut rng);

            TrainingRow {
                num_items,
                has_electronics: has_electronics as u8,
                state: state.to_string(),
                order_total,
                avg_item_price: round_cents(order_total / num_items as f64),
                will_reorder: (logit > 0.0) as u8,
            }
        })
        .collect();

    TrainingSet::new(rows)
}

/// 按配置加载训练集：有路径读 CSV，否则生成合成数据
pub fn load_or_generate(
    path: &str,
    rows: usize,
    seed: u64,
) -> Result<TrainingSet, TrainingError> {
    if path.trim().is_empty() {
        info!("使用内置合成训练集 ({} 行, seed={})", rows, seed);
        return Ok(generate_synthetic(rows, seed));
    }
    let set = load_training_csv(Path::new(path))?;
    if set.len() != rows {
        warn!("训练数据行数 {} 与配置的 {} 不一致", set.len(), rows);
    }
    Ok(set)
}

/// Box-Muller
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_synthetic_is_deterministic() {
        let a = generate_synthetic(200, 42);
        let b = generate_synthetic(200, 42);
        assert_eq!(a.rows, b.rows);
        assert_ne!(a.rows, generate_synthetic(200, 7).rows);
    }

    #[test]
    fn test_synthetic_ranges() {
        let set = generate_synthetic(5000, 42);
        assert_eq!(set.len(), 5000);
        for row in &set.rows {
            assert!((1..=6).contains(&row.num_items));
            assert!(row.order_total >= MIN_ORDER_TOTAL && row.order_total <= MAX_ORDER_TOTAL);
            assert!(row.will_reorder <= 1);
        }
        let rate = set.positive_rate();
        assert!(rate > 0.2 && rate < 0.8, "positive rate {}", rate);
    }

    #[test]
    fn test_load_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "num_items,has_electronics,state,order_total,avg_item_price,will_reorder"
        )
        .unwrap();
        writeln!(file, "2,1,OH,742.1,371.05,1").unwrap();
        writeln!(file, "1,0,WA,89.5,89.5,0").unwrap();

        let set = load_training_csv(file.path()).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.rows[0].state, "OH");
        assert_eq!(set.rows[1].will_reorder, 0);
    }

    #[test]
    fn test_load_csv_rejects_bad_label() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "num_items,has_electronics,state,order_total,avg_item_price,will_reorder"
        )
        .unwrap();
        writeln!(file, "2,1,OH,742.1,371.05,3").unwrap();

        let err = load_training_csv(file.path()).unwrap_err();
        assert!(matches!(err, TrainingError::InvalidRow { row: 1, .. }));
    }

    #[test]
    fn test_missing_csv_is_unreadable() {
        let err = load_or_generate("/no/such/training.csv", 10, 1).unwrap_err();
        assert!(matches!(err, TrainingError::DatasetUnreadable { .. }));
    }
}
