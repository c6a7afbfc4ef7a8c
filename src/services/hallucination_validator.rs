//! 幻觉校验服务 - 业务能力层
//!
//! 把抽取出的每个字段和它的来源文本逐一核对，核对不上的订单直接丢弃

use std::fmt;

use regex::Regex;
use tracing::{info, warn};

use crate::models::us_state::state_name;
use crate::models::{ParsedOrder, RawBatch, ValidatedOrder};

/// 被丢弃订单的警告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub order_id: String,
    /// 无法在原文中找到的字段
    pub unverified: Vec<&'static str>,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Order {}: hallucinated, removed", self.order_id)
    }
}

/// 原文中的数字：连续数字，可带千分位逗号和小数部分
const NUMBER_PATTERN: &str = r"\d+(?:,\d+)*(?:\.\d+)?";

/// 幻觉校验服务
///
/// 职责：
/// - 通过 source_index（或订单号）找到来源文本
/// - 核对订单号、买家、城市、州、金额、商品
/// - 从不失败，只会缩小结果集并累积警告
#[derive(Debug)]
pub struct HallucinationValidator {
    numbers: Regex,
}

impl HallucinationValidator {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            numbers: Regex::new(NUMBER_PATTERN)?,
        })
    }

    /// 校验一批订单，保留原有顺序
    pub fn validate(
        &self,
        parsed: Vec<ParsedOrder>,
        batch: &RawBatch,
    ) -> (Vec<ValidatedOrder>, Vec<ValidationWarning>) {
        let total = parsed.len();
        let mut validated = Vec::with_capacity(total);
        let mut warnings = Vec::new();

        for order in parsed {
            let unverified = self.check(&order, batch);
            if unverified.is_empty() {
                validated.push(ValidatedOrder::new(order));
            } else {
                warn!(
                    "订单 {} 无法在原文中核实 ({})，已移除",
                    order.order_id,
                    unverified.join(", ")
                );
                warnings.push(ValidationWarning {
                    order_id: order.order_id,
                    unverified,
                });
            }
        }

        info!("✓ 校验完成: {}/{} 条通过", validated.len(), total);
        (validated, warnings)
    }

    /// 返回无法核实的字段，空表示通过
    fn check(&self, order: &ParsedOrder, batch: &RawBatch) -> Vec<&'static str> {
        let Some(source) = locate_source(order, batch) else {
            return vec!["order_id"];
        };
        let source_lower = source.to_lowercase();

        let mut unverified = Vec::new();
        if !id_in_text(&order.order_id, source) {
            unverified.push("order_id");
        }
        if !text_in(&order.buyer, &source_lower) {
            unverified.push("buyer");
        }
        if !text_in(&order.city, &source_lower) {
            unverified.push("city");
        }
        if !state_in(&order.state, &order.city, source, &source_lower) {
            unverified.push("state");
        }
        if !self.amount_in(order.total, source) {
            unverified.push("total");
        }
        if !order.items.iter().all(|item| text_in(item, &source_lower)) {
            unverified.push("items");
        }
        unverified
    }

    /// 原文中出现的某个数字与金额相差不到半分钱
    fn amount_in(&self, total: f64, source: &str) -> bool {
        self.numbers_in(source)
            .iter()
            .any(|amount| (amount - total).abs() < 0.005)
    }

    /// 原文中的所有数字
    ///
    /// 带逗号的数字同时按千分位和按逗号分隔的几个数读取：
    /// `3,742.10` 既可能是 3742.10，也可能是数量 3 和金额 742.10
    fn numbers_in(&self, text: &str) -> Vec<f64> {
        let mut found = Vec::new();
        for m in self.numbers.find_iter(text) {
            let token = m.as_str();
            if let Ok(n) = token.replace(',', "").parse::<f64>() {
                found.push(n);
            }
            if token.contains(',') {
                found.extend(token.split(',').filter_map(|part| part.parse::<f64>().ok()));
            }
        }
        found
    }
}

/// 找到订单的来源文本
///
/// 优先用抽取时记录的序号；序号缺失或对不上订单号时，退回按订单号查找
fn locate_source<'a>(order: &ParsedOrder, batch: &'a RawBatch) -> Option<&'a str> {
    if order.order_id.trim().is_empty() {
        return None;
    }
    let indexed = order.source_index.and_then(|i| batch.get(i));
    match indexed {
        Some(text) if id_in_text(&order.order_id, text) => Some(text),
        _ => batch
            .blobs()
            .iter()
            .map(String::as_str)
            .find(|text| id_in_text(&order.order_id, text))
            .or(indexed),
    }
}

/// 订单号作为完整的词出现，或其数字部分作为完整数字出现
fn id_in_text(order_id: &str, text: &str) -> bool {
    let id = order_id.trim();
    if id.is_empty() {
        return false;
    }
    let digits: String = id.chars().filter(|c| c.is_ascii_digit()).collect();
    contains_token(text, id) || (!digits.is_empty() && contains_token(text, &digits))
}

/// `needle` 前后都不是字母或数字（忽略大小写）
fn contains_token(text: &str, needle: &str) -> bool {
    let pattern = format!(
        r"(?i)(?:^|[^0-9a-z]){}(?:[^0-9a-z]|$)",
        regex::escape(needle)
    );
    Regex::new(&pattern).is_ok_and(|re| re.is_match(text))
}

/// 空字段不做断言；非空字段必须（忽略大小写）出现在原文中
fn text_in(value: &str, source_lower: &str) -> bool {
    let value = value.trim();
    value.is_empty() || source_lower.contains(&value.to_lowercase())
}

/// 州代码的三种写法都算数：
/// - 独立的大写词 `OH`
/// - 紧跟在城市和逗号后面，不区分大小写 `columbus, oh`
/// - 州全名 `Ohio`
fn state_in(state: &str, city: &str, source: &str, source_lower: &str) -> bool {
    let code = state.trim();
    if code.is_empty() {
        return true;
    }
    let code = regex::escape(code);
    let as_word = Regex::new(&format!(r"\b{}\b", code)).is_ok_and(|re| re.is_match(source));
    if as_word {
        return true;
    }

    let city = city.trim();
    let after_city = !city.is_empty()
        && Regex::new(&format!(r"(?i)\b{}\s*,\s*{}\b", regex::escape(city), code))
            .is_ok_and(|re| re.is_match(source));
    after_city || state_name(state.trim()).is_some_and(|name| source_lower.contains(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn batch() -> RawBatch {
        RawBatch::new(vec![
            "Order 1001: Buyer=John Davis, Location=Columbus, OH, Total=$742.10, Items: laptop, hdmi cable".into(),
            "Order 1002: Buyer=Sarah Liu, Location=Austin, Texas, Total=$1,156.55, Items: headphones".into(),
        ])
    }

    fn order(id: &str, idx: Option<usize>) -> ParsedOrder {
        ParsedOrder {
            source_index: idx,
            order_id: id.into(),
            buyer: "John Davis".into(),
            city: "Columbus".into(),
            state: "OH".into(),
            items: vec!["laptop".into(), "hdmi cable".into()],
            total: 742.1,
        }
    }

    #[test]
    fn test_faithful_order_passes() {
        let validator = HallucinationValidator::new().unwrap();
        let (ok, warnings) = validator.validate(vec![order("1001", Some(0))], &batch());
        assert_eq!(ok.len(), 1);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_prefixed_id_and_wrong_index_still_located() {
        let validator = HallucinationValidator::new().unwrap();
        let (ok, _) = validator.validate(vec![order("ORD-1001", Some(1))], &batch());
        assert_eq!(ok.len(), 1);
    }

    #[test]
    fn test_full_state_name_and_thousands_separator() {
        let validator = HallucinationValidator::new().unwrap();
        let parsed = ParsedOrder {
            source_index: Some(1),
            order_id: "1002".into(),
            buyer: "Sarah Liu".into(),
            city: "Austin".into(),
            state: "TX".into(),
            items: vec!["Headphones".into()],
            total: 1156.55,
        };
        let (ok, warnings) = validator.validate(vec![parsed], &batch());
        assert_eq!(ok.len(), 1, "{:?}", warnings);
    }

    #[test]
    fn test_invented_buyer_is_removed() {
        let validator = HallucinationValidator::new().unwrap();
        let mut fake = order("1001", Some(0));
        fake.buyer = "Jane Doe".into();
        fake.total = 999.0;

        let (ok, warnings) = validator.validate(vec![fake, order("1001", Some(0))], &batch());
        assert_eq!(ok.len(), 1);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].unverified, vec!["buyer", "total"]);
        assert_eq!(warnings[0].to_string(), "Order 1001: hallucinated, removed");
    }

    #[test]
    fn test_invented_order_id_is_removed() {
        let validator = HallucinationValidator::new().unwrap();
        let (ok, warnings) = validator.validate(vec![order("1017", None)], &batch());
        assert!(ok.is_empty());
        assert_eq!(warnings[0].to_string(), "Order 1017: hallucinated, removed");
    }

    #[test]
    fn test_partial_number_is_not_an_id_match() {
        assert!(!contains_token("Order 10010: x", "1001"));
        assert!(!contains_token("Order A1001: x", "1001"));
        assert!(contains_token("Order 1001: x", "1001"));
        assert!(contains_token("order #ord-1001, x", "ORD-1001"));
    }

    #[test]
    fn test_state_must_be_a_word() {
        assert!(state_in("OR", "Portland", "Location=Portland, Oregon", "location=portland, oregon"));
        assert!(!state_in("IN", "Reno", "Buyer=Tina, Location=Reno, NV", "buyer=tina, location=reno, nv"));
        // 小写的 "in" 不在城市后面，不算
        let text = "Location=Reno, NV, shipped, in a box";
        assert!(!state_in("IN", "Reno", text, &text.to_lowercase()));
    }

    #[test]
    fn test_lowercase_feed_passes() {
        let validator = HallucinationValidator::new().unwrap();
        let batch = RawBatch::new(vec![
            "order 1001: buyer=john davis, location=columbus, oh, total=$742.10, items: laptop, hdmi cable".into(),
        ]);
        let (ok, warnings) = validator.validate(vec![order("1001", Some(0))], &batch);
        assert_eq!(ok.len(), 1, "{:?}", warnings);
    }

    #[test]
    fn test_total_next_to_quantity() {
        let validator = HallucinationValidator::new().unwrap();
        let batch = RawBatch::new(vec![
            "Order 1001: Buyer=John Davis, Location=Columbus, OH, qty 3,742.10 total, Items: laptop, hdmi cable".into(),
        ]);
        let (ok, warnings) = validator.validate(vec![order("1001", Some(0))], &batch);
        assert_eq!(ok.len(), 1, "{:?}", warnings);
    }

    #[test]
    fn test_numbers_in() {
        let validator = HallucinationValidator::new().unwrap();
        let found = validator.numbers_in("Order 1002: Total=$1,156.55, qty 3.");
        assert_eq!(found, vec![1002.0, 1156.55, 1.0, 156.55, 3.0]);

        let found = validator.numbers_in("Order 1001: qty 3,742.10 total");
        assert!(found.contains(&742.1));
        assert!(found.contains(&3742.1));
    }

    const BUYERS: [&str; 4] = ["John Davis", "Sarah Liu", "Kevin Brown", "Amy Tan"];
    const CITIES: [&str; 4] = ["Columbus", "Austin", "Seattle", "Miami"];
    const STATES: [&str; 4] = ["OH", "TX", "WA", "FL"];
    const ITEMS: [&str; 4] = ["laptop", "mouse", "desk lamp", "usb hub"];

    fn arb_order() -> impl Strategy<Value = ParsedOrder> {
        (
            1000u32..10000,
            prop::sample::select(BUYERS.to_vec()),
            prop::sample::select(CITIES.to_vec()),
            prop::sample::select(STATES.to_vec()),
            100u32..90000,
            prop::sample::subsequence(ITEMS.to_vec(), 1..=3),
        )
            .prop_map(|(id, buyer, city, state, cents, items)| ParsedOrder {
                source_index: Some(0),
                order_id: id.to_string(),
                buyer: buyer.into(),
                city: city.into(),
                state: state.into(),
                items: items.into_iter().map(String::from).collect(),
                total: f64::from(cents) / 100.0,
            })
    }

    fn render(order: &ParsedOrder) -> RawBatch {
        RawBatch::new(vec![format!(
            "Order {}: Buyer={}, Location={}, {}, Total=${:.2}, Items: {}",
            order.order_id,
            order.buyer,
            order.city,
            order.state,
            order.total,
            order.items.join(", ")
        )])
    }

    /// 改动一个字段，使其不再出现在原文中
    fn mutate(order: &mut ParsedOrder, field: usize) -> &'static str {
        match field {
            0 => {
                order.order_id = format!("{}7", order.order_id);
                "order_id"
            }
            1 => {
                order.buyer = "Nobody Realname".into();
                "buyer"
            }
            2 => {
                order.city = "Atlantis".into();
                "city"
            }
            3 => {
                order.state = "NV".into();
                "state"
            }
            4 => {
                order.total += 1.37;
                "total"
            }
            _ => {
                order.items.push("unicorn saddle".into());
                "items"
            }
        }
    }

    proptest! {
        #[test]
        fn prop_faithful_order_is_kept(order in arb_order()) {
            let validator = HallucinationValidator::new().unwrap();
            let batch = render(&order);
            let (ok, warnings) = validator.validate(vec![order], &batch);
            prop_assert_eq!(ok.len(), 1, "{:?}", warnings);
        }

        #[test]
        fn prop_any_invented_field_is_dropped(order in arb_order(), field in 0usize..6) {
            let validator = HallucinationValidator::new().unwrap();
            let batch = render(&order);
            let mut fake = order;
            let changed = mutate(&mut fake, field);

            let (ok, warnings) = validator.validate(vec![fake], &batch);
            prop_assert!(ok.is_empty());
            prop_assert_eq!(warnings.len(), 1);
            prop_assert!(warnings[0].unverified.contains(&changed));
        }
    }
}
