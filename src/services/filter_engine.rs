//! 过滤引擎 - 业务能力层
//!
//! 纯函数：同样的条件和订单永远得到同样的结果，不做 I/O

use tracing::debug;

use crate::models::{Field, FilterPredicate, FilterSet, FilterValue, Operator, ParsedOrder, ValidatedOrder};

/// 金额相等的容差（半分钱）
const AMOUNT_EPSILON: f64 = 0.005;

/// 返回满足条件的订单，保持输入顺序
pub fn apply(filters: &FilterSet, orders: &[ValidatedOrder]) -> Vec<ValidatedOrder> {
    let matched: Vec<ValidatedOrder> = orders
        .iter()
        .filter(|order| matches_set(filters, order))
        .cloned()
        .collect();
    debug!("过滤: {} → {} 条 ({})", orders.len(), matched.len(), filters);
    matched
}

/// 订单是否满足整组条件：`all` 全部满足，每个非空 OR 组至少满足一个
pub fn matches_set(filters: &FilterSet, order: &ParsedOrder) -> bool {
    filters.all.iter().all(|p| matches(p, order))
        && filters
            .any
            .iter()
            .all(|group| group.is_empty() || group.iter().any(|p| matches(p, order)))
}

/// 订单是否满足单个条件
///
/// 字符串比较忽略大小写；`items` 只要有一件商品满足即可；
/// 字段和运算符组合不合理时一律不匹配
pub fn matches(predicate: &FilterPredicate, order: &ParsedOrder) -> bool {
    match predicate.field {
        Field::Total => match_number(predicate.operator, &predicate.value, order.total),
        Field::OrderId => match_text(predicate.operator, &predicate.value, &order.order_id),
        Field::Buyer => match_text(predicate.operator, &predicate.value, &order.buyer),
        Field::City => match_text(predicate.operator, &predicate.value, &order.city),
        Field::State => match_text(predicate.operator, &predicate.value, &order.state),
        Field::Items => order
            .items
            .iter()
            .any(|item| match_text(predicate.operator, &predicate.value, item)),
    }
}

fn match_number(operator: Operator, value: &FilterValue, actual: f64) -> bool {
    let FilterValue::Number(expected) = *value else {
        return false;
    };
    match operator {
        Operator::Eq => (actual - expected).abs() < AMOUNT_EPSILON,
        Operator::Gt => actual > expected,
        Operator::Lt => actual < expected,
        Operator::Gte => actual >= expected,
        Operator::Lte => actual <= expected,
        Operator::Contains | Operator::In => false,
    }
}

fn match_text(operator: Operator, value: &FilterValue, actual: &str) -> bool {
    let actual = actual.trim().to_lowercase();
    match (operator, value) {
        (Operator::Eq, FilterValue::Text(expected)) => actual == expected.trim().to_lowercase(),
        (Operator::Contains, FilterValue::Text(expected)) => {
            actual.contains(&expected.trim().to_lowercase())
        }
        (Operator::In, FilterValue::List(candidates)) => candidates
            .iter()
            .any(|c| actual == c.trim().to_lowercase()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn order(id: &str, state: &str, items: &[&str], total: f64) -> ValidatedOrder {
        ValidatedOrder::new(ParsedOrder {
            source_index: None,
            order_id: id.into(),
            buyer: format!("Buyer {}", id),
            city: "Columbus".into(),
            state: state.into(),
            items: items.iter().map(|s| s.to_string()).collect(),
            total,
        })
    }

    fn pred(field: Field, operator: Operator, value: FilterValue) -> FilterPredicate {
        FilterPredicate::new(field, operator, value)
    }

    #[test]
    fn test_orders_under_100() {
        let orders = vec![
            order("1", "OH", &["usb cable"], 45.0),
            order("2", "OH", &["keyboard"], 120.0),
            order("3", "TX", &["mouse"], 99.99),
        ];
        let filters = FilterSet::all_of(vec![pred(
            Field::Total,
            Operator::Lt,
            FilterValue::Number(100.0),
        )]);

        let matched = apply(&filters, &orders);
        let ids: Vec<&str> = matched.iter().map(|o| o.order_id()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn test_empty_set_matches_everything() {
        let orders = vec![order("1", "OH", &[], 10.0), order("2", "CA", &[], 20.0)];
        assert_eq!(apply(&FilterSet::match_all(), &orders), orders);
    }

    #[test]
    fn test_items_any_and_case_insensitive() {
        let o = order("1", "OH", &["Gaming Laptop", "mouse"], 900.0);
        assert!(matches(
            &pred(Field::Items, Operator::Contains, FilterValue::Text("LAPTOP".into())),
            &o
        ));
        assert!(matches(
            &pred(Field::Items, Operator::Eq, FilterValue::Text("mouse".into())),
            &o
        ));
        assert!(!matches(
            &pred(Field::Items, Operator::Eq, FilterValue::Text("laptop".into())),
            &o
        ));
    }

    #[test]
    fn test_any_group() {
        let orders = vec![
            order("1", "OH", &["laptop"], 900.0),
            order("2", "OH", &["drone"], 400.0),
            order("3", "TX", &["laptop"], 900.0),
            order("4", "OH", &["socks"], 9.0),
        ];
        let filters = FilterSet {
            all: vec![pred(Field::State, Operator::Eq, FilterValue::Text("oh".into()))],
            any: vec![vec![
                pred(Field::Items, Operator::Contains, FilterValue::Text("laptop".into())),
                pred(Field::Items, Operator::Contains, FilterValue::Text("drone".into())),
            ]],
        };
        let matched = apply(&filters, &orders);
        let ids: Vec<&str> = matched.iter().map(|o| o.order_id()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_every_or_group_must_hit() {
        let orders = vec![
            order("1", "OH", &["laptop", "mouse"], 900.0),
            order("2", "OH", &["drone"], 400.0),
            order("3", "TX", &["keyboard", "drone"], 300.0),
            order("4", "OH", &["mouse"], 20.0),
        ];
        let contains = |s: &str| pred(Field::Items, Operator::Contains, FilterValue::Text(s.into()));
        let filters = FilterSet {
            all: vec![],
            any: vec![
                vec![contains("laptop"), contains("drone")],
                vec![contains("mouse"), contains("keyboard")],
            ],
        };
        let matched = apply(&filters, &orders);
        let ids: Vec<&str> = matched.iter().map(|o| o.order_id()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn test_nonsense_combinations_never_match() {
        let o = order("1001", "OH", &["laptop"], 50.0);
        assert!(!matches(
            &pred(Field::Buyer, Operator::Gt, FilterValue::Text("A".into())),
            &o
        ));
        assert!(!matches(
            &pred(Field::Total, Operator::Contains, FilterValue::Number(50.0)),
            &o
        ));
        assert!(!matches(
            &pred(Field::Total, Operator::Lt, FilterValue::Text("100".into())),
            &o
        ));
        assert!(matches(
            &pred(
                Field::State,
                Operator::In,
                FilterValue::List(vec!["TX".into(), "OH".into()])
            ),
            &o
        ));
    }

    fn arb_order() -> impl Strategy<Value = ValidatedOrder> {
        (
            0u32..5000,
            prop::sample::select(vec!["OH", "TX", "CA", "WA"]),
            prop::collection::vec(prop::sample::select(vec!["laptop", "drone", "socks"]), 0..3),
            0.0f64..2000.0,
        )
            .prop_map(|(id, state, items, total)| order(&id.to_string(), state, &items, total))
    }

    fn arb_filters() -> impl Strategy<Value = FilterSet> {
        let total = (
            prop::sample::select(vec![Operator::Lt, Operator::Gt, Operator::Gte, Operator::Lte]),
            0.0f64..2000.0,
        )
            .prop_map(|(op, n)| pred(Field::Total, op, FilterValue::Number(n)));
        let state = prop::sample::select(vec!["OH", "TX"])
            .prop_map(|s| pred(Field::State, Operator::Eq, FilterValue::Text(s.into())));
        let item = prop::sample::select(vec!["laptop", "drone"])
            .prop_map(|s| pred(Field::Items, Operator::Contains, FilterValue::Text(s.into())));
        let any_pred = prop_oneof![total, state, item].boxed();
        (
            prop::collection::vec(any_pred.clone(), 0..3),
            prop::collection::vec(prop::collection::vec(any_pred, 0..3), 0..3),
        )
            .prop_map(|(all, any)| FilterSet { all, any })
    }

    proptest! {
        #[test]
        fn prop_filter_is_idempotent_subset(
            orders in prop::collection::vec(arb_order(), 0..30),
            filters in arb_filters(),
        ) {
            let once = apply(&filters, &orders);
            let twice = apply(&filters, &once);
            prop_assert_eq!(&once, &twice);
            prop_assert!(once.len() <= orders.len());
            prop_assert!(once.iter().all(|o| orders.contains(o)));
        }
    }
}
