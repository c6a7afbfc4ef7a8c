//! 查询解析服务 - 业务能力层
//!
//! 自然语言问题 → LLM 中间结构 → `FilterSet`。
//! LLM 只负责给出松散的 `{field, op, value}`，字段、运算符和值的校验与归一化
//! 全部在 `to_filter_set` 里完成，不依赖模型。

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::error::{LlmError, PipelineError};
use crate::infrastructure::{Prompt, TextGenerator};
use crate::models::us_state::normalize_state;
use crate::models::{Field, FilterPredicate, FilterSet, FilterValue, Operator};

const INTERPRET_SYSTEM_PROMPT: &str = r#"You translate questions about customer orders into filter conditions.

Order fields: order_id, buyer, city, state (2-letter code), items (list of product names), total (number, USD).
Operators: eq, gt, lt, gte, lte, contains, in.

Respond with a single JSON object and nothing else:
{"all": [{"field": ..., "op": ..., "value": ...}], "any": [{"field": ..., "op": ..., "value": ...}]}

- "all" conditions must all hold; "any" is an OR group (use it only for explicit alternatives)
- "under $100" is lt 100, "over $500" is gt 500, "at least" is gte, "at most" is lte
- product mentions use items contains, singular and lower case
- if the question asks for everything or cannot be expressed, return {"all": [], "any": []}

Examples:
"Orders under $100" -> {"all": [{"field": "total", "op": "lt", "value": 100}], "any": []}
"Ohio orders with laptops or gaming PCs" -> {"all": [{"field": "state", "op": "eq", "value": "OH"}], "any": [{"field": "items", "op": "contains", "value": "laptop"}, {"field": "items", "op": "contains", "value": "gaming pc"}]}
"Show me everything" -> {"all": [], "any": []}"#;

/// LLM 给出的中间结构
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryIntent {
    #[serde(default)]
    pub all: Vec<RawCondition>,
    #[serde(default)]
    pub any: Vec<RawCondition>,
}

/// 未经校验的单个条件
#[derive(Debug, Clone, Deserialize)]
pub struct RawCondition {
    pub field: String,
    #[serde(alias = "operator")]
    pub op: String,
    #[serde(default)]
    pub value: JsonValue,
}

/// 查询解析服务
///
/// 职责：
/// - 调用 LLM 得到中间结构
/// - 无法理解的意图（包括回复不是 JSON）退化为"匹配全部"
/// - 只有 LLM 调用本身失败（网络、超时、空回复）时才返回错误
pub struct QueryInterpreter {
    generator: Arc<dyn TextGenerator>,
}

impl QueryInterpreter {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub async fn interpret(&self, query: &str) -> Result<FilterSet, PipelineError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(FilterSet::match_all());
        }

        let prompt = Prompt::new(INTERPRET_SYSTEM_PROMPT, format!("Question: \"{}\"", query));
        let filters = match self.generator.complete(&prompt).await {
            Ok(response) => match serde_json::from_value::<QueryIntent>(response.clone()) {
                Ok(intent) => to_filter_set(&intent),
                Err(e) => {
                    warn!("无法解析查询意图 ({})，按全部订单处理: {}", e, response);
                    FilterSet::match_all()
                }
            },
            Err(LlmError::MalformedOutput { reason, snippet }) => {
                warn!("查询解析回复不是 JSON ({})，按全部订单处理: {}", reason, snippet);
                FilterSet::match_all()
            }
            Err(source) => return Err(PipelineError::InterpretationFailed { source }),
        };

        info!("🔎 查询 {:?} → {}", query, filters);
        Ok(filters)
    }
}

/// 中间结构 → 过滤条件
///
/// 无法映射的条件直接丢弃。`any` 是一个 OR 组；`all` 里拆成多个关键词的条件
/// 各自成为一个 OR 组。不足两个条件的组并入 `all`
pub fn to_filter_set(intent: &QueryIntent) -> FilterSet {
    let mut all: Vec<FilterPredicate> = Vec::new();
    let mut groups: Vec<Vec<FilterPredicate>> =
        vec![intent.any.iter().flat_map(to_predicates).collect()];

    for condition in &intent.all {
        let predicates = to_predicates(condition);
        if predicates.len() > 1 {
            // "laptop or gaming pc" 写在一个条件里
            groups.push(predicates);
        } else {
            all.extend(predicates);
        }
    }

    let mut any: Vec<Vec<FilterPredicate>> = Vec::new();
    for mut group in groups {
        dedup(&mut group);
        match group.len() {
            0 => {}
            1 => all.append(&mut group),
            _ if any.contains(&group) => {}
            _ => any.push(group),
        }
    }
    dedup(&mut all);

    FilterSet { all, any }
}

/// 单个条件 → 0 个、1 个或多个（商品关键词拆分）谓词
fn to_predicates(condition: &RawCondition) -> Vec<FilterPredicate> {
    let (Some(field), Some(operator)) = (parse_field(&condition.field), parse_operator(&condition.op))
    else {
        debug!("丢弃无法识别的条件: {:?}", condition);
        return Vec::new();
    };

    if field == Field::Items && operator == Operator::Contains {
        if let Some(text) = condition.value.as_str() {
            return split_keywords(text)
                .into_iter()
                .map(|kw| FilterPredicate::new(field, operator, FilterValue::Text(kw)))
                .collect();
        }
    }

    match coerce_value(field, operator, &condition.value) {
        Some(value) => vec![FilterPredicate::new(field, operator, value)],
        None => {
            debug!("丢弃值不合法的条件: {:?}", condition);
            Vec::new()
        }
    }
}

fn normalize_name(raw: &str) -> String {
    raw.trim().to_lowercase().replace([' ', '-'], "_")
}

fn parse_field(raw: &str) -> Option<Field> {
    match normalize_name(raw).as_str() {
        "order_id" | "id" | "order" | "order_number" => Some(Field::OrderId),
        "buyer" | "customer" | "buyer_name" | "customer_name" => Some(Field::Buyer),
        "city" => Some(Field::City),
        "state" | "state_code" => Some(Field::State),
        "items" | "item" | "product" | "products" | "item_keyword" => Some(Field::Items),
        "total" | "amount" | "order_total" | "price" | "spend" => Some(Field::Total),
        _ => None,
    }
}

fn parse_operator(raw: &str) -> Option<Operator> {
    match normalize_name(raw).as_str() {
        "eq" | "=" | "==" | "equals" | "is" => Some(Operator::Eq),
        "gt" | ">" | "over" | "above" | "greater_than" | "more_than" => Some(Operator::Gt),
        "lt" | "<" | "under" | "below" | "less_than" => Some(Operator::Lt),
        "gte" | ">=" | "at_least" | "min" => Some(Operator::Gte),
        "lte" | "<=" | "at_most" | "max" => Some(Operator::Lte),
        "contains" | "includes" | "like" | "has" => Some(Operator::Contains),
        "in" | "one_of" => Some(Operator::In),
        _ => None,
    }
}

/// 按字段和运算符把值转成确定的类型
fn coerce_value(field: Field, operator: Operator, value: &JsonValue) -> Option<FilterValue> {
    if field.is_numeric() {
        return match operator {
            Operator::Contains | Operator::In => None,
            _ => as_number(value).map(FilterValue::Number),
        };
    }

    match operator {
        _ if operator.is_ordering() => None,
        Operator::In => {
            let values: Vec<String> = as_text_list(value)
                .into_iter()
                .filter_map(|v| normalize_text(field, &v))
                .collect();
            (!values.is_empty()).then_some(FilterValue::List(values))
        }
        Operator::Contains if field == Field::State => None,
        _ => as_text(value)
            .and_then(|v| normalize_text(field, &v))
            .map(FilterValue::Text),
    }
}

/// 字符串值归一化：州转代码，商品转小写
fn normalize_text(field: Field, raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    match field {
        Field::State => normalize_state(value).map(str::to_string),
        Field::Items => Some(value.to_lowercase()),
        _ => Some(value.to_string()),
    }
}

fn as_number(value: &JsonValue) -> Option<f64> {
    let number = match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().trim_start_matches('$').replace(',', "").parse().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

fn as_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_text_list(value: &JsonValue) -> Vec<String> {
    match value {
        JsonValue::Array(values) => values.iter().filter_map(as_text).collect(),
        JsonValue::String(s) => s.split(',').map(str::to_string).collect(),
        other => as_text(other).into_iter().collect(),
    }
}

/// "laptop or gaming pc, drone" → ["laptop", "gaming pc", "drone"]
fn split_keywords(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace(',', " or ")
        .split(" or ")
        .map(str::trim)
        .filter(|kw| !kw.is_empty())
        .map(str::to_string)
        .collect()
}

fn dedup(predicates: &mut Vec<FilterPredicate>) {
    let mut seen: Vec<FilterPredicate> = Vec::with_capacity(predicates.len());
    predicates.retain(|p| {
        if seen.contains(p) {
            false
        } else {
            seen.push(p.clone());
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use async_trait::async_trait;
    use serde_json::json;

    fn intent(value: JsonValue) -> QueryIntent {
        serde_json::from_value(value).unwrap()
    }

    /// 每次返回同样结果的生成器
    struct FixedGenerator(fn() -> Result<JsonValue, LlmError>);

    #[async_trait]
    impl TextGenerator for FixedGenerator {
        async fn complete(&self, _prompt: &Prompt) -> Result<JsonValue, LlmError> {
            (self.0)()
        }
    }

    fn timeout() -> Result<JsonValue, LlmError> {
        Err(LlmError::Timeout {
            model: "fixed".into(),
            secs: 120,
        })
    }

    fn contains(keyword: &str) -> FilterPredicate {
        FilterPredicate::new(Field::Items, Operator::Contains, FilterValue::Text(keyword.into()))
    }

    fn state(code: &str) -> FilterPredicate {
        FilterPredicate::new(Field::State, Operator::Eq, FilterValue::Text(code.into()))
    }

    #[test]
    fn test_orders_under_100() {
        let set = to_filter_set(&intent(
            json!({"all": [{"field": "total", "op": "lt", "value": 100}]}),
        ));
        assert_eq!(
            set,
            FilterSet::all_of(vec![FilterPredicate::new(
                Field::Total,
                Operator::Lt,
                FilterValue::Number(100.0)
            )])
        );
    }

    #[test]
    fn test_synonyms_and_coercion() {
        let set = to_filter_set(&intent(json!({"all": [
            {"field": "amount", "operator": "at least", "value": "$1,000"},
            {"field": "State", "op": "=", "value": "ohio"}
        ]})));
        assert_eq!(set.all.len(), 2);
        assert_eq!(set.all[0].operator, Operator::Gte);
        assert_eq!(set.all[0].value, FilterValue::Number(1000.0));
        assert_eq!(set.all[1].value, FilterValue::Text("OH".into()));
    }

    #[test]
    fn test_invalid_conditions_are_dropped() {
        let set = to_filter_set(&intent(json!({"all": [
            {"field": "color", "op": "eq", "value": "red"},
            {"field": "total", "op": "contains", "value": 5},
            {"field": "buyer", "op": "gt", "value": "A"},
            {"field": "state", "op": "eq", "value": "Atlantis"},
            {"field": "total", "op": "lt", "value": "cheap"}
        ]})));
        assert!(set.is_empty());
    }

    #[test]
    fn test_or_keywords_become_any_group() {
        let set = to_filter_set(&intent(json!({"all": [
            {"field": "items", "op": "contains", "value": "Laptops or gaming PC"}
        ]})));
        assert!(set.all.is_empty());
        assert_eq!(set.any, vec![vec![contains("laptops"), contains("gaming pc")]]);
    }

    #[test]
    fn test_split_keywords_keep_their_own_group() {
        let set = to_filter_set(&intent(json!({
            "all": [{"field": "items", "op": "contains", "value": "laptop or drone"}],
            "any": [
                {"field": "state", "op": "eq", "value": "OH"},
                {"field": "state", "op": "eq", "value": "TX"}
            ]
        })));
        assert!(set.all.is_empty());
        assert_eq!(
            set.any,
            vec![
                vec![state("OH"), state("TX")],
                vec![contains("laptop"), contains("drone")],
            ]
        );
    }

    #[test]
    fn test_two_split_conditions_are_two_groups() {
        let set = to_filter_set(&intent(json!({"all": [
            {"field": "items", "op": "contains", "value": "laptop or drone"},
            {"field": "items", "op": "contains", "value": "mouse or keyboard"},
            {"field": "state", "op": "eq", "value": "Ohio"}
        ]})));
        assert_eq!(set.all, vec![state("OH")]);
        assert_eq!(
            set.any,
            vec![
                vec![contains("laptop"), contains("drone")],
                vec![contains("mouse"), contains("keyboard")],
            ]
        );
    }

    #[test]
    fn test_single_any_folds_into_all() {
        let set = to_filter_set(&intent(json!({"any": [
            {"field": "items", "op": "contains", "value": "drone"},
            {"field": "items", "op": "contains", "value": "drone"}
        ]})));
        assert!(set.any.is_empty());
        assert_eq!(set.all.len(), 1);
    }

    #[test]
    fn test_in_list_of_states() {
        let set = to_filter_set(&intent(json!({"all": [
            {"field": "state", "op": "in", "value": ["Ohio", "tx", "Narnia"]}
        ]})));
        assert_eq!(
            set.all[0].value,
            FilterValue::List(vec!["OH".into(), "TX".into()])
        );
    }

    #[tokio::test]
    async fn test_unparseable_intent_degrades_to_match_all() {
        let interpreter =
            QueryInterpreter::new(Arc::new(FixedGenerator(|| Ok(json!({"all": "nope"})))));
        let set = interpreter.interpret("what's the weather?").await.unwrap();
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_prose_reply_degrades_to_match_all() {
        let interpreter = QueryInterpreter::new(Arc::new(FixedGenerator(|| {
            crate::infrastructure::parse_json_response(
                "Sorry, I can't turn that question into filters.",
            )
        })));
        let set = interpreter.interpret("what's the weather?").await.unwrap();
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_blank_query_skips_model() {
        let interpreter = QueryInterpreter::new(Arc::new(FixedGenerator(timeout)));
        assert!(interpreter.interpret("   ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_is_interpretation_error() {
        let interpreter = QueryInterpreter::new(Arc::new(FixedGenerator(timeout)));
        let err = interpreter.interpret("orders in Ohio").await.unwrap_err();
        assert!(matches!(err, PipelineError::InterpretationFailed { .. }));
    }
}
