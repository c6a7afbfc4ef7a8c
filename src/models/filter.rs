//! 过滤条件模型
//!
//! 一个查询被解析成一个 `FilterSet`，之后不再修改

use std::fmt;

use serde::{Deserialize, Serialize};

/// 可过滤的订单字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    OrderId,
    Buyer,
    City,
    State,
    Items,
    Total,
}

impl Field {
    pub fn name(self) -> &'static str {
        match self {
            Field::OrderId => "order_id",
            Field::Buyer => "buyer",
            Field::City => "city",
            Field::State => "state",
            Field::Items => "items",
            Field::Total => "total",
        }
    }

    /// 是否为数值字段
    pub fn is_numeric(self) -> bool {
        matches!(self, Field::Total)
    }
}

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq,
    Gt,
    Lt,
    Gte,
    Lte,
    Contains,
    In,
}

impl Operator {
    pub fn name(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Gt => "gt",
            Operator::Lt => "lt",
            Operator::Gte => "gte",
            Operator::Lte => "lte",
            Operator::Contains => "contains",
            Operator::In => "in",
        }
    }

    /// 是否为大小比较
    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            Operator::Gt | Operator::Lt | Operator::Gte | Operator::Lte
        )
    }
}

/// 条件的比较值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Number(n) => write!(f, "{}", n),
            FilterValue::Text(s) => write!(f, "{:?}", s),
            FilterValue::List(items) => write!(f, "{:?}", items),
        }
    }
}

/// 单个过滤条件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPredicate {
    pub field: Field,
    pub operator: Operator,
    pub value: FilterValue,
}

impl FilterPredicate {
    pub fn new(field: Field, operator: Operator, value: FilterValue) -> Self {
        Self {
            field,
            operator,
            value,
        }
    }
}

impl fmt::Display for FilterPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.field.name(),
            self.operator.name(),
            self.value
        )
    }
}

/// 一次查询的全部过滤条件
///
/// `all` 中的条件全部满足，且 `any` 中的每一组至少满足一个。
/// 两者都为空表示匹配全部订单。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    pub all: Vec<FilterPredicate>,
    /// OR 组，组与组之间是 AND
    #[serde(default)]
    pub any: Vec<Vec<FilterPredicate>>,
}

impl FilterSet {
    /// 匹配全部订单
    pub fn match_all() -> Self {
        Self::default()
    }

    /// 纯合取
    pub fn all_of(predicates: Vec<FilterPredicate>) -> Self {
        Self {
            all: predicates,
            any: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty() && self.any.iter().all(Vec::is_empty)
    }

    pub fn len(&self) -> usize {
        self.all.len() + self.any.iter().map(Vec::len).sum::<usize>()
    }
}

impl fmt::Display for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "(全部)");
        }
        let mut parts: Vec<String> = self.all.iter().map(|p| p.to_string()).collect();
        for group in self.any.iter().filter(|g| !g.is_empty()) {
            let group: Vec<String> = group.iter().map(|p| p.to_string()).collect();
            parts.push(format!("({})", group.join(" OR ")));
        }
        write!(f, "{}", parts.join(" AND "))
    }
}
