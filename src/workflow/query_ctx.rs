//! 查询上下文
//!
//! 封装"这是第几次查询、问的是什么"，只用于日志

use std::fmt::Display;

use chrono::{DateTime, Local};

use crate::utils::logging::truncate_text;

/// 查询上下文
#[derive(Debug, Clone)]
pub struct QueryCtx {
    /// 进程内递增的查询编号
    pub run_id: u64,

    /// 原始问题
    pub query: String,

    pub started_at: DateTime<Local>,
}

impl QueryCtx {
    pub fn new(run_id: u64, query: impl Into<String>) -> Self {
        Self {
            run_id,
            query: query.into(),
            started_at: Local::now(),
        }
    }

    /// 从开始到现在的毫秒数
    pub fn elapsed_ms(&self) -> i64 {
        (Local::now() - self.started_at).num_milliseconds()
    }
}

impl Display for QueryCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[查询 #{} {:?}]",
            self.run_id,
            truncate_text(&self.query, 60)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let ctx = QueryCtx::new(3, "Orders under $100");
        assert_eq!(ctx.to_string(), r#"[查询 #3 "Orders under $100"]"#);
        assert!(ctx.elapsed_ms() >= 0);
    }
}
