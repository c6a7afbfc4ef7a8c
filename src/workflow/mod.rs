//! 流程层（Workflow Layer）
//!
//! 定义"一次查询"从拉取到打分的完整流程，只依赖 services 和 clients

pub mod query_ctx;
pub mod query_flow;

pub use query_ctx::QueryCtx;
pub use query_flow::QueryFlow;
