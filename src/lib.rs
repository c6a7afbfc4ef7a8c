//! # Order Insight
//!
//! 把非结构化的订单文本变成可查询、带复购预测的结构化结果
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure / Clients）
//! - `infrastructure/` - `TextGenerator` 抽象及 OpenAI 兼容实现
//! - `clients/` - 订单数据源，带重试
//!
//! ### ② 业务能力层（Services）
//! - `RecordExtractor` - LLM 抽取订单，超长时分块并发
//! - `HallucinationValidator` - 逐字段核对原文，丢弃编造的订单
//! - `QueryInterpreter` - 自然语言 → `FilterSet`
//! - `filter_engine` - 纯函数过滤
//! - `ReorderPredictor` - 逻辑回归复购预测
//!
//! ### ③ 流程层（Workflow）
//! - `QueryFlow` - 一次查询的完整流程
//!
//! ### ④ 编排层（Orchestration）
//! - `App` - 启动、训练、装配
//! - `server` - axum HTTP 接口

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, PipelineError};
pub use models::{FilterSet, ResponseEnvelope};
pub use orchestrator::App;
pub use workflow::QueryFlow;
