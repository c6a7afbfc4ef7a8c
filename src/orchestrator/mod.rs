//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `app` - 应用生命周期
//! - 启动时训练复购模型，失败即退出
//! - 装配 LLM 生成器、数据源和 QueryFlow
//! - 选择运行方式：HTTP 服务或单次查询
//!
//! ### `server` - HTTP 服务
//! - `/query`、`/stats`、`/health` 三个接口
//! - 所有 handler 共享同一个只读的 QueryFlow
//!
//! ## 层次关系
//!
//! ```text
//! app / server
//!     ↓
//! workflow::QueryFlow (处理单次查询)
//!     ↓
//! services (能力层：抽取 / 校验 / 解析 / 过滤 / 打分)
//!     ↓
//! clients + infrastructure (数据源、LLM)
//! ```

pub mod app;
pub mod server;

pub use app::App;
pub use server::{router, serve, AppState};
