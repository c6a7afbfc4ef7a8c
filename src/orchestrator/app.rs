//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **启动**：打印配置、加载训练数据、训练复购模型（失败即退出）
//! 2. **装配**：创建 LLM 生成器、数据源、流程
//! 3. **运行**：启动 HTTP 服务，或只执行一次查询

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::infrastructure::{OpenAiGenerator, TextGenerator};
use crate::models::{load_or_generate, ResponseEnvelope};
use crate::orchestrator::server;
use crate::services::ReorderPredictor;
use crate::utils::logging::{log_model_ready, log_startup};
use crate::workflow::QueryFlow;

/// 应用主结构
pub struct App {
    config: Config,
    flow: Arc<QueryFlow>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let predictor = train_predictor(&config)?;
        log_model_ready(predictor.stats());

        if config.llm_api_key.is_empty() {
            warn!("⚠️ 未配置 LLM_API_KEY，LLM 调用将会失败");
        }
        let generator: Arc<dyn TextGenerator> = Arc::new(OpenAiGenerator::new(&config));

        let flow = QueryFlow::from_config(&config, generator, Arc::new(predictor))
            .context("装配查询流程失败")?;

        Ok(Self::with_flow(config, flow))
    }

    /// 使用已经装配好的流程
    pub fn with_flow(config: Config, flow: QueryFlow) -> Self {
        Self {
            config,
            flow: Arc::new(flow),
        }
    }

    /// 启动 HTTP 服务
    pub async fn run(self) -> Result<()> {
        server::serve(&self.config.bind_addr, self.flow)
            .await
            .context("HTTP 服务异常退出")
    }

    /// 执行一次查询
    pub async fn run_once(&self, query: &str) -> ResponseEnvelope {
        self.flow.run(query).await
    }
}

/// 训练失败时返回 `ModelTrainingFailed`
fn train_predictor(config: &Config) -> Result<ReorderPredictor> {
    let dataset = load_or_generate(
        &config.training_data_path,
        config.training_rows,
        config.training_seed,
    )
    .map_err(AppError::from)
    .context("加载训练数据失败")?;
    info!(
        "📊 训练数据: {} 行，正样本比例 {:.1}%",
        dataset.len(),
        dataset.positive_rate() * 100.0
    );

    ReorderPredictor::train(&dataset)
        .map_err(AppError::from)
        .context("复购模型训练失败")
}
