//! 查询处理流程 - 流程层
//!
//! 核心职责：定义"一次查询"的完整处理流程
//!
//! 流程顺序：
//! 1. 拉取 → 抽取 → 校验，与查询解析并发进行
//! 2. 过滤
//! 3. 复购打分
//! 4. 组装响应（任何阶段失败都转成 `success: false`）

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use crate::clients::SourceClient;
use crate::config::Config;
use crate::error::PipelineError;
use crate::infrastructure::TextGenerator;
use crate::models::{ResponseEnvelope, ValidatedOrder};
use crate::services::{
    filter_engine, HallucinationValidator, QueryInterpreter, RecordExtractor, ReorderPredictor,
    ValidationWarning,
};
use crate::workflow::query_ctx::QueryCtx;

/// 拉取、抽取、校验的结果
struct Ingested {
    total_parsed: usize,
    orders: Vec<ValidatedOrder>,
    warnings: Vec<ValidationWarning>,
}

/// 查询处理流程
///
/// - 编排完整的单次查询
/// - 只持有只读的协作者，多个查询可以同时运行
/// - 不向外暴露内部错误类型
pub struct QueryFlow {
    source: SourceClient,
    extractor: RecordExtractor,
    validator: HallucinationValidator,
    interpreter: QueryInterpreter,
    predictor: Arc<ReorderPredictor>,
    next_run_id: AtomicU64,
    verbose_logging: bool,
}

impl QueryFlow {
    pub fn new(
        source: SourceClient,
        extractor: RecordExtractor,
        validator: HallucinationValidator,
        interpreter: QueryInterpreter,
        predictor: Arc<ReorderPredictor>,
    ) -> Self {
        Self {
            source,
            extractor,
            validator,
            interpreter,
            predictor,
            next_run_id: AtomicU64::new(1),
            verbose_logging: false,
        }
    }

    /// 额外打印每次查询命中的订单
    pub fn with_verbose_logging(mut self, verbose: bool) -> Self {
        self.verbose_logging = verbose;
        self
    }

    /// 按配置组装：抽取和解析共用同一个生成器
    pub fn from_config(
        config: &Config,
        generator: Arc<dyn TextGenerator>,
        predictor: Arc<ReorderPredictor>,
    ) -> anyhow::Result<Self> {
        Ok(Self::new(
            SourceClient::from_config(config).context("创建订单数据源失败")?,
            RecordExtractor::from_config(generator.clone(), config),
            HallucinationValidator::new().context("编译校验规则失败")?,
            QueryInterpreter::new(generator),
            predictor,
        )
        .with_verbose_logging(config.verbose_logging))
    }

    pub fn predictor(&self) -> &ReorderPredictor {
        &self.predictor
    }

    /// 执行一次查询，永远返回一个完整的响应
    pub async fn run(&self, query: &str) -> ResponseEnvelope {
        let ctx = QueryCtx::new(self.next_run_id.fetch_add(1, Ordering::Relaxed), query);
        info!("{} ▶ 开始处理", ctx);

        match self.execute(&ctx).await {
            Ok(envelope) => {
                info!(
                    "{} ✅ 完成: 解析 {} 条，匹配 {} 条，用时 {}ms",
                    ctx,
                    envelope.total_parsed(),
                    envelope.total_matched(),
                    ctx.elapsed_ms()
                );
                envelope
            }
            Err(e) => {
                error!("{} ❌ 失败: {:?}", ctx, e);
                ResponseEnvelope::failure(e.to_string())
            }
        }
    }

    async fn execute(&self, ctx: &QueryCtx) -> Result<ResponseEnvelope, PipelineError> {
        let (filters, ingested) =
            tokio::join!(self.interpreter.interpret(&ctx.query), self.ingest(ctx));
        let Ingested {
            total_parsed,
            orders,
            warnings,
        } = ingested?;
        let filters = filters?;

        let matched = filter_engine::apply(&filters, &orders);
        info!("{} 过滤条件 {} → {} 条", ctx, filters, matched.len());
        if self.verbose_logging {
            let ids: Vec<&str> = matched.iter().map(|o| o.order_id()).collect();
            info!("{} 命中订单: {}", ctx, ids.join(", "));
        }

        let predictions = matched
            .iter()
            .map(|order| self.predictor.score(order))
            .collect();

        Ok(ResponseEnvelope::success(
            total_parsed,
            filters,
            matched,
            warnings.iter().map(ToString::to_string).collect(),
            predictions,
        ))
    }

    /// 拉取 → 抽取 → 校验
    async fn ingest(&self, ctx: &QueryCtx) -> Result<Ingested, PipelineError> {
        let batch = self.source.fetch().await?;
        info!("{} 📥 拉取到 {} 条原始订单", ctx, batch.len());

        let parsed = self.extractor.extract(&batch).await?;
        let total_parsed = parsed.len();

        let (orders, warnings) = self.validator.validate(parsed, &batch);
        Ok(Ingested {
            total_parsed,
            orders,
            warnings,
        })
    }
}
