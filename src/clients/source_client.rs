//! 订单数据源客户端
//!
//! `OrderSource` 只负责一次拉取；`SourceClient` 负责重试

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{PipelineError, SourceError};
use crate::models::RawBatch;

/// 订单原始文本提供方
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// 拉取一整批原始订单，不做重试
    async fn fetch(&self) -> Result<RawBatch, SourceError>;
}

/// HTTP 数据源：`GET {base_url}/api/orders`
pub struct HttpOrderSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpOrderSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::request_failed(base_url, e))?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/orders", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl OrderSource for HttpOrderSource {
    async fn fetch(&self) -> Result<RawBatch, SourceError> {
        debug!("拉取订单: {}", self.endpoint);

        let resp = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| SourceError::request_failed(&self.endpoint, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::BadStatus {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let body: JsonValue = resp
            .json()
            .await
            .map_err(|e| SourceError::request_failed(&self.endpoint, e))?;

        let blobs = find_order_list(&body).ok_or_else(|| SourceError::UnrecognizedFormat {
            endpoint: self.endpoint.clone(),
        })?;

        Ok(RawBatch::new(blobs))
    }
}

/// 在响应里找订单文本列表
///
/// 依次尝试 `raw_orders`、`orders`、`data.raw_orders`，最后退回第一个字符串数组
fn find_order_list(body: &JsonValue) -> Option<Vec<String>> {
    let as_strings = |value: &JsonValue| -> Option<Vec<String>> {
        let array = value.as_array()?;
        let strings: Vec<String> = array
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        (!strings.is_empty() && strings.len() == array.len()).then_some(strings)
    };

    let known = ["/raw_orders", "/orders", "/data/raw_orders"]
        .iter()
        .find_map(|pointer| body.pointer(pointer).and_then(as_strings));
    if known.is_some() {
        return known;
    }

    let fallback = body.as_object()?.values().find_map(as_strings);
    if fallback.is_some() {
        warn!("订单响应格式变化，使用兜底字段识别");
    }
    fallback
}

/// 内置示例订单源
pub struct StaticOrderSource {
    blobs: Vec<String>,
}

impl StaticOrderSource {
    pub fn new(blobs: Vec<String>) -> Self {
        Self { blobs }
    }

    /// 二十条示例订单
    pub fn sample() -> Self {
        Self::new(SAMPLE_ORDERS.iter().map(|s| s.to_string()).collect())
    }
}

#[async_trait]
impl OrderSource for StaticOrderSource {
    async fn fetch(&self) -> Result<RawBatch, SourceError> {
        Ok(RawBatch::new(self.blobs.clone()))
    }
}

/// 带重试的数据源客户端
///
/// 暂时性错误重试，间隔固定；格式错误立即失败
pub struct SourceClient {
    source: Arc<dyn OrderSource>,
    max_attempts: usize,
    retry_delay: Duration,
}

impl SourceClient {
    pub fn new(source: Arc<dyn OrderSource>, max_attempts: usize, retry_delay: Duration) -> Self {
        Self {
            source,
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    /// 按配置创建：有 URL 用 HTTP，否则用示例订单
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let source: Arc<dyn OrderSource> = if config.source_base_url.trim().is_empty() {
            Arc::new(StaticOrderSource::sample())
        } else {
            Arc::new(HttpOrderSource::new(
                &config.source_base_url,
                Duration::from_secs(config.source_timeout_secs),
            )?)
        };
        Ok(Self::new(
            source,
            config.source_max_attempts,
            Duration::from_millis(config.source_retry_delay_ms),
        ))
    }

    /// 拉取订单，重试耗尽后返回 `SourceUnavailable`
    pub async fn fetch(&self) -> Result<RawBatch, PipelineError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.source.fetch().await {
                Ok(batch) => {
                    info!(
                        "✓ 拉取到 {} 条原始订单 ({} 字符)",
                        batch.len(),
                        batch.char_count()
                    );
                    return Ok(batch);
                }
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        "拉取订单失败 (尝试 {}/{}): {}，{}ms 后重试...",
                        attempt,
                        self.max_attempts,
                        e,
                        self.retry_delay.as_millis()
                    );
                    sleep(self.retry_delay).await;
                }
                Err(e) => {
                    error!("拉取订单失败，已尝试 {} 次: {}", attempt, e);
                    return Err(PipelineError::SourceUnavailable {
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }
}

/// 示例订单文本
pub const SAMPLE_ORDERS: [&str; 20] = [
    "Order 1001: Buyer=John Davis, Location=Columbus, OH, Total=$742.10, Items: laptop, hdmi cable",
    "Order 1002: Buyer=Sarah Liu, Location=Austin, TX, Total=$156.55, Items: headphones",
    "Order 1003: Buyer=Mike Turner, Location=Cleveland, OH, Total=$1299.99, Items: gaming pc, mouse",
    "Order 1004: Buyer=Rachel Kim, Location=Seattle, WA, Total=$89.50, Items: coffee maker",
    "Order 1005: Buyer=Chris Myers, Location=Cincinnati, OH, Total=$512.00, Items: monitor, desk lamp",
    "Order 1006: Buyer=Amanda Foster, Location=Chicago, IL, Total=$67.25, Items: phone case, screen protector",
    "Order 1007: Buyer=David Park, Location=Portland, OR, Total=$899.99, Items: 4k television",
    "Order 1008: Buyer=Jessica Wang, Location=Dayton, OH, Total=$234.50, Items: wireless keyboard, webcam",
    "Order 1009: Buyer=Brian Kelly, Location=Miami, FL, Total=$1750.00, Items: macbook pro, usb-c hub",
    "Order 1010: Buyer=Lisa Hernandez, Location=Denver, CO, Total=$45.99, Items: notebook, pens",
    "Order 1011: Buyer=Tom Richardson, Location=Akron, OH, Total=$623.00, Items: tablet, stylus, case",
    "Order 1012: Buyer=Emily Chen, Location=San Francisco, CA, Total=$349.99, Items: smart watch",
    "Order 1013: Buyer=James Wilson, Location=Toledo, OH, Total=$178.75, Items: bluetooth speaker, aux cable",
    "Order 1014: Buyer=Maria Santos, Location=Phoenix, AZ, Total=$2100.50, Items: desktop computer, dual monitors, keyboard",
    "Order 1015: Buyer=Kevin O'Brien, Location=Boston, MA, Total=$55.00, Items: mouse pad, cable organizer",
    "Order 1016: Buyer=Priya Patel, Location=Indianapolis, IN, Total=$445.00, Items: noise-canceling headphones, dac",
    "Order 1017: Buyer=Nathan Scott, Location=Columbus, OH, Total=$987.50, Items: drone, extra batteries",
    "Order 1018: Buyer=Hannah Lee, Location=Nashville, TN, Total=$129.99, Items: portable charger, lightning cable",
    "Order 1019: Buyer=Robert Chang, Location=Detroit, MI, Total=$1550.00, Items: gaming laptop, cooling pad",
    "Order 1020: Buyer=Sophie Martin, Location=Minneapolis, MN, Total=$72.30, Items: usb hub, ethernet adapter",
];
