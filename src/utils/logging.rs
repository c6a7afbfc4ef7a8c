/// 日志工具模块
///
/// 提供日志初始化、启动横幅等辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::ModelStats;

/// 初始化 tracing 日志
///
/// 默认级别 info，可用 `RUST_LOG` 覆盖。重复调用是安全的。
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!(
        "🚀 订单洞察服务启动 - {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("🤖 LLM 模型: {}", config.llm_model_name);
    if config.source_base_url.is_empty() {
        info!("📦 订单数据源: 内置示例订单");
    } else {
        info!("📦 订单数据源: {}", config.source_base_url);
    }
    info!(
        "✂️ 分块阈值: ~{} tokens, 最大并发分块: {}",
        config.chunk_token_threshold, config.max_concurrent_chunks
    );
    info!("{}", "=".repeat(60));
}

/// 记录模型训练完成信息
pub fn log_model_ready(stats: &ModelStats) {
    info!("{}", "─".repeat(60));
    info!(
        "✓ 复购模型训练完成: 准确率 {:.1}% (训练 {} / 测试 {})",
        stats.accuracy, stats.training_samples, stats.test_samples
    );
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（字符数）
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("abc", 5), "abc");
        assert_eq!(truncate_text("abcdef", 3), "abc...");
        assert_eq!(truncate_text("订单数据源", 2), "订单...");
    }
}
