//! 配置加载
//!
//! 优先级从低到高：内置默认值 → TOML 文件（`ORDER_INSIGHT_CONFIG` 指定，
//! 或当前目录下的 `order_insight.toml`）→ 环境变量。

use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConfigError;

/// 配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "ORDER_INSIGHT_CONFIG";
/// 默认配置文件
pub const DEFAULT_CONFIG_FILE: &str = "order_insight.toml";

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP 监听地址
    pub bind_addr: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- 订单数据源 ---
    /// 为空时使用内置示例订单
    pub source_base_url: String,
    pub source_max_attempts: usize,
    pub source_retry_delay_ms: u64,
    pub source_timeout_secs: u64,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_max_tokens: u32,
    pub llm_timeout_secs: u64,
    // --- 抽取 ---
    /// 单次调用的估算 token 上限，超过则分块
    pub chunk_token_threshold: usize,
    /// 同时进行的分块抽取数量
    pub max_concurrent_chunks: usize,
    // --- 复购模型 ---
    /// 为空时使用内置合成数据集
    pub training_data_path: String,
    pub training_rows: usize,
    pub training_seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            verbose_logging: false,
            source_base_url: String::new(),
            source_max_attempts: 3,
            source_retry_delay_ms: 1000,
            source_timeout_secs: 10,
            llm_api_key: String::new(),
            llm_api_base_url: "https://openrouter.ai/api/v1".to_string(),
            llm_model_name: "openai/gpt-oss-120b:exacto".to_string(),
            llm_max_tokens: 8192,
            llm_timeout_secs: 120,
            chunk_token_threshold: 6000,
            max_concurrent_chunks: 4,
            training_data_path: String::new(),
            training_rows: 5000,
            training_seed: 42,
        }
    }
}

impl Config {
    /// 加载配置：TOML 文件（可选）+ 环境变量覆盖
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).ok();
        let config = match path.as_deref() {
            Some(p) => Self::from_file(Path::new(p))?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env()
    }

    /// 只从环境变量加载
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env()
    }

    /// 从 TOML 文件加载，缺省字段取默认值
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::TomlParseFailed {
            path: origin.to_string(),
            source,
        })
    }

    /// 用环境变量覆盖已有配置
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: env_string("BIND_ADDR").unwrap_or(self.bind_addr),
            verbose_logging: env_parse("VERBOSE_LOGGING", "bool")?.unwrap_or(self.verbose_logging),
            source_base_url: env_string("ORDER_SOURCE_URL").unwrap_or(self.source_base_url),
            source_max_attempts: env_parse("SOURCE_MAX_ATTEMPTS", "usize")?
                .unwrap_or(self.source_max_attempts),
            source_retry_delay_ms: env_parse("SOURCE_RETRY_DELAY_MS", "u64")?
                .unwrap_or(self.source_retry_delay_ms),
            source_timeout_secs: env_parse("SOURCE_TIMEOUT_SECS", "u64")?
                .unwrap_or(self.source_timeout_secs),
            llm_api_key: env_string("LLM_API_KEY")
                .or_else(|| env_string("OPENROUTER_API_KEY"))
                .unwrap_or(self.llm_api_key),
            llm_api_base_url: env_string("LLM_API_BASE_URL").unwrap_or(self.llm_api_base_url),
            llm_model_name: env_string("LLM_MODEL_NAME").unwrap_or(self.llm_model_name),
            llm_max_tokens: env_parse("LLM_MAX_TOKENS", "u32")?.unwrap_or(self.llm_max_tokens),
            llm_timeout_secs: env_parse("LLM_TIMEOUT_SECS", "u64")?
                .unwrap_or(self.llm_timeout_secs),
            chunk_token_threshold: env_parse("CHUNK_TOKEN_THRESHOLD", "usize")?
                .unwrap_or(self.chunk_token_threshold),
            max_concurrent_chunks: env_parse("MAX_CONCURRENT_CHUNKS", "usize")?
                .unwrap_or(self.max_concurrent_chunks),
            training_data_path: env_string("TRAINING_DATA_PATH")
                .unwrap_or(self.training_data_path),
            training_rows: env_parse("TRAINING_ROWS", "usize")?.unwrap_or(self.training_rows),
            training_seed: env_parse("TRAINING_SEED", "u64")?.unwrap_or(self.training_seed),
        })
    }
}

fn env_string(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(var_name: &str, expected_type: &str) -> Result<Option<T>, ConfigError> {
    match env_string(var_name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }),
    }
}
