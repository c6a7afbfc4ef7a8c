//! 错误类型
//!
//! 按层划分：数据源、LLM、流水线、模型训练、配置。
//! 流水线错误的 `Display` 就是返回给调用方的 `error` 字段内容。

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 单次查询流水线错误
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// 模型训练失败（启动期致命）
    #[error("ModelTrainingFailed: {0}")]
    Training(#[from] TrainingError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// HTTP 服务错误
    #[error("服务错误: {0}")]
    Server(#[source] std::io::Error),
}

/// 单次查询流水线错误
///
/// 任何一个都会让本次查询以 `success: false` 结束
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 数据源重试耗尽
    #[error("SourceUnavailable")]
    SourceUnavailable {
        attempts: usize,
        #[source]
        source: SourceError,
    },
    /// 某个分块的抽取失败
    #[error("ExtractionFailed: chunk {chunk}/{total_chunks}: {source}")]
    ExtractionFailed {
        chunk: usize,
        total_chunks: usize,
        #[source]
        source: LlmError,
    },
    /// 查询解析时 LLM 调用失败
    #[error("InterpretationFailed: {source}")]
    InterpretationFailed {
        #[source]
        source: LlmError,
    },
}

/// 数据源错误
#[derive(Debug, Error)]
pub enum SourceError {
    /// 网络请求失败（含超时）
    #[error("请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// 非 2xx 响应
    #[error("错误状态码 ({endpoint}): {status}")]
    BadStatus { endpoint: String, status: u16 },
    /// 响应中找不到订单列表
    #[error("无法识别的响应格式 ({endpoint})")]
    UnrecognizedFormat { endpoint: String },
    /// 其他数据源错误（测试替身等）
    #[error("{0}")]
    Other(String),
}

impl SourceError {
    /// 是否值得重试
    pub fn is_transient(&self) -> bool {
        !matches!(self, SourceError::UnrecognizedFormat { .. })
    }
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 调用超时
    #[error("LLM 调用超时 (模型: {model}, {secs}s)")]
    Timeout { model: String, secs: u64 },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 返回内容不是合法 JSON 或不符合结构
    #[error("LLM返回内容无法解析: {reason} (响应: {snippet})")]
    MalformedOutput { reason: String, snippet: String },
}

/// 模型训练错误
#[derive(Debug, Error)]
pub enum TrainingError {
    /// 训练集为空
    #[error("训练集为空")]
    EmptyDataset,
    /// 标签只有一个类别
    #[error("训练集标签只有一个类别: {label}")]
    SingleClass { label: u8 },
    /// 参数出现 NaN / inf
    #[error("训练发散，参数不是有限值")]
    Diverged,
    /// 读取训练数据失败
    #[error("读取训练数据失败 ({path}): {source}")]
    DatasetUnreadable {
        path: String,
        #[source]
        source: csv::Error,
    },
    /// 训练数据某行不合法
    #[error("训练数据第 {row} 行不合法: {reason}")]
    InvalidRow { row: usize, reason: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 便捷构造函数 ==========

impl LlmError {
    /// 创建 LLM API 调用错误
    pub fn api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        LlmError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        }
    }

    /// 创建解析失败错误，响应内容截断后保留
    pub fn malformed(reason: impl Into<String>, response: &str) -> Self {
        LlmError::MalformedOutput {
            reason: reason.into(),
            snippet: crate::utils::logging::truncate_text(response, 200),
        }
    }
}

impl SourceError {
    /// 创建请求失败错误
    pub fn request_failed(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        SourceError::RequestFailed {
            endpoint: endpoint.into(),
            source,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_unavailable_message_is_bare_kind() {
        let err = PipelineError::SourceUnavailable {
            attempts: 3,
            source: SourceError::Other("connection refused".into()),
        };
        assert_eq!(err.to_string(), "SourceUnavailable");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_extraction_failed_carries_cause() {
        let err = PipelineError::ExtractionFailed {
            chunk: 2,
            total_chunks: 3,
            source: LlmError::EmptyContent {
                model: "m".into(),
            },
        };
        let msg = err.to_string();
        assert!(msg.starts_with("ExtractionFailed: chunk 2/3"));
        assert!(msg.contains("LLM返回内容为空"));
    }

    #[test]
    fn test_unrecognized_format_is_not_transient() {
        assert!(!SourceError::UnrecognizedFormat {
            endpoint: "x".into()
        }
        .is_transient());
        assert!(SourceError::BadStatus {
            endpoint: "x".into(),
            status: 503
        }
        .is_transient());
    }
}
