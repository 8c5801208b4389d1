//! 错误分类
//!
//! - 解析失败 (单文件)：记录日志，批处理继续
//! - 取消：整个编译单元的结果丢弃
//! - 内部不变量被破坏：记录日志，跳过单个调用点
//! - 配置错误：分析开始前即失败

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis cancelled")]
    Cancelled,

    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),

    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },
}

impl AnalysisError {
    pub fn invariant(msg: impl Into<String>) -> Self {
        AnalysisError::InvariantViolation(msg.into())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown rule id `{0}` (run `tx-lint rules` to list available ids)")]
    UnknownRule(String),

    #[error("cannot read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
