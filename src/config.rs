//! 规则开关
//!
//! 每条规则一个布尔开关，外加 N+1 的两个子开关和只读写入规则的集合修改分支开关，
//! 全部默认开启。可从 `.tx-lint.yml` 加载 (camelCase 键)。

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::rules;

/// 项目根目录下自动读取的配置文件名
pub const CONFIG_FILE_NAME: &str = ".tx-lint.yml";

fn enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "enabled")]
    pub same_class_call: bool,
    #[serde(default = "enabled")]
    pub private_modifier: bool,
    #[serde(default = "enabled")]
    pub final_modifier: bool,
    #[serde(default = "enabled")]
    pub static_modifier: bool,
    #[serde(default = "enabled")]
    pub checked_exception_rollback: bool,
    #[serde(default = "enabled")]
    pub async_conflict: bool,
    /// readOnly 方法调用可写事务方法
    #[serde(default = "enabled")]
    pub read_only_write_call: bool,
    /// readOnly 方法内的写操作
    #[serde(default = "enabled")]
    pub read_only_write_detection: bool,
    /// readOnly 方法内修改懒加载集合 (read_only_write_detection 的子开关)
    #[serde(default = "enabled")]
    pub read_only_collection_mutation: bool,
    #[serde(default = "enabled")]
    pub propagation_conflict: bool,
    #[serde(default = "enabled")]
    pub n1_detection: bool,
    #[serde(default = "enabled")]
    pub n1_in_loops: bool,
    #[serde(default = "enabled")]
    pub n1_in_streams: bool,

    /// 方法名像写操作但声明类型无法确认时，是否判为非写操作
    #[serde(default)]
    pub strict_write_classification: bool,

    /// 只运行这些规则 (为空表示全部)，来自命令行 `--rule`
    #[serde(skip)]
    pub only_rules: BTreeSet<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            same_class_call: true,
            private_modifier: true,
            final_modifier: true,
            static_modifier: true,
            checked_exception_rollback: true,
            async_conflict: true,
            read_only_write_call: true,
            read_only_write_detection: true,
            read_only_collection_mutation: true,
            propagation_conflict: true,
            n1_detection: true,
            n1_in_loops: true,
            n1_in_streams: true,
            strict_write_classification: false,
            only_rules: BTreeSet::new(),
        }
    }
}

impl Config {
    /// 从 YAML 文件加载
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// 显式路径优先；否则尝试分析根目录下的 `.tx-lint.yml`；都没有则使用默认值
    pub fn discover(explicit: Option<&Path>, root: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let candidate: PathBuf = if root.is_dir() {
            root.join(CONFIG_FILE_NAME)
        } else {
            root.parent().unwrap_or(Path::new(".")).join(CONFIG_FILE_NAME)
        };
        if candidate.is_file() {
            debug!("Loading config from {}", candidate.display());
            Self::from_file(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// 限定只运行指定的规则；未知 ID 在分析开始前报错
    pub fn restrict_to<I, S>(mut self, ids: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for id in ids {
            let id = id.as_ref().trim();
            let Some(def) = rules::registry().get(id) else {
                return Err(ConfigError::UnknownRule(id.to_string()));
            };
            self.only_rules.insert(def.id.to_string());
        }
        Ok(self)
    }

    /// 规则是否被 `--rule` 过滤选中
    pub fn selects(&self, rule_id: &str) -> bool {
        self.only_rules.is_empty() || self.only_rules.contains(rule_id)
    }
}
