//! CLI 模式处理器
//!
//! 提供命令行接口，默认输出人类可读格式
//! 使用 --format=json 可输出 JSON 格式
//!
//! 退出码：0 = 没有达到阈值的诊断，1 = 达到 `--fail-on` 阈值，2 = 配置错误

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;

use crate::config::Config;
use crate::engine::{self, CancellationToken};
use crate::error::ConfigError;
use crate::report::{Report, Severity};
use crate::rules;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FINDINGS: i32 = 1;
pub const EXIT_CONFIG_ERROR: i32 = 2;

/// Spring @Transactional anti-pattern analyzer
#[derive(Parser, Debug)]
#[command(name = "tx-lint", author, version, about, long_about = None)]
pub struct Args {
    /// 日志级别 (RUST_LOG 优先)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// 输出格式
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

/// 失败阈值
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Error,
    Warning,
}

impl FailOn {
    pub fn threshold(self) -> Severity {
        match self {
            FailOn::Error => Severity::Error,
            FailOn::Warning => Severity::Warning,
        }
    }
}

/// CLI Commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// 🔍 分析项目目录或单个 Java 文件
    Analyze {
        /// 项目路径或 .java 文件
        path: PathBuf,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,

        /// 只运行指定规则 (可重复)
        #[arg(long = "rule", value_name = "ID")]
        rules: Vec<String>,

        #[arg(long, value_enum, default_value_t = FailOn::Error)]
        fail_on: FailOn,

        /// 配置文件 (默认读取分析根目录下的 .tx-lint.yml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// 📋 列出所有规则
    Rules {
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

/// 处理 CLI 命令，返回进程退出码
pub fn handle_command(cmd: Command) -> Result<i32> {
    match cmd {
        Command::Analyze { path, format, rules, fail_on, config } => {
            run_analyze(&path, format, &rules, fail_on, config.as_deref())
        }
        Command::Rules { format } => {
            println!("{}", render_rules(format)?);
            Ok(EXIT_OK)
        }
    }
}

/// 配置加载 + `--rule` 过滤；任何错误都在分析开始前返回
pub fn load_config(explicit: Option<&Path>, root: &Path, rule_ids: &[String]) -> Result<Config, ConfigError> {
    Config::discover(explicit, root)?.restrict_to(rule_ids)
}

fn run_analyze(path: &Path, format: Format, rule_ids: &[String], fail_on: FailOn, config: Option<&Path>) -> Result<i32> {
    if !path.exists() {
        bail!("Path not found: {}", path.display());
    }

    let config = match load_config(config, path, rule_ids) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {:#}", anyhow::Error::from(err));
            return Ok(EXIT_CONFIG_ERROR);
        }
    };

    let report = engine::analyze_path(path, &config, &CancellationToken::new())?;
    println!("{}", render_report(&report, format)?);
    Ok(exit_code(&report, fail_on))
}

pub fn exit_code(report: &Report, fail_on: FailOn) -> i32 {
    if report.fails(fail_on.threshold()) {
        EXIT_FINDINGS
    } else {
        EXIT_OK
    }
}

pub fn render_report(report: &Report, format: Format) -> Result<String> {
    Ok(match format {
        Format::Json => serde_json::to_string_pretty(&report.to_json())?,
        Format::Text => report.render_text(),
    })
}

fn render_rules(format: Format) -> Result<String> {
    let registry = rules::registry();
    match format {
        Format::Json => {
            let defs: Vec<_> = registry.all().collect();
            Ok(serde_json::to_string_pretty(&json!({ "rules": defs }))?)
        }
        Format::Text => {
            let mut out = format!("📋 tx-lint rules ({})\n\n", registry.len());
            for def in registry.all() {
                out.push_str(&format!(
                    "{:<28} {:<8} {}\n{:<37} config: {}\n",
                    def.id,
                    def.severity.as_str(),
                    def.description,
                    "",
                    def.config_keys.join(", ")
                ));
            }
            Ok(out)
        }
    }
}
