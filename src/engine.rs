//! Analysis Engine - 两阶段分析驱动
//!
//! - Phase 1: 并行解析所有 Java 文件，构建不可变的 `ProjectModel` 快照
//! - Phase 2: 并行对每个编译单元运行全部已启用规则
//!
//! 失败按 (规则, 编译单元) 隔离：某条规则出错只记录日志，其余规则照常运行；
//! 取消时整个编译单元的结果丢弃，不返回部分列表。

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::classifier::{ClassifierCache, Classifiers};
use crate::config::Config;
use crate::error::AnalysisError;
use crate::report::{Problem, Report};
use crate::rules::{self, RuleContext};
use crate::scanner::{self, JavaFrontend, ProjectModel};
use crate::symbol_table::{CompilationUnit, SymbolModel};

/// 取消信号 (可跨线程克隆共享)
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 对单个编译单元运行全部已启用规则，并过滤被抑制的诊断
pub fn analyze_unit(
    model: &dyn SymbolModel,
    unit: &CompilationUnit,
    config: &Config,
    cache: &ClassifierCache,
    cancel: &CancellationToken,
) -> Result<Vec<Problem>, AnalysisError> {
    if unit.suppression.is_file_suppressed() {
        debug!("{} is fully suppressed", unit.file_name());
        return Ok(Vec::new());
    }

    let ctx = RuleContext {
        model,
        unit,
        config,
        classifiers: Classifiers::new(model, cache, config.strict_write_classification),
        cancel,
    };

    let mut problems = Vec::new();
    for rule in rules::all_rules() {
        if !config.selects(rule.id()) || !rule.is_enabled(config) {
            continue;
        }
        let started = Instant::now();
        match rule.check(&ctx) {
            Ok(found) => {
                debug!(
                    "[{}] {}: {} problem(s) in {:?}",
                    rule.id(),
                    unit.file_name(),
                    found.len(),
                    started.elapsed()
                );
                problems.extend(found);
            }
            Err(AnalysisError::Cancelled) => return Err(AnalysisError::Cancelled),
            Err(err) => warn!("[{}] failed on {}: {}", rule.id(), unit.file_name(), err),
        }
    }
    // 规则之间没有挂起点，最后再确认一次，保证全有或全无
    if cancel.is_cancelled() {
        return Err(AnalysisError::Cancelled);
    }

    problems.retain(|p| !unit.suppression.is_suppressed(&p.rule_id, p.line));
    Ok(problems)
}

// ============================================================================
// Session - 快照 + 缓存
// ============================================================================

/// 分析会话：持有当前快照、配置与分类缓存
pub struct Session {
    model: Arc<ProjectModel>,
    cache: ClassifierCache,
    config: Config,
}

impl Session {
    pub fn new(model: ProjectModel, config: Config) -> Self {
        Self {
            model: Arc::new(model),
            cache: ClassifierCache::new(),
            config,
        }
    }

    /// 当前快照 (调用方可在后台线程持有)
    pub fn snapshot(&self) -> Arc<ProjectModel> {
        Arc::clone(&self.model)
    }

    pub fn cache(&self) -> &ClassifierCache {
        &self.cache
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn analyze_unit(&self, unit: &CompilationUnit, cancel: &CancellationToken) -> Result<Vec<Problem>, AnalysisError> {
        analyze_unit(self.model.as_ref(), unit, &self.config, &self.cache, cancel)
    }

    /// 按路径分析快照中的一个文件
    pub fn analyze_file(&self, path: &Path, cancel: &CancellationToken) -> Result<Vec<Problem>, AnalysisError> {
        let unit = self.model.unit_for(path).ok_or_else(|| AnalysisError::Parse {
            path: path.to_path_buf(),
            reason: "file is not part of the current snapshot".to_string(),
        })?;
        self.analyze_unit(unit, cancel)
    }

    /// 并行分析快照中全部编译单元；被取消的单元不产生任何诊断
    pub fn analyze_all(&self, cancel: &CancellationToken) -> Vec<Problem> {
        self.model
            .units()
            .par_iter()
            .filter_map(|unit| match self.analyze_unit(unit, cancel) {
                Ok(problems) => Some(problems),
                Err(AnalysisError::Cancelled) => {
                    debug!("Analysis of {} cancelled", unit.file_name());
                    None
                }
                Err(err) => {
                    warn!("Skipping {}: {}", unit.file_name(), err);
                    None
                }
            })
            .flatten()
            .collect()
    }

    /// 文件内容变化：重新解析得到新快照，并让分类缓存进入新的一代
    pub fn update_unit(&mut self, frontend: &JavaFrontend, path: &Path, code: &str) -> Result<u64, AnalysisError> {
        let unit = frontend.parse_source(path, code)?;
        self.model = Arc::new(self.model.with_unit(unit));
        let generation = self.cache.advance_generation();
        debug!("Snapshot updated for {} (generation {})", path.display(), generation);
        Ok(generation)
    }
}

// ============================================================================
// 全项目分析
// ============================================================================

/// 解析目录 (或单个文件) 下的全部 Java 源码并运行规则
pub fn analyze_path(root: &Path, config: &Config, cancel: &CancellationToken) -> Result<Report> {
    let started = Instant::now();
    let files = scanner::collect_java_files(root);
    let frontend = JavaFrontend::new().context("failed to initialise Java grammar")?;

    // === Phase 1: Indexing ===
    let parsed: Vec<std::result::Result<CompilationUnit, AnalysisError>> =
        files.par_iter().map(|path| frontend.parse_file(path)).collect();

    let mut units = Vec::with_capacity(parsed.len());
    let mut skipped = 0;
    for result in parsed {
        match result {
            Ok(unit) => units.push(unit),
            Err(err) => {
                warn!("{}", err);
                skipped += 1;
            }
        }
    }
    let analyzed = units.len();
    let model = ProjectModel::new(units);
    debug!("Indexed {} file(s), {} class(es) in {:?}", analyzed, model.class_count(), started.elapsed());

    // === Phase 2: Rules ===
    let session = Session::new(model, config.clone());
    let problems = session.analyze_all(cancel);
    if cancel.is_cancelled() {
        return Err(AnalysisError::Cancelled.into());
    }

    let report = Report::new(problems, analyzed, skipped);
    info!(
        "Analyzed {} file(s) ({} skipped), {} problem(s) in {:?}",
        analyzed,
        skipped,
        report.problems.len(),
        started.elapsed()
    );
    Ok(report)
}
