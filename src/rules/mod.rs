//! 规则注册中心 (Rule Registry)
//!
//! - `RuleDefinition`: 规则元数据 (ID、默认级别、配置开关、说明)
//! - `Rule`: 每条规则的检测逻辑，只依赖 `SymbolModel` 与分类器
//! - 规则抑制见 `suppression`

use std::collections::HashMap;
use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::warn;

use crate::classifier::Classifiers;
use crate::config::Config;
use crate::engine::CancellationToken;
use crate::error::AnalysisError;
use crate::report::{Problem, Severity};
use crate::symbol_table::{CompilationUnit, MethodSymbol, SymbolModel, TextRange};

pub mod definitions;
pub mod suppression;

pub mod async_conflict;
pub mod checked_exception;
pub mod invalid_modifier;
pub mod n_plus_one;
pub mod propagation_conflict;
pub mod read_only_calls_write;
pub mod read_only_write;
pub mod same_class_call;

/// 规则定义
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDefinition {
    /// 规则唯一标识符
    pub id: &'static str,
    /// 默认严重级别 (部分分支可能更高或更低)
    pub severity: Severity,
    /// 控制该规则的配置开关
    pub config_keys: &'static [&'static str],
    /// 简短描述
    pub description: &'static str,
    /// 为什么是问题
    pub rationale: &'static str,
}

/// 规则注册表
pub struct RuleRegistry {
    rules: HashMap<&'static str, RuleDefinition>,
    order: Vec<&'static str>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            rules: HashMap::new(),
            order: Vec::new(),
        };
        for rule in definitions::all_rules() {
            registry.register(rule);
        }
        registry
    }

    fn register(&mut self, rule: RuleDefinition) {
        self.order.push(rule.id);
        self.rules.insert(rule.id, rule);
    }

    pub fn get(&self, id: &str) -> Option<&RuleDefinition> {
        self.rules.get(id)
    }

    /// 按定义顺序返回所有规则
    pub fn all(&self) -> impl Iterator<Item = &RuleDefinition> {
        self.order.iter().filter_map(|id| self.rules.get(id))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// 全局规则注册表 (延迟初始化)
pub static REGISTRY: Lazy<RuleRegistry> = Lazy::new(RuleRegistry::new);

pub fn registry() -> &'static RuleRegistry {
    &REGISTRY
}

// ============================================================================
// Rule Trait
// ============================================================================

/// 规则执行上下文 (单个编译单元)
pub struct RuleContext<'a> {
    pub model: &'a dyn SymbolModel,
    pub unit: &'a CompilationUnit,
    pub config: &'a Config,
    pub classifiers: Classifiers<'a>,
    pub cancel: &'a CancellationToken,
}

impl<'a> RuleContext<'a> {
    pub fn methods(&self) -> impl Iterator<Item = &'a MethodSymbol> {
        self.unit.methods()
    }

    /// 取消检查点：每个调用点 / 循环边界调用一次
    pub fn checkpoint(&self) -> Result<(), AnalysisError> {
        if self.cancel.is_cancelled() {
            Err(AnalysisError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn problem(&self, rule_id: &str, severity: Severity, location: TextRange, message: String) -> Problem {
        Problem::new(rule_id, severity, self.unit.file_name(), location, message)
    }

    /// 分类器的不变量错误只跳过当前位置，其余错误继续向上传播
    pub fn skip_invariant<T>(&self, rule_id: &str, site: &str, result: Result<T, AnalysisError>) -> Result<Option<T>, AnalysisError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(AnalysisError::InvariantViolation(msg)) => {
                warn!("[{}] skipping {} in {}: {}", rule_id, site, self.unit.file_name(), msg);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

/// 规则处理器 trait
pub trait Rule: Send + Sync {
    fn id(&self) -> &'static str;

    /// 配置关闭时规则不做任何遍历
    fn is_enabled(&self, config: &Config) -> bool;

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Problem>, AnalysisError>;
}

/// 全部规则实现 (与 `definitions::all_rules` 一一对应)
pub static RULES: Lazy<Vec<Box<dyn Rule>>> = Lazy::new(|| {
    vec![
        Box::new(same_class_call::SameClassCall),
        Box::new(invalid_modifier::InvalidModifier),
        Box::new(read_only_write::ReadOnlyWrite),
        Box::new(read_only_calls_write::ReadOnlyCallsWrite),
        Box::new(propagation_conflict::PropagationConflict),
        Box::new(async_conflict::AsyncConflict),
        Box::new(checked_exception::CheckedExceptionRollback),
        Box::new(n_plus_one::NPlusOne),
    ]
});

pub fn all_rules() -> &'static [Box<dyn Rule>] {
    &RULES
}

/// 方法位置的简短描述，用于消息文本
pub(crate) fn describe(method: &MethodSymbol) -> String {
    let class = method.class.rsplit('.').next().unwrap_or(&method.class);
    format!("{}.{}()", class, method.name)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::classifier::{ClassifierCache, Classifiers};
    use crate::config::Config;
    use crate::engine::CancellationToken;
    use crate::report::Problem;
    use crate::scanner::test_support::model_of;
    use crate::symbol_table::SymbolModel;

    use super::{Rule, RuleContext};

    /// 对第一个文件运行单条规则
    pub fn run_rule_with(rule: &dyn Rule, config: &Config, files: &[(&str, &str)]) -> Vec<Problem> {
        let model = model_of(files);
        let cache = ClassifierCache::new();
        let cancel = CancellationToken::new();
        let unit = model.units()[0].clone();
        let ctx = RuleContext {
            model: &model as &dyn SymbolModel,
            unit: &unit,
            config,
            classifiers: Classifiers::new(&model, &cache, config.strict_write_classification),
            cancel: &cancel,
        };
        let mut problems = rule.check(&ctx).expect("rule check");
        problems.sort_by_key(|p| p.start_offset);
        problems
    }

    pub fn run_rule(rule: &dyn Rule, files: &[(&str, &str)]) -> Vec<Problem> {
        run_rule_with(rule, &Config::default(), files)
    }
}
