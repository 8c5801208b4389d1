//! 事务注解解析
//!
//! 从 `AnnotationView` 派生出完全填充默认值的 `TransactionAttributes`。
//! 形状不符合预期的属性一律按"未设置"处理。

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::symbol_table::{AnnotationValue, AnnotationView, MethodSymbol, SymbolModel};

pub const TRANSACTIONAL: &str = "org.springframework.transaction.annotation.Transactional";
pub const ASYNC: &str = "org.springframework.scheduling.annotation.Async";
pub const REPOSITORY: &str = "org.springframework.stereotype.Repository";
pub const ENTITY: [&str; 2] = ["jakarta.persistence.Entity", "javax.persistence.Entity"];

/// 事务传播行为
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Propagation {
    #[default]
    Required,
    RequiresNew,
    Mandatory,
    Supports,
    NotSupported,
    Never,
    Nested,
}

impl Propagation {
    pub const ALL: [Propagation; 7] = [
        Propagation::Required,
        Propagation::RequiresNew,
        Propagation::Mandatory,
        Propagation::Supports,
        Propagation::NotSupported,
        Propagation::Never,
        Propagation::Nested,
    ];

    /// 解析 `Propagation.REQUIRES_NEW` / `REQUIRES_NEW` 等写法；无法识别时为 REQUIRED
    pub fn parse(text: &str) -> Self {
        let ident = text.trim().rsplit('.').next().unwrap_or("").trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == ident)
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Propagation::Required => "REQUIRED",
            Propagation::RequiresNew => "REQUIRES_NEW",
            Propagation::Mandatory => "MANDATORY",
            Propagation::Supports => "SUPPORTS",
            Propagation::NotSupported => "NOT_SUPPORTED",
            Propagation::Never => "NEVER",
            Propagation::Nested => "NESTED",
        }
    }

    /// 加入调用方已有事务
    pub fn joins_existing_transaction(&self) -> bool {
        matches!(self, Propagation::Required | Propagation::Supports | Propagation::Mandatory)
    }

    pub fn requires_existing_transaction(&self) -> bool {
        matches!(self, Propagation::Mandatory)
    }

    pub fn forbids_existing_transaction(&self) -> bool {
        matches!(self, Propagation::Never)
    }
}

impl fmt::Display for Propagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 事务注解属性 (所有字段均已填充默认值)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionAttributes {
    pub propagation: Propagation,
    /// 源码中是否显式写了 propagation
    pub propagation_explicit: bool,
    pub read_only: bool,
    /// rollbackFor + rollbackForClassName，按出现顺序去重；不含 `.class` 后缀
    pub rollback_for: Vec<String>,
    pub timeout: Option<i64>,
}

impl TransactionAttributes {
    pub fn from_view(view: &AnnotationView) -> Self {
        let propagation_value = view.attribute("propagation").and_then(AnnotationValue::as_text);

        let read_only = view
            .attribute("readOnly")
            .and_then(AnnotationValue::as_text)
            .map(|t| t.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let mut rollback_for = Vec::new();
        for key in ["rollbackFor", "rollbackForClassName"] {
            if let Some(value) = view.attribute(key) {
                for item in value.items() {
                    let name = normalize_type_name(item);
                    if !name.is_empty() && !rollback_for.contains(&name) {
                        rollback_for.push(name);
                    }
                }
            }
        }

        let timeout = view
            .attribute("timeout")
            .and_then(AnnotationValue::as_text)
            .and_then(|t| t.trim().parse::<i64>().ok());

        Self {
            propagation: propagation_value.map(Propagation::parse).unwrap_or_default(),
            propagation_explicit: propagation_value.is_some(),
            read_only,
            rollback_for,
            timeout,
        }
    }

    pub fn has_rollback_rules(&self) -> bool {
        !self.rollback_for.is_empty()
    }
}

/// `IOException.class` / `"java.io.IOException"` -> `IOException` / `java.io.IOException`
pub fn normalize_type_name(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('"').trim();
    trimmed.strip_suffix(".class").unwrap_or(trimmed).trim().to_string()
}

/// 有序去重并集
pub fn merge_type_names(existing: &[String], added: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(existing.len() + added.len());
    for name in existing.iter().chain(added) {
        if !merged.contains(name) {
            merged.push(name.clone());
        }
    }
    merged
}

// ============================================================================
// 注解查找
// ============================================================================

/// 第一个匹配的注解
pub fn find<'a>(annotations: &'a [AnnotationView], fqn: &str) -> Option<&'a AnnotationView> {
    annotations.iter().find(|a| a.is(fqn))
}

pub fn has(annotations: &[AnnotationView], fqn: &str) -> bool {
    find(annotations, fqn).is_some()
}

pub fn find_transactional(annotations: &[AnnotationView]) -> Option<&AnnotationView> {
    find(annotations, TRANSACTIONAL)
}

pub fn is_entity(annotations: &[AnnotationView]) -> bool {
    ENTITY.iter().any(|fqn| has(annotations, fqn))
}

/// 方法自身的事务注解
pub fn method_transaction(method: &MethodSymbol) -> Option<TransactionAttributes> {
    find_transactional(&method.annotations).map(TransactionAttributes::from_view)
}

/// 生效的事务注解视图：方法级优先，其次声明类
pub fn effective_view<'a>(model: &'a dyn SymbolModel, method: &'a MethodSymbol) -> Option<&'a AnnotationView> {
    find_transactional(&method.annotations)
        .or_else(|| find_transactional(model.annotations_of_class(&method.class)))
}

pub fn effective_transaction(model: &dyn SymbolModel, method: &MethodSymbol) -> Option<TransactionAttributes> {
    effective_view(model, method).map(TransactionAttributes::from_view)
}

/// 方法级或类级带有事务注解
pub fn is_transactional(model: &dyn SymbolModel, method: &MethodSymbol) -> bool {
    effective_view(model, method).is_some()
}

/// 注解属性的源码形式，排除指定的属性名 (用于修复建议中合并已有属性)
pub fn attributes_except(view: &AnnotationView, excluded: &[&str]) -> Vec<(String, String)> {
    view.attributes
        .iter()
        .filter(|(key, _)| !excluded.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.to_source()))
        .collect()
}
