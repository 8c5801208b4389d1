//! 语义分类器
//!
//! - write_capability: 调用是否为持久化写操作
//! - lazy_relation: 字段 / getter 是否为懒加载关联
//! - exception: 声明抛出的类型是否为受检异常
//!
//! `ClassifierCache` 由分析会话持有，按声明类缓存写能力判定结果。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use parking_lot::RwLock;

use crate::error::AnalysisError;
use crate::symbol_table::{Callee, CallSite, Expr, FieldRef, FieldSymbol, MethodSymbol, SymbolModel};

pub mod exception;
pub mod lazy_relation;
pub mod write_capability;

/// 类 -> 写能力 的并发缓存
///
/// 读多写少；计算在锁外进行，两个线程同时计算同一个类时结果相同，
/// 只有第一次插入生效。
#[derive(Debug, Default)]
pub struct ClassifierCache {
    entries: RwLock<HashMap<String, bool>>,
    generation: AtomicU64,
}

impl ClassifierCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, class: &str) -> Option<bool> {
        self.entries.read().get(class).copied()
    }

    pub fn get_or_compute<F>(&self, class: &str, compute: F) -> Result<bool, AnalysisError>
    where
        F: FnOnce() -> Result<bool, AnalysisError>,
    {
        if let Some(hit) = self.get(class) {
            return Ok(hit);
        }
        let value = compute()?;
        let mut entries = self.entries.write();
        Ok(*entries.entry(class.to_string()).or_insert(value))
    }

    /// 类声明变化后由调用方失效
    pub fn invalidate(&self, class: &str) {
        self.entries.write().remove(class);
    }

    /// 切换到新的快照代：清空全部条目
    pub fn advance_generation(&self) -> u64 {
        let mut entries = self.entries.write();
        entries.clear();
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 规则使用的分类器门面
#[derive(Clone, Copy)]
pub struct Classifiers<'a> {
    pub model: &'a dyn SymbolModel,
    pub cache: &'a ClassifierCache,
    /// 名称匹配但类型无法确认时判为非写操作
    pub strict_writes: bool,
}

impl<'a> Classifiers<'a> {
    pub fn new(model: &'a dyn SymbolModel, cache: &'a ClassifierCache, strict_writes: bool) -> Self {
        Self { model, cache, strict_writes }
    }

    pub fn is_write_capable(&self, callee: &Callee<'_>) -> Result<bool, AnalysisError> {
        write_capability::is_write_capable(self.model, self.cache, callee, self.strict_writes)
    }

    pub fn is_lazy_relation(&self, field: &FieldSymbol) -> bool {
        lazy_relation::is_lazy_relation(field)
    }

    /// 成员访问表达式 (字段 / getter) 若指向懒加载关联则返回该字段
    pub fn lazy_access(&self, caller: &'a MethodSymbol, expr: &'a Expr) -> Option<FieldRef<'a>> {
        self.model
            .resolve_access(caller, expr)
            .filter(|r| lazy_relation::is_lazy_relation(r.field))
    }

    /// 调用点作为 getter 若指向懒加载关联则返回该字段
    pub fn lazy_getter(&self, caller: &'a MethodSymbol, call: &'a CallSite) -> Option<FieldRef<'a>> {
        self.model
            .resolve_getter(caller, call)
            .filter(|r| lazy_relation::is_lazy_relation(r.field))
    }

    pub fn is_checked_exception(&self, context_class: &str, type_text: &str) -> Result<bool, AnalysisError> {
        exception::is_checked(self.model, context_class, type_text)
    }
}
