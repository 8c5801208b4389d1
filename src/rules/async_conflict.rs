//! ASYNC_CONFLICT - @Async 与事务 / 持久化上下文的冲突
//!
//! 三个相互独立的子检查：
//! - (a) 方法同时带 @Async 与 @Transactional
//! - (b) @Async 方法访问实体上的懒加载关联 (异步线程中没有调用方的持久化上下文)
//! - (c) 同类内调用 @Async 方法，绕过代理后同步执行

use super::{describe, Rule, RuleContext};
use crate::annotation::{self, ASYNC, TRANSACTIONAL};
use crate::config::Config;
use crate::error::AnalysisError;
use crate::report::{Problem, Severity, SuggestedFix};
use crate::symbol_table::{BodyNode, FieldRef, MethodSymbol, ReceiverKind, TextRange};

pub const ID: &str = "ASYNC_CONFLICT";

pub struct AsyncConflict;

impl AsyncConflict {
    fn lazy_entity_accesses<'a>(
        &self,
        ctx: &RuleContext<'a>,
        method: &'a MethodSymbol,
        problems: &mut Vec<Problem>,
    ) -> Result<(), AnalysisError> {
        let mut hits: Vec<(FieldRef<'a>, TextRange)> = Vec::new();
        let mut cancelled = false;

        BodyNode::walk(&method.body, &mut |node| {
            if cancelled {
                return;
            }
            if ctx.checkpoint().is_err() {
                cancelled = true;
                return;
            }
            let hit = match node {
                BodyNode::Access(access) => ctx
                    .classifiers
                    .lazy_access(method, &access.expr)
                    .map(|field| (field, access.location)),
                BodyNode::Call(call) => ctx
                    .classifiers
                    .lazy_getter(method, call)
                    .map(|field| (field, call.location)),
                BodyNode::ForEach { .. } | BodyNode::StreamLambda { .. } => None,
            };
            if let Some((field, location)) = hit {
                if annotation::is_entity(&field.owner.annotations) {
                    hits.push((field, location));
                }
            }
        });
        if cancelled {
            return Err(AnalysisError::Cancelled);
        }

        for (field, location) in hits {
            let message = format!(
                "@Async method {} accesses lazy relationship {}.{}; it runs outside the caller's persistence context \
                 and may fail with LazyInitializationException",
                describe(method),
                field.owner.name,
                field.field.name
            );
            problems.push(ctx.problem(ID, Severity::Warning, location, message));
        }
        Ok(())
    }
}

impl Rule for AsyncConflict {
    fn id(&self) -> &'static str {
        ID
    }

    fn is_enabled(&self, config: &Config) -> bool {
        config.async_conflict
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Problem>, AnalysisError> {
        let mut problems = Vec::new();

        for method in ctx.methods() {
            ctx.checkpoint()?;
            let async_view = annotation::find(&method.annotations, ASYNC);

            // (a)
            if let (Some(marker), Some(_)) = (async_view, annotation::find_transactional(&method.annotations)) {
                let message = format!(
                    "{} is both @Async and @Transactional; the transaction belongs to the executor thread, \
                     not to the caller",
                    describe(method)
                );
                problems.push(
                    ctx.problem(ID, Severity::Warning, marker.location, message)
                        .with_fix(SuggestedFix::RemoveAnnotation { annotation: ASYNC.to_string() })
                        .with_fix(SuggestedFix::RemoveAnnotation { annotation: TRANSACTIONAL.to_string() }),
                );
            }

            // (b)
            if async_view.is_some() {
                self.lazy_entity_accesses(ctx, method, &mut problems)?;
            }

            // (c)
            for call in BodyNode::call_sites(&method.body) {
                ctx.checkpoint()?;
                if call.receiver_kind() == ReceiverKind::Other {
                    continue;
                }
                let Some(target) = ctx.model.resolve_call(method, call).and_then(|c| c.symbol) else {
                    continue;
                };
                if target.class == method.class && annotation::has(&target.annotations, ASYNC) {
                    let message = format!(
                        "@Async method {} called from the same class executes synchronously",
                        describe(target)
                    );
                    problems.push(ctx.problem(ID, Severity::Warning, call.location, message));
                }
            }
        }

        Ok(problems)
    }
}
