//! READ_ONLY_CALLS_WRITE - readOnly 方法调用可写的 @Transactional 方法
//!
//! 被调方法自身的事务注解 readOnly = false 且 propagation 会加入已有事务时，
//! 它的写操作实际运行在调用方的只读事务里。
//! 跨类调用建议把被调方改为 REQUIRES_NEW；同类调用绕过代理，改 propagation 无效，报 ERROR。

use super::{describe, Rule, RuleContext};
use crate::annotation::{self, Propagation, TransactionAttributes};
use crate::config::Config;
use crate::error::AnalysisError;
use crate::report::{Problem, RetainedAttribute, Severity, SuggestedFix};
use crate::symbol_table::BodyNode;

pub const ID: &str = "READ_ONLY_CALLS_WRITE";

pub struct ReadOnlyCallsWrite;

impl Rule for ReadOnlyCallsWrite {
    fn id(&self) -> &'static str {
        ID
    }

    fn is_enabled(&self, config: &Config) -> bool {
        config.read_only_write_call
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Problem>, AnalysisError> {
        let mut problems = Vec::new();

        for method in ctx.methods() {
            let read_only = annotation::effective_transaction(ctx.model, method)
                .map(|tx| tx.read_only)
                .unwrap_or(false);
            if !read_only {
                continue;
            }

            for call in BodyNode::call_sites(&method.body) {
                ctx.checkpoint()?;
                let Some(target) = ctx.model.resolve_call(method, call).and_then(|c| c.symbol) else {
                    continue;
                };
                let Some(view) = annotation::find_transactional(&target.annotations) else {
                    continue;
                };
                let attrs = TransactionAttributes::from_view(view);
                if attrs.read_only || !attrs.propagation.joins_existing_transaction() {
                    continue;
                }

                if target.class == method.class {
                    let message = format!(
                        "Read-only method {} calls write-capable transactional method {} in the same class; \
                         it runs inside the read-only transaction and changing its propagation cannot help a self-invocation",
                        describe(method),
                        describe(target)
                    );
                    problems.push(ctx.problem(ID, Severity::Error, call.location, message));
                } else {
                    let message = format!(
                        "Read-only method {} calls write-capable transactional method {} (propagation = {}); \
                         it joins the read-only transaction",
                        describe(method),
                        describe(target),
                        attrs.propagation
                    );
                    let fix = SuggestedFix::SetPropagation {
                        target_method: target.qualified_name(),
                        propagation: Propagation::RequiresNew,
                        retained: RetainedAttribute::from_pairs(annotation::attributes_except(view, &["propagation"])),
                    };
                    problems.push(ctx.problem(ID, Severity::Warning, call.location, message).with_fix(fix));
                }
            }
        }

        Ok(problems)
    }
}
