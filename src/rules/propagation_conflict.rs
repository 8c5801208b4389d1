//! PROPAGATION_CONFLICT - 调用方事务状态与被调方 propagation 冲突
//!
//! 只检查被调方 (方法级，否则类级) 注解中显式写出的 propagation：
//! - MANDATORY 且调用方无事务 -> ERROR
//! - NEVER 且调用方有事务 -> ERROR
//! - REQUIRES_NEW 且调用方有事务 -> WEAK_WARNING
//!
//! 调用方 "有事务" 同时看方法级与类级注解；同类调用与跨类调用同样处理。

use super::{describe, Rule, RuleContext};
use crate::annotation::{self, Propagation};
use crate::config::Config;
use crate::error::AnalysisError;
use crate::report::{Problem, Severity};
use crate::symbol_table::BodyNode;

pub const ID: &str = "PROPAGATION_CONFLICT";

pub struct PropagationConflict;

impl Rule for PropagationConflict {
    fn id(&self) -> &'static str {
        ID
    }

    fn is_enabled(&self, config: &Config) -> bool {
        config.propagation_conflict
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Problem>, AnalysisError> {
        let mut problems = Vec::new();

        for method in ctx.methods() {
            let caller_transactional = annotation::is_transactional(ctx.model, method);

            for call in BodyNode::call_sites(&method.body) {
                ctx.checkpoint()?;
                let Some(target) = ctx.model.resolve_call(method, call).and_then(|c| c.symbol) else {
                    continue;
                };
                let Some(attrs) = annotation::effective_transaction(ctx.model, target) else {
                    continue;
                };
                if !attrs.propagation_explicit {
                    continue;
                }

                let finding = match attrs.propagation {
                    p if p.requires_existing_transaction() && !caller_transactional => Some((
                        Severity::Error,
                        format!(
                            "{} requires an existing transaction (propagation = MANDATORY) but caller {} is not transactional",
                            describe(target),
                            describe(method)
                        ),
                    )),
                    p if p.forbids_existing_transaction() && caller_transactional => Some((
                        Severity::Error,
                        format!(
                            "{} must not run inside a transaction (propagation = NEVER) but caller {} is transactional",
                            describe(target),
                            describe(method)
                        ),
                    )),
                    Propagation::RequiresNew if caller_transactional => Some((
                        Severity::WeakWarning,
                        format!(
                            "{} uses propagation = REQUIRES_NEW inside transactional {}; it commits independently \
                             and is not rolled back with the caller",
                            describe(target),
                            describe(method)
                        ),
                    )),
                    _ => None,
                };

                if let Some((severity, message)) = finding {
                    problems.push(ctx.problem(ID, severity, call.location, message));
                }
            }
        }

        Ok(problems)
    }
}
