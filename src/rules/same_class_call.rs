//! SAME_CLASS_CALL - 同类调用绕过事务代理
//!
//! 无限定或 `this.` 调用同一个类中带 @Transactional 的方法时，调用不经过代理，
//! 被调方法的事务属性在运行时不生效。每个调用点报告一次，与嵌套层级无关。

use super::suppression::suppression_comment;
use super::{describe, Rule, RuleContext};
use crate::annotation;
use crate::config::Config;
use crate::error::AnalysisError;
use crate::report::{Problem, Severity, SuggestedFix};
use crate::symbol_table::{BodyNode, ReceiverKind};

pub const ID: &str = "SAME_CLASS_CALL";

pub struct SameClassCall;

impl Rule for SameClassCall {
    fn id(&self) -> &'static str {
        ID
    }

    fn is_enabled(&self, config: &Config) -> bool {
        config.same_class_call
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Problem>, AnalysisError> {
        let mut problems = Vec::new();

        for method in ctx.methods() {
            for call in BodyNode::call_sites(&method.body) {
                ctx.checkpoint()?;
                if call.receiver_kind() == ReceiverKind::Other {
                    continue;
                }
                let Some(target) = ctx.model.resolve_call(method, call).and_then(|c| c.symbol) else {
                    continue;
                };
                if target.class != method.class || annotation::find_transactional(&target.annotations).is_none() {
                    continue;
                }

                let message = format!(
                    "Self-invocation of @Transactional method {} bypasses the transaction proxy; its transaction attributes are ignored",
                    describe(target)
                );
                problems.push(
                    ctx.problem(ID, Severity::Warning, call.location, message)
                        .with_fix(SuggestedFix::AddSuppressionComment {
                            rule_id: ID.to_string(),
                            comment: suppression_comment(ID, "self-invocation is intentional"),
                        }),
                );
            }
        }

        Ok(problems)
    }
}
