//! CHECKED_EXCEPTION_ROLLBACK - 受检异常不会触发回滚
//!
//! 生效的事务注解没有 rollbackFor，而方法 throws 中声明了受检异常时报告。
//! 给出两个修复：rollbackFor 精确设为找到的受检异常；或者统一设为 Exception。

use super::{describe, Rule, RuleContext};
use crate::annotation::{self, TransactionAttributes};
use crate::config::Config;
use crate::error::AnalysisError;
use crate::report::{Problem, RetainedAttribute, Severity, SuggestedFix};

pub const ID: &str = "CHECKED_EXCEPTION_ROLLBACK";

const CATCH_ALL: &str = "Exception";

pub struct CheckedExceptionRollback;

impl Rule for CheckedExceptionRollback {
    fn id(&self) -> &'static str {
        ID
    }

    fn is_enabled(&self, config: &Config) -> bool {
        config.checked_exception_rollback
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Problem>, AnalysisError> {
        let mut problems = Vec::new();

        for method in ctx.methods() {
            ctx.checkpoint()?;
            if method.throws.is_empty() {
                continue;
            }
            let Some(view) = annotation::effective_view(ctx.model, method) else {
                continue;
            };
            let attrs = TransactionAttributes::from_view(view);
            if attrs.has_rollback_rules() {
                continue;
            }

            let mut checked: Vec<String> = Vec::new();
            for thrown in &method.throws {
                let result = ctx.classifiers.is_checked_exception(&method.class, thrown);
                if ctx.skip_invariant(ID, thrown, result)? == Some(true) {
                    checked.push(annotation::normalize_type_name(thrown));
                }
            }
            if checked.is_empty() {
                continue;
            }

            let specific = annotation::merge_type_names(&attrs.rollback_for, &checked);
            let retained = RetainedAttribute::from_pairs(annotation::attributes_except(
                view,
                &["rollbackFor", "rollbackForClassName"],
            ));

            let message = format!(
                "{} declares checked exception(s) {} but @Transactional has no rollbackFor; \
                 the transaction commits when they are thrown",
                describe(method),
                specific.join(", ")
            );
            let location = method.throws_location.unwrap_or(method.location);
            problems.push(
                ctx.problem(ID, Severity::Warning, location, message)
                    .with_fix(SuggestedFix::SetRollbackFor {
                        rollback_for: specific,
                        retained: retained.clone(),
                    })
                    .with_fix(SuggestedFix::SetRollbackFor {
                        rollback_for: vec![CATCH_ALL.to_string()],
                        retained,
                    }),
            );
        }

        Ok(problems)
    }
}
