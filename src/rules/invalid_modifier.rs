//! INVALID_MODIFIER - @Transactional 标注在代理无法拦截的方法上
//!
//! private / final / static 各自有独立的配置开关；同一方法上多个修饰符分别报告。

use super::{describe, Rule, RuleContext};
use crate::annotation::{self, TRANSACTIONAL};
use crate::config::Config;
use crate::error::AnalysisError;
use crate::report::{Problem, Severity, SuggestedFix};
use crate::symbol_table::Visibility;

pub const ID: &str = "INVALID_MODIFIER";

pub struct InvalidModifier;

fn remove_annotation() -> SuggestedFix {
    SuggestedFix::RemoveAnnotation {
        annotation: TRANSACTIONAL.to_string(),
    }
}

impl Rule for InvalidModifier {
    fn id(&self) -> &'static str {
        ID
    }

    fn is_enabled(&self, config: &Config) -> bool {
        config.private_modifier || config.final_modifier || config.static_modifier
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Problem>, AnalysisError> {
        let mut problems = Vec::new();

        for method in ctx.methods() {
            ctx.checkpoint()?;
            let Some(view) = annotation::find_transactional(&method.annotations) else {
                continue;
            };
            let modifiers = method.modifiers;

            if ctx.config.private_modifier && modifiers.visibility == Visibility::Private {
                let message = format!(
                    "@Transactional on private method {} has no effect: proxies cannot intercept private methods",
                    describe(method)
                );
                problems.push(
                    ctx.problem(ID, Severity::Warning, view.location, message)
                        .with_fix(SuggestedFix::ChangeVisibility { visibility: "public".to_string() })
                        .with_fix(remove_annotation()),
                );
            }

            for (enabled, flag, keyword) in [
                (ctx.config.final_modifier, modifiers.is_final, "final"),
                (ctx.config.static_modifier, modifiers.is_static, "static"),
            ] {
                if !(enabled && flag) {
                    continue;
                }
                let message = format!(
                    "@Transactional on {} method {} has no effect: proxies cannot intercept {} methods",
                    keyword,
                    describe(method),
                    keyword
                );
                problems.push(
                    ctx.problem(ID, Severity::Warning, view.location, message)
                        .with_fix(SuggestedFix::RemoveModifier { modifier: keyword.to_string() })
                        .with_fix(remove_annotation()),
                );
            }
        }

        Ok(problems)
    }
}
