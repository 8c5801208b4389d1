//! READ_ONLY_WRITE - readOnly 事务中的写操作
//!
//! 只看方法自身的 `@Transactional(readOnly = true)`：
//! - 调用被判定为写操作的方法 (见 write_capability)
//! - 对懒加载关联集合调用 add / remove / clear 等修改方法 (独立子开关)

use super::{describe, Rule, RuleContext};
use crate::annotation;
use crate::config::Config;
use crate::error::AnalysisError;
use crate::report::{Problem, Severity};
use crate::symbol_table::BodyNode;

pub const ID: &str = "READ_ONLY_WRITE";

const COLLECTION_MUTATORS: [&str; 7] = ["add", "addAll", "remove", "removeAll", "clear", "addFirst", "addLast"];

pub struct ReadOnlyWrite;

impl Rule for ReadOnlyWrite {
    fn id(&self) -> &'static str {
        ID
    }

    fn is_enabled(&self, config: &Config) -> bool {
        config.read_only_write_detection
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Problem>, AnalysisError> {
        let mut problems = Vec::new();

        for method in ctx.methods() {
            let Some(tx) = annotation::method_transaction(method) else {
                continue;
            };
            if !tx.read_only {
                continue;
            }

            for call in BodyNode::call_sites(&method.body) {
                ctx.checkpoint()?;

                // 懒加载集合修改
                if ctx.config.read_only_collection_mutation && COLLECTION_MUTATORS.contains(&call.method.as_str()) {
                    let lazy = call
                        .object
                        .as_ref()
                        .and_then(|object| ctx.classifiers.lazy_access(method, object));
                    if let Some(field) = lazy {
                        let message = format!(
                            "Collection mutation {}.{}() on lazy relationship in read-only transaction method {}",
                            field.field.name,
                            call.method,
                            describe(method)
                        );
                        problems.push(ctx.problem(ID, Severity::Warning, call.location, message));
                        continue;
                    }
                }

                let Some(callee) = ctx.model.resolve_call(method, call) else {
                    continue;
                };
                let write = ctx.skip_invariant(ID, &call.method, ctx.classifiers.is_write_capable(&callee))?;
                if write == Some(true) {
                    let message = format!(
                        "Write operation {}() in read-only transaction method {}",
                        call.method,
                        describe(method)
                    );
                    problems.push(ctx.problem(ID, Severity::Warning, call.location, message));
                }
            }
        }

        Ok(problems)
    }
}
