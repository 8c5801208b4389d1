//! 规则定义
//!
//! 所有规则的元数据在此集中定义，确保单一数据源

use super::RuleDefinition;
use crate::report::Severity;

/// 获取所有规则定义 (按报告顺序)
pub fn all_rules() -> Vec<RuleDefinition> {
    let mut rules = Vec::new();

    // === 代理绕过 / 修饰符 ===
    rules.extend(proxy_rules());

    // === 只读事务 ===
    rules.extend(read_only_rules());

    // === 传播行为 / 异步 / 回滚 ===
    rules.extend(semantics_rules());

    // === 懒加载 ===
    rules.extend(lazy_loading_rules());

    rules
}

// ============================================================================
// 代理绕过
// ============================================================================

fn proxy_rules() -> Vec<RuleDefinition> {
    vec![
        RuleDefinition {
            id: "SAME_CLASS_CALL",
            severity: Severity::Warning,
            config_keys: &["sameClassCall"],
            description: "同类内部调用 @Transactional 方法，绕过事务代理",
            rationale: "Calls through `this` never reach the transaction proxy, so the callee's \
                        @Transactional attributes have no effect at runtime.",
        },
        RuleDefinition {
            id: "INVALID_MODIFIER",
            severity: Severity::Warning,
            config_keys: &["privateModifier", "finalModifier", "staticModifier"],
            description: "@Transactional 标注在 private / final / static 方法上",
            rationale: "Proxies cannot intercept private, final or static methods; the annotation \
                        is silently ignored.",
        },
    ]
}

// ============================================================================
// 只读事务
// ============================================================================

fn read_only_rules() -> Vec<RuleDefinition> {
    vec![
        RuleDefinition {
            id: "READ_ONLY_WRITE",
            severity: Severity::Warning,
            config_keys: &["readOnlyWriteDetection", "readOnlyCollectionMutation"],
            description: "readOnly 事务中执行写操作或修改懒加载集合",
            rationale: "Writes under a read-only transaction may be skipped on flush or rejected \
                        by the driver.",
        },
        RuleDefinition {
            id: "READ_ONLY_CALLS_WRITE",
            severity: Severity::Warning,
            config_keys: &["readOnlyWriteCall"],
            description: "readOnly 方法调用会加入当前事务的可写 @Transactional 方法",
            rationale: "The callee joins the caller's read-only transaction, so its writes run \
                        read-only. Same-class calls are reported as errors because changing \
                        propagation cannot help a proxy-bypassed call.",
        },
    ]
}

// ============================================================================
// 传播行为 / 异步 / 回滚
// ============================================================================

fn semantics_rules() -> Vec<RuleDefinition> {
    vec![
        RuleDefinition {
            id: "PROPAGATION_CONFLICT",
            severity: Severity::Error,
            config_keys: &["propagationConflict"],
            description: "调用方事务状态与被调方 propagation 冲突 (MANDATORY / NEVER / REQUIRES_NEW)",
            rationale: "MANDATORY without a caller transaction and NEVER inside one throw at \
                        runtime; REQUIRES_NEW commits independently of a rolled-back parent.",
        },
        RuleDefinition {
            id: "ASYNC_CONFLICT",
            severity: Severity::Warning,
            config_keys: &["asyncConflict"],
            description: "@Async 与 @Transactional 冲突 / 异步线程访问懒加载关联 / 同类调用 @Async",
            rationale: "The async executor runs outside the caller's transaction and persistence \
                        context; same-class calls execute synchronously.",
        },
        RuleDefinition {
            id: "CHECKED_EXCEPTION_ROLLBACK",
            severity: Severity::Warning,
            config_keys: &["checkedExceptionRollback"],
            description: "声明受检异常但未配置 rollbackFor",
            rationale: "By default only unchecked exceptions trigger rollback; a checked exception \
                        commits the partial work.",
        },
    ]
}

// ============================================================================
// 懒加载
// ============================================================================

fn lazy_loading_rules() -> Vec<RuleDefinition> {
    vec![RuleDefinition {
        id: "N_PLUS_ONE",
        severity: Severity::Warning,
        config_keys: &["n1Detection", "n1InLoops", "n1InStreams"],
        description: "循环 / 流操作中访问懒加载关联 (N+1 查询)",
        rationale: "Each iteration triggers one extra query to initialise the lazy association.",
    }]
}
