//! 诊断抑制
//!
//! 注释指令:
//!    // tx-lint-ignore: SAME_CLASS_CALL               (本行)
//!    // tx-lint-ignore-next-line: A, B -- 原因        (下一行)
//!    // tx-lint-ignore-file[: A]                      (整个文件，不带规则表示全部)
//!
//! 注解 (作用于被注解的整个类 / 方法 / 字段声明，包括方法体):
//!    @SuppressWarnings({"unchecked", "tx-lint:CHECKED_EXCEPTION_ROLLBACK"})
//!
//! 注释在这里逐行解析；注解的声明范围由前端在提取时登记 (`suppress_declaration`)。

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;

pub const SUPPRESS_PREFIX: &str = "tx-lint";

// `--` 之后是自由文本原因，规则表到此为止
static DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"//.*?tx-lint-ignore(?P<scope>-next-line|-file)?(?::(?P<rules>[^-\n]*))?").unwrap()
});

static ANNOTATED_RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""tx-lint:([A-Z0-9_]+)""#).unwrap());

/// 一条指令覆盖的规则
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSet {
    All,
    Only(BTreeSet<String>),
}

impl RuleSet {
    fn from_list(list: Option<&str>) -> Self {
        let ids: BTreeSet<String> = list
            .unwrap_or_default()
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        if ids.is_empty() {
            RuleSet::All
        } else {
            RuleSet::Only(ids)
        }
    }

    pub fn covers(&self, rule_id: &str) -> bool {
        match self {
            RuleSet::All => true,
            RuleSet::Only(ids) => ids.contains(rule_id),
        }
    }

    fn absorb(&mut self, other: RuleSet) {
        match other {
            RuleSet::All => *self = RuleSet::All,
            RuleSet::Only(theirs) => {
                if let RuleSet::Only(mine) = self {
                    mine.extend(theirs);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    ThisLine,
    NextLine,
    File,
}

/// 单个文件的抑制表 (行号从 1 开始)
#[derive(Debug, Clone, Default)]
pub struct SuppressionContext {
    by_line: BTreeMap<usize, RuleSet>,
    /// 带 `@SuppressWarnings` 的声明: (首行, 末行, 规则)
    declarations: Vec<(usize, usize, BTreeSet<String>)>,
    file: Option<RuleSet>,
}

impl SuppressionContext {
    pub fn parse(code: &str) -> Self {
        let mut ctx = Self::default();

        for (index, text) in code.lines().enumerate() {
            let line = index + 1;

            if let Some((scope, rules)) = directive(text) {
                match scope {
                    Scope::ThisLine => ctx.add_line(line, rules),
                    Scope::NextLine => ctx.add_line(line + 1, rules),
                    Scope::File => match ctx.file.as_mut() {
                        Some(existing) => existing.absorb(rules),
                        None => ctx.file = Some(rules),
                    },
                }
            }
        }

        ctx
    }

    fn add_line(&mut self, line: usize, rules: RuleSet) {
        match self.by_line.get_mut(&line) {
            Some(existing) => existing.absorb(rules),
            None => {
                self.by_line.insert(line, rules);
            }
        }
    }

    /// 声明 [first_line, last_line] 内的指定规则全部抑制
    pub fn suppress_declaration(&mut self, first_line: usize, last_line: usize, rule_ids: BTreeSet<String>) {
        if !rule_ids.is_empty() {
            self.declarations.push((first_line, last_line.max(first_line), rule_ids));
        }
    }

    pub fn is_suppressed(&self, rule_id: &str, line: usize) -> bool {
        self.file.as_ref().is_some_and(|r| r.covers(rule_id))
            || self.by_line.get(&line).is_some_and(|r| r.covers(rule_id))
            || self
                .declarations
                .iter()
                .any(|(first, last, ids)| (*first..=*last).contains(&line) && ids.contains(rule_id))
    }

    /// 整个文件的所有规则都被抑制
    pub fn is_file_suppressed(&self) -> bool {
        self.file == Some(RuleSet::All)
    }
}

fn directive(text: &str) -> Option<(Scope, RuleSet)> {
    if !text.contains("tx-lint-ignore") {
        return None;
    }
    let caps = DIRECTIVE.captures(text)?;
    let scope = match caps.name("scope").map(|m| m.as_str()) {
        Some("-next-line") => Scope::NextLine,
        Some("-file") => Scope::File,
        _ => Scope::ThisLine,
    };
    Some((scope, RuleSet::from_list(caps.name("rules").map(|m| m.as_str()))))
}

/// `@SuppressWarnings(...)` 注解源码中列出的 `tx-lint:RULE` 规则
pub fn annotated_rules(annotation_source: &str) -> BTreeSet<String> {
    ANNOTATED_RULE
        .captures_iter(annotation_source)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// SAME_CLASS_CALL 修复建议插入的注释
pub fn suppression_comment(rule_id: &str, reason: &str) -> String {
    format!("// {SUPPRESS_PREFIX}-ignore-next-line: {rule_id} -- {reason}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_line_directive() {
        let ctx = SuppressionContext::parse(
            "public void place() {\n    save(order); // tx-lint-ignore: SAME_CLASS_CALL\n}\n",
        );
        assert!(ctx.is_suppressed("SAME_CLASS_CALL", 2));
        assert!(!ctx.is_suppressed("N_PLUS_ONE", 2));
        assert!(!ctx.is_suppressed("SAME_CLASS_CALL", 3));
    }

    #[test]
    fn test_next_line_directive_with_reason() {
        let code = "// tx-lint-ignore-next-line: SAME_CLASS_CALL, N_PLUS_ONE -- batch job\nsave(order);\n";
        let ctx = SuppressionContext::parse(code);
        assert!(ctx.is_suppressed("SAME_CLASS_CALL", 2));
        assert!(ctx.is_suppressed("N_PLUS_ONE", 2));
        assert!(!ctx.is_suppressed("SAME_CLASS_CALL", 1));
    }

    #[test]
    fn test_file_directives() {
        let ctx = SuppressionContext::parse("// tx-lint-ignore-file: N_PLUS_ONE, INVALID_MODIFIER\nclass A {}\n");
        assert!(ctx.is_suppressed("N_PLUS_ONE", 10));
        assert!(ctx.is_suppressed("INVALID_MODIFIER", 100));
        assert!(!ctx.is_suppressed("SAME_CLASS_CALL", 10));
        assert!(!ctx.is_file_suppressed());

        let all = SuppressionContext::parse("// tx-lint-ignore-file\nclass A {}\n");
        assert!(all.is_file_suppressed());
        assert!(all.is_suppressed("ASYNC_CONFLICT", 2));
    }

    #[test]
    fn test_declaration_span() {
        let ids = annotated_rules(r#"@SuppressWarnings({"unchecked", "tx-lint:CHECKED_EXCEPTION_ROLLBACK", "tx-lint:N_PLUS_ONE"})"#);
        assert_eq!(ids.len(), 2);

        let mut ctx = SuppressionContext::default();
        ctx.suppress_declaration(4, 9, ids);
        assert!(ctx.is_suppressed("CHECKED_EXCEPTION_ROLLBACK", 4));
        assert!(ctx.is_suppressed("N_PLUS_ONE", 9));
        assert!(!ctx.is_suppressed("N_PLUS_ONE", 10));
        assert!(!ctx.is_suppressed("N_PLUS_ONE", 3));
        assert!(!ctx.is_suppressed("ASYNC_CONFLICT", 6));

        ctx.suppress_declaration(1, 20, annotated_rules(r#"@SuppressWarnings("unchecked")"#));
        assert!(!ctx.is_suppressed("ASYNC_CONFLICT", 6));
    }

    #[test]
    fn test_directive_outside_comment_ignored() {
        let ctx = SuppressionContext::parse("String s = \"tx-lint-ignore-file\";\n");
        assert!(!ctx.is_file_suppressed());
    }

    #[test]
    fn test_generated_comment_round_trip() {
        let code = format!("{}\nsave(order);\n", suppression_comment("SAME_CLASS_CALL", "self-invocation is intentional"));
        let ctx = SuppressionContext::parse(&code);
        assert!(ctx.is_suppressed("SAME_CLASS_CALL", 2));
        assert!(!ctx.is_suppressed("N_PLUS_ONE", 2));
    }
}
