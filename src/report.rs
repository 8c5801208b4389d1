//! 诊断报告 (Diagnostic Reporter)
//!
//! - `Problem`: 单条诊断，带结构化修复建议 (`SuggestedFix`)
//! - `Report`: 排序去重后的全部诊断 + 统计，支持 text / JSON 输出
//!
//! 修复建议只描述 "改成什么"，不包含文本补丁；
//! `annotation_source()` 仅用于在文本输出中展示建议的注解写法。

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::annotation::Propagation;
use crate::symbol_table::TextRange;

/// 诊断严重级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Error,
    Warning,
    WeakWarning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::WeakWarning => "WEAK_WARNING",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Severity::Error => 2,
            Severity::Warning => 1,
            Severity::WeakWarning => 0,
        }
    }

    /// 是否达到 `--fail-on` 阈值 (弱警告永远不触发)
    pub fn reaches(&self, threshold: Severity) -> bool {
        *self != Severity::WeakWarning && self.rank() >= threshold.rank()
    }

    fn emoji(&self) -> &'static str {
        match self {
            Severity::Error => "🔴",
            Severity::Warning => "🟡",
            Severity::WeakWarning => "⚪",
        }
    }
}

/// 修复建议中保留的已有注解属性 (源码形式)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetainedAttribute {
    pub name: String,
    pub value: String,
}

impl RetainedAttribute {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Vec<Self> {
        pairs
            .into_iter()
            .map(|(name, value)| Self { name, value })
            .collect()
    }
}

/// 修复建议描述符 `{kind, payload}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuggestedFix {
    #[serde(rename_all = "camelCase")]
    AddSuppressionComment { rule_id: String, comment: String },
    #[serde(rename_all = "camelCase")]
    ChangeVisibility { visibility: String },
    #[serde(rename_all = "camelCase")]
    RemoveModifier { modifier: String },
    #[serde(rename_all = "camelCase")]
    RemoveAnnotation { annotation: String },
    /// 修改被调方法的 propagation，其余属性原样保留
    #[serde(rename_all = "camelCase")]
    SetPropagation {
        target_method: String,
        propagation: Propagation,
        retained: Vec<RetainedAttribute>,
    },
    #[serde(rename_all = "camelCase")]
    SetRollbackFor {
        rollback_for: Vec<String>,
        retained: Vec<RetainedAttribute>,
    },
}

fn simple_name(fqn: &str) -> &str {
    fqn.rsplit('.').next().unwrap_or(fqn)
}

/// 单个类型不加括号，多个类型渲染为 `{A.class, B.class}`
pub fn render_rollback_types(types: &[String]) -> String {
    let classes: Vec<String> = types.iter().map(|t| format!("{t}.class")).collect();
    match classes.as_slice() {
        [single] => single.clone(),
        _ => format!("{{{}}}", classes.join(", ")),
    }
}

fn render_annotation(retained: &[RetainedAttribute], extra: (&str, String)) -> String {
    let mut parts: Vec<String> = retained
        .iter()
        .map(|a| format!("{} = {}", a.name, a.value))
        .collect();
    parts.push(format!("{} = {}", extra.0, extra.1));
    format!("@Transactional({})", parts.join(", "))
}

impl SuggestedFix {
    /// 一行人类可读描述
    pub fn summary(&self) -> String {
        match self {
            SuggestedFix::AddSuppressionComment { comment, .. } => {
                format!("Add explanatory suppression comment: {comment}")
            }
            SuggestedFix::ChangeVisibility { visibility } => format!("Change visibility to {visibility}"),
            SuggestedFix::RemoveModifier { modifier } => format!("Remove '{modifier}' modifier"),
            SuggestedFix::RemoveAnnotation { annotation } => format!("Remove @{}", simple_name(annotation)),
            SuggestedFix::SetPropagation { target_method, propagation, .. } => {
                format!("Set propagation = {propagation} on {target_method}")
            }
            SuggestedFix::SetRollbackFor { rollback_for, .. } => {
                format!("Set rollbackFor = {}", render_rollback_types(rollback_for))
            }
        }
    }

    /// 建议的注解源码 (仅属性类修复)
    pub fn annotation_source(&self) -> Option<String> {
        match self {
            SuggestedFix::SetPropagation { propagation, retained, .. } => Some(render_annotation(
                retained,
                ("propagation", format!("Propagation.{propagation}")),
            )),
            SuggestedFix::SetRollbackFor { rollback_for, retained } => Some(render_annotation(
                retained,
                ("rollbackFor", render_rollback_types(rollback_for)),
            )),
            _ => None,
        }
    }
}

/// 单条诊断
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub rule_id: String,
    pub severity: Severity,
    pub file: String,
    pub line: usize,
    pub start_offset: usize,
    pub length: usize,
    pub message: String,
    #[serde(default)]
    pub fixes: Vec<SuggestedFix>,
}

impl Problem {
    pub fn new(rule_id: &str, severity: Severity, file: String, location: TextRange, message: String) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            severity,
            file,
            line: location.line,
            start_offset: location.start,
            length: location.len,
            message,
            fixes: Vec::new(),
        }
    }

    pub fn with_fix(mut self, fix: SuggestedFix) -> Self {
        self.fixes.push(fix);
        self
    }

    fn sort_key(&self) -> (&str, usize, &str, &str) {
        (&self.file, self.start_offset, &self.rule_id, &self.message)
    }
}

/// 按 (文件, 偏移, 规则, 消息) 排序并去掉完全相同的诊断
pub fn normalize(mut problems: Vec<Problem>) -> Vec<Problem> {
    problems.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    let mut unique: Vec<Problem> = Vec::with_capacity(problems.len());
    for problem in problems {
        let duplicate = unique
            .iter()
            .rev()
            .take_while(|u| u.sort_key() == problem.sort_key())
            .any(|u| *u == problem);
        if !duplicate {
            unique.push(problem);
        }
    }
    unique
}

/// 统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub errors: usize,
    pub warnings: usize,
    pub weak_warnings: usize,
    pub files_analyzed: usize,
    pub files_skipped: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.errors + self.warnings + self.weak_warnings
    }
}

/// 一次分析的完整报告
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub problems: Vec<Problem>,
    pub files_analyzed: usize,
    pub files_skipped: usize,
}

impl Report {
    pub fn new(problems: Vec<Problem>, files_analyzed: usize, files_skipped: usize) -> Self {
        Self {
            problems: normalize(problems),
            files_analyzed,
            files_skipped,
        }
    }

    pub fn summary(&self) -> Summary {
        let count = |s: Severity| self.problems.iter().filter(|p| p.severity == s).count();
        Summary {
            errors: count(Severity::Error),
            warnings: count(Severity::Warning),
            weak_warnings: count(Severity::WeakWarning),
            files_analyzed: self.files_analyzed,
            files_skipped: self.files_skipped,
        }
    }

    /// 是否存在达到阈值的诊断
    pub fn fails(&self, threshold: Severity) -> bool {
        self.problems.iter().any(|p| p.severity.reaches(threshold))
    }

    pub fn to_json(&self) -> Value {
        json!({
            "summary": self.summary(),
            "problems": self.problems,
        })
    }

    pub fn render_text(&self) -> String {
        let summary = self.summary();
        let mut out = String::new();

        if self.problems.is_empty() {
            out.push_str("✅ No transaction anti-patterns found\n");
        }

        for problem in &self.problems {
            out.push_str(&format!(
                "{} {}:{}: {} [{}] {}\n",
                problem.severity.emoji(),
                problem.file,
                problem.line,
                problem.severity.as_str(),
                problem.rule_id,
                problem.message
            ));
            for fix in &problem.fixes {
                out.push_str(&format!("    fix: {}\n", fix.summary()));
                if let Some(source) = fix.annotation_source() {
                    out.push_str(&format!("         {source}\n"));
                }
            }
        }

        out.push_str(&format!(
            "\n{} error(s), {} warning(s), {} weak warning(s) in {} file(s)",
            summary.errors, summary.warnings, summary.weak_warnings, summary.files_analyzed
        ));
        if summary.files_skipped > 0 {
            out.push_str(&format!(", {} file(s) skipped", summary.files_skipped));
        }
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(file: &str, start: usize, rule: &str, severity: Severity, message: &str) -> Problem {
        Problem::new(
            rule,
            severity,
            file.to_string(),
            TextRange { start, len: 4, line: 1 + start / 10 },
            message.to_string(),
        )
    }

    #[test]
    fn test_threshold() {
        assert!(Severity::Error.reaches(Severity::Error));
        assert!(Severity::Error.reaches(Severity::Warning));
        assert!(!Severity::Warning.reaches(Severity::Error));
        assert!(Severity::Warning.reaches(Severity::Warning));
        assert!(!Severity::WeakWarning.reaches(Severity::Warning));
        assert!(!Severity::WeakWarning.reaches(Severity::WeakWarning));
    }

    #[test]
    fn test_normalize_orders_and_dedups() {
        let problems = vec![
            at("B.java", 5, "N_PLUS_ONE", Severity::Warning, "m"),
            at("A.java", 30, "SAME_CLASS_CALL", Severity::Warning, "m"),
            at("A.java", 10, "SAME_CLASS_CALL", Severity::Warning, "m"),
            at("A.java", 10, "INVALID_MODIFIER", Severity::Warning, "m"),
            at("A.java", 10, "SAME_CLASS_CALL", Severity::Warning, "m"),
        ];
        let sorted = normalize(problems);
        let keys: Vec<_> = sorted
            .iter()
            .map(|p| (p.file.as_str(), p.start_offset, p.rule_id.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("A.java", 10, "INVALID_MODIFIER"),
                ("A.java", 10, "SAME_CLASS_CALL"),
                ("A.java", 30, "SAME_CLASS_CALL"),
                ("B.java", 5, "N_PLUS_ONE"),
            ]
        );
    }

    #[test]
    fn test_rollback_rendering() {
        assert_eq!(render_rollback_types(&["IOException".into()]), "IOException.class");
        assert_eq!(
            render_rollback_types(&["IOException".into(), "SQLException".into()]),
            "{IOException.class, SQLException.class}"
        );
    }

    #[test]
    fn test_annotation_source_keeps_other_attributes() {
        let fix = SuggestedFix::SetPropagation {
            target_method: "com.shop.Audit.record".into(),
            propagation: Propagation::RequiresNew,
            retained: vec![RetainedAttribute { name: "timeout".into(), value: "30".into() }],
        };
        assert_eq!(
            fix.annotation_source().as_deref(),
            Some("@Transactional(timeout = 30, propagation = Propagation.REQUIRES_NEW)")
        );
        assert_eq!(fix.summary(), "Set propagation = REQUIRES_NEW on com.shop.Audit.record");
        assert_eq!(
            SuggestedFix::RemoveModifier { modifier: "final".into() }.annotation_source(),
            None
        );
    }

    #[test]
    fn test_fix_serialization() {
        let fix = SuggestedFix::SetRollbackFor {
            rollback_for: vec!["IOException".into()],
            retained: vec![RetainedAttribute { name: "readOnly".into(), value: "false".into() }],
        };
        insta::assert_json_snapshot!(fix, @r###"
        {
          "kind": "SET_ROLLBACK_FOR",
          "payload": {
            "rollbackFor": [
              "IOException"
            ],
            "retained": [
              {
                "name": "readOnly",
                "value": "false"
              }
            ]
          }
        }
        "###);
    }

    #[test]
    fn test_report_summary_and_json() {
        let report = Report::new(
            vec![
                at("A.java", 0, "PROPAGATION_CONFLICT", Severity::Error, "boom"),
                at("A.java", 12, "PROPAGATION_CONFLICT", Severity::WeakWarning, "hmm"),
            ],
            3,
            1,
        );
        let summary = report.summary();
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.weak_warnings, 1);
        assert_eq!(summary.total(), 2);
        assert!(report.fails(Severity::Error));
        assert!(report.fails(Severity::Warning));

        let json = report.to_json();
        assert_eq!(json["summary"]["filesAnalyzed"], 3);
        assert_eq!(json["problems"][0]["ruleId"], "PROPAGATION_CONFLICT");
        assert_eq!(json["problems"][0]["severity"], "ERROR");
        // 没有修复建议时仍输出空数组
        assert_eq!(json["problems"][0]["fixes"], serde_json::json!([]));

        let text = report.render_text();
        assert!(text.contains("A.java:1: ERROR [PROPAGATION_CONFLICT] boom"));
        assert!(text.contains("1 error(s), 0 warning(s), 1 weak warning(s) in 3 file(s), 1 file(s) skipped"));
    }

    #[test]
    fn test_weak_warnings_never_fail() {
        let report = Report::new(vec![at("A.java", 0, "PROPAGATION_CONFLICT", Severity::WeakWarning, "x")], 1, 0);
        assert!(!report.fails(Severity::Warning));
        assert!(!report.fails(Severity::Error));
    }
}
