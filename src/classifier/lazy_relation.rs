//! 懒加载关联判定
//!
//! - `@OneToMany` / `@ManyToMany` / `@ElementCollection` 默认 LAZY，除非 fetch 提到 EAGER
//! - `@ManyToOne` / `@OneToOne` 默认 EAGER，只有 fetch 明确提到 LAZY 才算

use crate::symbol_table::{AnnotationView, FieldSymbol};

const PERSISTENCE_PACKAGES: [&str; 2] = ["jakarta.persistence", "javax.persistence"];

const TO_MANY: [&str; 3] = ["OneToMany", "ManyToMany", "ElementCollection"];
const TO_ONE: [&str; 2] = ["ManyToOne", "OneToOne"];

fn is_relation(annotation: &AnnotationView, kinds: &[&str]) -> bool {
    kinds.iter().any(|kind| {
        PERSISTENCE_PACKAGES
            .iter()
            .any(|pkg| annotation.is(&format!("{pkg}.{kind}")))
    })
}

fn fetch_mentions(annotation: &AnnotationView, mode: &str) -> bool {
    annotation
        .attribute("fetch")
        .map(|v| v.joined().contains(mode))
        .unwrap_or(false)
}

pub fn is_lazy_relation(field: &FieldSymbol) -> bool {
    field.annotations.iter().any(|a| {
        if is_relation(a, &TO_MANY) {
            !fetch_mentions(a, "EAGER")
        } else if is_relation(a, &TO_ONE) {
            fetch_mentions(a, "LAZY")
        } else {
            false
        }
    })
}
