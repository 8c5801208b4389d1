//! 受检异常判定
//!
//! 常见受检异常名直接判定；其余沿父类链向上：
//! 先遇到 RuntimeException / Error 为非受检，先遇到 Exception 为受检，
//! 链断开 (类型无法解析) 时判为非受检。

use std::collections::HashSet;

use crate::error::AnalysisError;
use crate::symbol_table::SymbolModel;

const CANONICAL_CHECKED: &[&str] = &[
    "java.lang.Exception",
    "java.lang.InterruptedException",
    "java.lang.ReflectiveOperationException",
    "java.lang.ClassNotFoundException",
    "java.lang.CloneNotSupportedException",
    "java.io.IOException",
    "java.io.FileNotFoundException",
    "java.net.URISyntaxException",
    "java.sql.SQLException",
    "java.text.ParseException",
    "java.util.concurrent.TimeoutException",
    "java.util.concurrent.ExecutionException",
];

const EXCEPTION: &str = "java.lang.Exception";
const UNCHECKED_ROOTS: [&str; 2] = ["java.lang.RuntimeException", "java.lang.Error"];

const MAX_CHAIN: usize = 64;

fn strip_type(type_text: &str) -> &str {
    let base = type_text.split('<').next().unwrap_or(type_text);
    base.trim()
}

fn is_canonical(name: &str) -> bool {
    if name.contains('.') {
        CANONICAL_CHECKED.contains(&name)
    } else {
        CANONICAL_CHECKED
            .iter()
            .any(|c| c.rsplit('.').next() == Some(name))
    }
}

pub fn is_checked(model: &dyn SymbolModel, context_class: &str, type_text: &str) -> Result<bool, AnalysisError> {
    let name = strip_type(type_text);
    let resolved = model.resolve_type(context_class, name);

    match resolved.as_deref() {
        Some(fqn) if is_canonical(fqn) => return Ok(true),
        None if is_canonical(name) => return Ok(true),
        None => return Ok(false),
        Some(_) => {}
    }

    let mut current = resolved;
    let mut seen: HashSet<String> = HashSet::new();
    while let Some(fqn) = current {
        if UNCHECKED_ROOTS.contains(&fqn.as_str()) {
            return Ok(false);
        }
        if fqn == EXCEPTION {
            return Ok(true);
        }
        if !seen.insert(fqn.clone()) {
            return Err(AnalysisError::invariant(format!("cyclic superclass chain at {fqn}")));
        }
        if seen.len() > MAX_CHAIN {
            return Err(AnalysisError::invariant(format!(
                "superclass chain of {type_text} longer than {MAX_CHAIN}"
            )));
        }
        current = model
            .class(&fqn)
            .and_then(|c| c.superclass.as_deref())
            .and_then(|parent| model.resolve_type(&fqn, parent));
    }

    // 链断开或到达 Throwable/Object
    Ok(false)
}
