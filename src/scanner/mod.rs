//! Scanner - Java 源码前端与项目符号模型
//!
//! - `tree_sitter_java`: Tree-sitter 解析，抽取编译单元
//! - `project`: 全项目快照，实现 `SymbolModel`
//! - `library`: 内置 JDK / Spring / JPA 类型表

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

pub mod library;
pub mod project;
pub mod tree_sitter_java;

pub use project::ProjectModel;
pub use tree_sitter_java::JavaFrontend;

/// 不进入的目录
const SKIPPED_DIRS: [&str; 5] = ["target", "build", "out", "node_modules", ".git"];

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

/// 收集目录下所有 `.java` 文件 (排序，保证输出稳定)
///
/// `root` 本身是文件时直接返回它。
pub fn collect_java_files(root: &Path) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("java"))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_collect_java_files_skips_build_output() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/main/java/com/shop")).unwrap();
        fs::create_dir_all(root.join("target/classes")).unwrap();
        fs::create_dir_all(root.join(".idea")).unwrap();
        fs::write(root.join("src/main/java/com/shop/B.java"), "class B {}").unwrap();
        fs::write(root.join("src/main/java/com/shop/A.java"), "class A {}").unwrap();
        fs::write(root.join("src/main/java/com/shop/notes.txt"), "").unwrap();
        fs::write(root.join("target/classes/Gen.java"), "class Gen {}").unwrap();
        fs::write(root.join(".idea/Hidden.java"), "class Hidden {}").unwrap();

        let files = collect_java_files(root);
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["A.java", "B.java"]);
    }

    #[test]
    fn test_collect_single_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("Only.java");
        fs::write(&file, "class Only {}").unwrap();
        assert_eq!(collect_java_files(&file), vec![file]);
    }
}
