//! 写操作判定
//!
//! 1. 方法名过滤 (大小写不敏感的子串匹配)，不匹配直接返回 false
//! 2. 声明类验证：Repository 接口祖先 / 持久化上下文类型 / @Repository / 名称后缀
//! 3. 声明类未知时保守判为写操作 (strict 模式下判为非写)

use std::collections::{HashSet, VecDeque};
use tracing::trace;

use super::ClassifierCache;
use crate::annotation;
use crate::error::AnalysisError;
use crate::symbol_table::{Callee, SymbolModel};

const WRITE_METHOD_NAMES: [&str; 14] = [
    "save", "saveAll", "saveAndFlush",
    "update", "updateAll",
    "delete", "deleteAll", "deleteById", "deleteInBatch",
    "remove", "removeAll",
    "persist", "merge", "flush",
];

/// Spring Data Repository 接口
pub const REPOSITORY_INTERFACES: &[&str] = &[
    "org.springframework.data.repository.Repository",
    "org.springframework.data.repository.CrudRepository",
    "org.springframework.data.repository.ListCrudRepository",
    "org.springframework.data.repository.PagingAndSortingRepository",
    "org.springframework.data.repository.ListPagingAndSortingRepository",
    "org.springframework.data.jpa.repository.JpaRepository",
    "org.springframework.data.repository.reactive.ReactiveCrudRepository",
    "org.springframework.data.mongodb.repository.MongoRepository",
];

/// JPA / Hibernate 持久化上下文与 Spring JDBC 模板
pub const PERSISTENCE_CONTEXTS: &[&str] = &[
    "jakarta.persistence.EntityManager",
    "javax.persistence.EntityManager",
    "org.hibernate.Session",
    "org.hibernate.StatelessSession",
    "org.springframework.jdbc.core.JdbcOperations",
    "org.springframework.jdbc.core.JdbcTemplate",
    "org.springframework.jdbc.core.namedparam.NamedParameterJdbcOperations",
    "org.springframework.jdbc.core.namedparam.NamedParameterJdbcTemplate",
];

/// 祖先遍历的最大层数；超过说明符号模型已损坏
const MAX_HIERARCHY_DEPTH: usize = 64;

pub fn matches_write_name(method_name: &str) -> bool {
    let lower = method_name.to_ascii_lowercase();
    WRITE_METHOD_NAMES
        .iter()
        .any(|w| lower.contains(&w.to_ascii_lowercase()))
}

fn simple_name(type_name: &str) -> &str {
    type_name.rsplit('.').next().unwrap_or(type_name)
}

fn has_repository_suffix(type_name: &str) -> bool {
    let simple = simple_name(type_name);
    simple.ends_with("Repository") || simple.ends_with("Dao")
}

/// 已知的 Repository / 持久化上下文类型 (未解析的类型按简单名匹配)
fn is_known_persistence_type(type_name: &str) -> bool {
    let known = REPOSITORY_INTERFACES.iter().chain(PERSISTENCE_CONTEXTS);
    if type_name.contains('.') {
        known.into_iter().any(|k| *k == type_name)
    } else {
        known.into_iter().any(|k| simple_name(k) == type_name)
    }
}

pub fn is_write_capable(
    model: &dyn SymbolModel,
    cache: &ClassifierCache,
    callee: &Callee<'_>,
    strict: bool,
) -> Result<bool, AnalysisError> {
    if !matches_write_name(callee.name) {
        return Ok(false);
    }

    let Some(class) = callee.declaring_class.as_deref() else {
        trace!("write name `{}` on unresolved receiver", callee.name);
        return Ok(!strict);
    };

    if model.class(class).is_none() {
        // 类型不在模型中：只能依据名称
        if is_known_persistence_type(class) || has_repository_suffix(class) {
            return Ok(true);
        }
        return Ok(!strict);
    }

    cache.get_or_compute(class, || verify_declaring_class(model, class))
}

/// 声明类是否为持久化写入口 (结果按类缓存)
pub fn verify_declaring_class(model: &dyn SymbolModel, class: &str) -> Result<bool, AnalysisError> {
    if is_known_persistence_type(class) || has_repository_suffix(class) {
        return Ok(true);
    }
    if annotation::has(model.annotations_of_class(class), annotation::REPOSITORY) {
        return Ok(true);
    }

    // 祖先接口 BFS
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    visited.insert(class.to_string());
    queue.push_back((class.to_string(), 0));

    while let Some((current, depth)) = queue.pop_front() {
        if depth > MAX_HIERARCHY_DEPTH {
            return Err(AnalysisError::invariant(format!(
                "type hierarchy of {class} deeper than {MAX_HIERARCHY_DEPTH} levels"
            )));
        }
        for parent in model.super_types_of(&current) {
            if is_known_persistence_type(&parent) {
                return Ok(true);
            }
            if visited.insert(parent.clone()) {
                queue.push_back((parent, depth + 1));
            }
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::test_support::model_of;

    fn callee<'a>(name: &'a str, class: Option<&str>) -> Callee<'a> {
        Callee { name, declaring_class: class.map(str::to_string), symbol: None }
    }

    #[test]
    fn test_name_filter() {
        assert!(matches_write_name("save"));
        assert!(matches_write_name("saveAndFlush"));
        assert!(matches_write_name("softDeleteExpired"));
        assert!(matches_write_name("FLUSH"));
        assert!(!matches_write_name("findById"));
        assert!(!matches_write_name("getItems"));
        assert!(!matches_write_name("count"));
    }

    #[test]
    fn test_repository_hierarchy_and_cache() {
        let model = model_of(&[(
            "OrderRepository.java",
            r#"
            package com.shop.repo;
            import org.springframework.data.jpa.repository.JpaRepository;
            public interface OrderRepository extends JpaRepository<Order, Long> {}
            "#,
        ), (
            "Storage.java",
            r#"
            package com.shop.repo;
            public interface Storage extends OrderRepository {}
            "#,
        ), (
            "AuditTrail.java",
            r#"
            package com.shop.audit;
            public class AuditTrail { public void save(String s) {} }
            "#,
        )]);
        let cache = ClassifierCache::new();

        let storage = callee("save", Some("com.shop.repo.Storage"));
        assert!(is_write_capable(&model, &cache, &storage, false).unwrap());
        assert_eq!(cache.get("com.shop.repo.Storage"), Some(true));

        let audit = callee("save", Some("com.shop.audit.AuditTrail"));
        assert!(!is_write_capable(&model, &cache, &audit, false).unwrap());
        assert_eq!(cache.get("com.shop.audit.AuditTrail"), Some(false));

        let find = callee("findAll", Some("com.shop.repo.Storage"));
        assert!(!is_write_capable(&model, &cache, &find, false).unwrap());
    }

    #[test]
    fn test_persistence_context_and_marker() {
        let model = model_of(&[(
            "Writer.java",
            r#"
            package com.shop;
            import org.springframework.stereotype.Repository;
            @Repository
            public class Writer { public void persistAll() {} }
            "#,
        )]);
        let cache = ClassifierCache::new();

        let em = callee("persist", Some("jakarta.persistence.EntityManager"));
        assert!(is_write_capable(&model, &cache, &em, true).unwrap());

        let marked = callee("persistAll", Some("com.shop.Writer"));
        assert!(is_write_capable(&model, &cache, &marked, false).unwrap());
    }

    #[test]
    fn test_jdbc_template_and_iterators() {
        let model = model_of(&[]);
        let cache = ClassifierCache::new();

        let jdbc = callee("batchUpdate", Some("org.springframework.jdbc.core.JdbcTemplate"));
        assert!(is_write_capable(&model, &cache, &jdbc, true).unwrap());
        let named = callee("update", Some("org.springframework.jdbc.core.namedparam.NamedParameterJdbcTemplate"));
        assert!(is_write_capable(&model, &cache, &named, true).unwrap());

        // 迭代器上的 remove 只修改内存集合
        for iterator in ["java.util.Iterator", "java.util.ListIterator"] {
            let remove = callee("remove", Some(iterator));
            assert!(!is_write_capable(&model, &cache, &remove, false).unwrap());
        }
    }

    #[test]
    fn test_unknown_declaring_class_fallback() {
        let model = model_of(&[]);
        let cache = ClassifierCache::new();

        let unknown = callee("update", None);
        assert!(is_write_capable(&model, &cache, &unknown, false).unwrap());
        assert!(!is_write_capable(&model, &cache, &unknown, true).unwrap());

        let foreign = callee("delete", Some("com.vendor.Client"));
        assert!(is_write_capable(&model, &cache, &foreign, false).unwrap());
        assert!(!is_write_capable(&model, &cache, &foreign, true).unwrap());

        let foreign_dao = callee("delete", Some("com.vendor.UserDao"));
        assert!(is_write_capable(&model, &cache, &foreign_dao, true).unwrap());
        assert!(cache.is_empty());
    }
}
