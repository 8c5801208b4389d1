// ============================================================================
// 内置库类型表
// ============================================================================
//
// 被分析的项目通常不包含 JDK / Spring / JPA 源码。这里登记常用库类型的
// 父类型，使异常层级与 Repository 接口的祖先遍历能落到真实的库根类型上，
// 也让 `import jakarta.persistence.*` 这类通配符 import 可以被解析。

use std::collections::HashMap;
use once_cell::sync::Lazy;

use crate::symbol_table::{ClassKind, ClassSymbol, Origin, TextRange};

use crate::symbol_table::ClassKind::{Annotation, Class, Enum, Interface};

/// (FQN, 种类, 父类, 接口)
type LibraryEntry = (&'static str, ClassKind, Option<&'static str>, &'static [&'static str]);

const OBJECT: Option<&str> = Some("java.lang.Object");

#[rustfmt::skip]
const LIBRARY_TYPES: &[LibraryEntry] = &[
    // ------------------------------------------------------------ java.lang
    ("java.lang.Object", Class, None, &[]),
    ("java.lang.String", Class, OBJECT, &[]),
    ("java.lang.Iterable", Interface, None, &[]),
    ("java.lang.Throwable", Class, OBJECT, &[]),
    ("java.lang.Exception", Class, Some("java.lang.Throwable"), &[]),
    ("java.lang.Error", Class, Some("java.lang.Throwable"), &[]),
    ("java.lang.RuntimeException", Class, Some("java.lang.Exception"), &[]),
    ("java.lang.IllegalArgumentException", Class, Some("java.lang.RuntimeException"), &[]),
    ("java.lang.NumberFormatException", Class, Some("java.lang.IllegalArgumentException"), &[]),
    ("java.lang.IllegalStateException", Class, Some("java.lang.RuntimeException"), &[]),
    ("java.lang.NullPointerException", Class, Some("java.lang.RuntimeException"), &[]),
    ("java.lang.UnsupportedOperationException", Class, Some("java.lang.RuntimeException"), &[]),
    ("java.lang.ArithmeticException", Class, Some("java.lang.RuntimeException"), &[]),
    ("java.lang.ClassCastException", Class, Some("java.lang.RuntimeException"), &[]),
    ("java.lang.IndexOutOfBoundsException", Class, Some("java.lang.RuntimeException"), &[]),
    ("java.lang.SecurityException", Class, Some("java.lang.RuntimeException"), &[]),
    ("java.lang.InterruptedException", Class, Some("java.lang.Exception"), &[]),
    ("java.lang.CloneNotSupportedException", Class, Some("java.lang.Exception"), &[]),
    ("java.lang.ReflectiveOperationException", Class, Some("java.lang.Exception"), &[]),
    ("java.lang.ClassNotFoundException", Class, Some("java.lang.ReflectiveOperationException"), &[]),
    ("java.lang.AssertionError", Class, Some("java.lang.Error"), &[]),
    ("java.lang.VirtualMachineError", Class, Some("java.lang.Error"), &[]),
    ("java.lang.OutOfMemoryError", Class, Some("java.lang.VirtualMachineError"), &[]),
    ("java.lang.StackOverflowError", Class, Some("java.lang.VirtualMachineError"), &[]),
    // ------------------------------------------------------------ java.io / java.net / java.sql / java.text
    ("java.io.IOException", Class, Some("java.lang.Exception"), &[]),
    ("java.io.FileNotFoundException", Class, Some("java.io.IOException"), &[]),
    ("java.io.EOFException", Class, Some("java.io.IOException"), &[]),
    ("java.io.UncheckedIOException", Class, Some("java.lang.RuntimeException"), &[]),
    ("java.net.MalformedURLException", Class, Some("java.io.IOException"), &[]),
    ("java.net.URISyntaxException", Class, Some("java.lang.Exception"), &[]),
    ("java.sql.SQLException", Class, Some("java.lang.Exception"), &[]),
    ("java.sql.SQLNonTransientException", Class, Some("java.sql.SQLException"), &[]),
    ("java.sql.SQLIntegrityConstraintViolationException", Class, Some("java.sql.SQLNonTransientException"), &[]),
    ("java.text.ParseException", Class, Some("java.lang.Exception"), &[]),
    // ------------------------------------------------------------ java.util
    ("java.util.concurrent.TimeoutException", Class, Some("java.lang.Exception"), &[]),
    ("java.util.concurrent.ExecutionException", Class, Some("java.lang.Exception"), &[]),
    ("java.util.NoSuchElementException", Class, Some("java.lang.RuntimeException"), &[]),
    ("java.util.ConcurrentModificationException", Class, Some("java.lang.RuntimeException"), &[]),
    ("java.util.Iterator", Interface, None, &[]),
    ("java.util.ListIterator", Interface, None, &["java.util.Iterator"]),
    ("java.util.Collection", Interface, None, &["java.lang.Iterable"]),
    ("java.util.List", Interface, None, &["java.util.Collection"]),
    ("java.util.Set", Interface, None, &["java.util.Collection"]),
    ("java.util.Queue", Interface, None, &["java.util.Collection"]),
    ("java.util.Deque", Interface, None, &["java.util.Queue"]),
    ("java.util.Map", Interface, None, &[]),
    ("java.util.ArrayList", Class, OBJECT, &["java.util.List"]),
    ("java.util.LinkedList", Class, OBJECT, &["java.util.List", "java.util.Deque"]),
    ("java.util.HashSet", Class, OBJECT, &["java.util.Set"]),
    ("java.util.LinkedHashSet", Class, Some("java.util.HashSet"), &["java.util.Set"]),
    ("java.util.TreeSet", Class, OBJECT, &["java.util.Set"]),
    ("java.util.HashMap", Class, OBJECT, &["java.util.Map"]),
    ("java.util.Optional", Class, OBJECT, &[]),
    ("java.util.stream.Stream", Interface, None, &[]),
    // ------------------------------------------------------------ Spring
    ("org.springframework.core.NestedRuntimeException", Class, Some("java.lang.RuntimeException"), &[]),
    ("org.springframework.dao.DataAccessException", Class, Some("org.springframework.core.NestedRuntimeException"), &[]),
    ("org.springframework.dao.NonTransientDataAccessException", Class, Some("org.springframework.dao.DataAccessException"), &[]),
    ("org.springframework.dao.DataIntegrityViolationException", Class, Some("org.springframework.dao.NonTransientDataAccessException"), &[]),
    ("org.springframework.dao.DataRetrievalFailureException", Class, Some("org.springframework.dao.NonTransientDataAccessException"), &[]),
    ("org.springframework.transaction.TransactionException", Class, Some("org.springframework.core.NestedRuntimeException"), &[]),
    ("org.springframework.transaction.annotation.Transactional", Annotation, None, &[]),
    ("org.springframework.transaction.annotation.Propagation", Enum, None, &[]),
    ("org.springframework.transaction.annotation.Isolation", Enum, None, &[]),
    ("org.springframework.scheduling.annotation.Async", Annotation, None, &[]),
    ("org.springframework.stereotype.Repository", Annotation, None, &[]),
    ("org.springframework.stereotype.Service", Annotation, None, &[]),
    ("org.springframework.stereotype.Component", Annotation, None, &[]),
    ("org.springframework.data.repository.Repository", Interface, None, &[]),
    ("org.springframework.data.repository.CrudRepository", Interface, None, &["org.springframework.data.repository.Repository"]),
    ("org.springframework.data.repository.ListCrudRepository", Interface, None, &["org.springframework.data.repository.CrudRepository"]),
    ("org.springframework.data.repository.PagingAndSortingRepository", Interface, None, &["org.springframework.data.repository.Repository"]),
    ("org.springframework.data.repository.ListPagingAndSortingRepository", Interface, None, &["org.springframework.data.repository.PagingAndSortingRepository"]),
    ("org.springframework.data.repository.query.QueryByExampleExecutor", Interface, None, &[]),
    ("org.springframework.data.jpa.repository.JpaRepository", Interface, None, &[
        "org.springframework.data.repository.ListCrudRepository",
        "org.springframework.data.repository.ListPagingAndSortingRepository",
        "org.springframework.data.repository.query.QueryByExampleExecutor",
    ]),
    ("org.springframework.data.repository.reactive.ReactiveCrudRepository", Interface, None, &["org.springframework.data.repository.Repository"]),
    ("org.springframework.data.mongodb.repository.MongoRepository", Interface, None, &[
        "org.springframework.data.repository.ListCrudRepository",
        "org.springframework.data.repository.ListPagingAndSortingRepository",
    ]),
    ("org.springframework.jdbc.core.JdbcOperations", Interface, None, &[]),
    ("org.springframework.jdbc.core.JdbcTemplate", Class, OBJECT, &["org.springframework.jdbc.core.JdbcOperations"]),
    ("org.springframework.jdbc.core.namedparam.NamedParameterJdbcOperations", Interface, None, &[]),
    ("org.springframework.jdbc.core.namedparam.NamedParameterJdbcTemplate", Class, OBJECT, &["org.springframework.jdbc.core.namedparam.NamedParameterJdbcOperations"]),
    // ------------------------------------------------------------ JPA / Hibernate
    ("jakarta.persistence.EntityManager", Interface, None, &[]),
    ("jakarta.persistence.PersistenceException", Class, Some("java.lang.RuntimeException"), &[]),
    ("jakarta.persistence.EntityNotFoundException", Class, Some("jakarta.persistence.PersistenceException"), &[]),
    ("jakarta.persistence.Entity", Annotation, None, &[]),
    ("jakarta.persistence.OneToMany", Annotation, None, &[]),
    ("jakarta.persistence.ManyToMany", Annotation, None, &[]),
    ("jakarta.persistence.ManyToOne", Annotation, None, &[]),
    ("jakarta.persistence.OneToOne", Annotation, None, &[]),
    ("jakarta.persistence.ElementCollection", Annotation, None, &[]),
    ("jakarta.persistence.FetchType", Enum, None, &[]),
    ("jakarta.persistence.Id", Annotation, None, &[]),
    ("jakarta.persistence.Column", Annotation, None, &[]),
    ("javax.persistence.EntityManager", Interface, None, &[]),
    ("javax.persistence.PersistenceException", Class, Some("java.lang.RuntimeException"), &[]),
    ("javax.persistence.Entity", Annotation, None, &[]),
    ("javax.persistence.OneToMany", Annotation, None, &[]),
    ("javax.persistence.ManyToMany", Annotation, None, &[]),
    ("javax.persistence.ManyToOne", Annotation, None, &[]),
    ("javax.persistence.OneToOne", Annotation, None, &[]),
    ("javax.persistence.ElementCollection", Annotation, None, &[]),
    ("javax.persistence.FetchType", Enum, None, &[]),
    ("org.hibernate.Session", Interface, None, &["jakarta.persistence.EntityManager"]),
    ("org.hibernate.StatelessSession", Interface, None, &[]),
];

static LIBRARY: Lazy<HashMap<&'static str, ClassSymbol>> = Lazy::new(|| {
    LIBRARY_TYPES
        .iter()
        .map(|(fqn, kind, superclass, interfaces)| {
            let name = fqn.rsplit('.').next().unwrap_or(fqn);
            let symbol = ClassSymbol {
                name: name.to_string(),
                fqn: fqn.to_string(),
                kind: *kind,
                origin: Origin::Library,
                annotations: Vec::new(),
                superclass: superclass.map(str::to_string),
                interfaces: interfaces.iter().map(|i| i.to_string()).collect(),
                fields: Vec::new(),
                methods: Vec::new(),
                location: TextRange::default(),
            };
            (*fqn, symbol)
        })
        .collect()
});

pub fn lookup(fqn: &str) -> Option<&'static ClassSymbol> {
    LIBRARY.get(fqn)
}

pub fn contains(fqn: &str) -> bool {
    LIBRARY.contains_key(fqn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_supertype_is_registered() {
        for (fqn, _, superclass, interfaces) in LIBRARY_TYPES {
            for parent in superclass.iter().chain(interfaces.iter()) {
                assert!(contains(parent), "{fqn} refers to unregistered {parent}");
            }
        }
    }

    #[test]
    fn test_lookup() {
        let jpa = lookup("org.springframework.data.jpa.repository.JpaRepository").unwrap();
        assert_eq!(jpa.name, "JpaRepository");
        assert_eq!(jpa.origin, Origin::Library);
        assert_eq!(jpa.interfaces.len(), 3);
        assert!(lookup("com.shop.Order").is_none());

        let iterator = lookup("java.util.ListIterator").unwrap();
        assert_eq!(iterator.interfaces, vec!["java.util.Iterator".to_string()]);
        assert!(contains("org.springframework.jdbc.core.JdbcTemplate"));
    }
}
