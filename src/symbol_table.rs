// ============================================================================
// 符号模型 - 规则引擎消费的只读查询面
// ============================================================================
//
// 规则只依赖这里定义的数据类型和 SymbolModel trait，不直接接触 tree-sitter。
// 具体前端 (scanner::project::ProjectModel) 负责把源码解析成这些结构。

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::rules::suppression::SuppressionContext;

// ============================================================================
// 导入表
// ============================================================================

/// 单个文件的导入表
///
/// 查找顺序与 javac 一致: 单类型导入 → 按需导入 (`.*`) → 同包 → `java.lang`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportIndex {
    /// 简单名 → FQN
    pub explicit: HashMap<String, String>,
    /// 按需导入的包名 (去掉 `.*`)
    pub wildcards: Vec<String>,
    pub package: Option<String>,
    /// 本文件声明的顶层类型
    pub local_classes: Vec<String>,
}

static JAVA_LANG: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "Object", "String", "StringBuilder", "Class", "Enum", "Iterable", "Runnable", "Thread",
        "System", "Number", "Integer", "Long", "Short", "Byte", "Double", "Float", "Boolean",
        "Character", "Throwable", "Error", "Exception", "RuntimeException", "InterruptedException",
        "ReflectiveOperationException", "ClassNotFoundException", "CloneNotSupportedException",
        "IllegalArgumentException", "IllegalStateException", "NullPointerException",
        "UnsupportedOperationException",
    ]
    .into_iter()
    .collect()
});

impl ImportIndex {
    /// `imports` 为去掉 `import` 关键字后的文本 (`a.b.C` 或 `a.b.*`)
    pub fn from_imports(imports: Vec<String>, package: Option<String>) -> Self {
        let mut index = Self { package, ..Self::default() };
        for raw in &imports {
            match raw.trim() {
                "" => {}
                on_demand if on_demand.ends_with(".*") => {
                    index.wildcards.push(on_demand.trim_end_matches(".*").to_string());
                }
                single => {
                    let simple = single.rsplit('.').next().unwrap_or(single);
                    index.explicit.insert(simple.to_string(), single.to_string());
                }
            }
        }
        index
    }

    /// `is_known` 判断候选 FQN 是否存在于项目或内置类型表
    pub fn resolve(&self, simple_name: &str, is_known: impl Fn(&str) -> bool) -> Option<String> {
        // 单类型导入即使类型未知也采用
        if let Some(fqn) = self.explicit.get(simple_name) {
            return Some(fqn.clone());
        }

        let on_demand = self
            .wildcards
            .iter()
            .map(|pkg| format!("{pkg}.{simple_name}"))
            .find(|candidate| is_known(candidate.as_str()));
        if on_demand.is_some() {
            return on_demand;
        }

        let same_package = match self.package.as_deref() {
            Some(pkg) => format!("{pkg}.{simple_name}"),
            None => simple_name.to_string(),
        };
        if self.local_classes.iter().any(|c| c == simple_name) || is_known(&same_package) {
            return Some(same_package);
        }

        let implicit = format!("java.lang.{simple_name}");
        (JAVA_LANG.contains(simple_name) || is_known(&implicit)).then_some(implicit)
    }

    pub fn add_local_class(&mut self, class_name: &str) {
        if !self.local_classes.iter().any(|c| c == class_name) {
            self.local_classes.push(class_name.to_string());
        }
    }
}

// ============================================================================
// 位置 / 注解
// ============================================================================

/// 源码区间 (字节偏移 + 长度，line 为 1-based)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextRange {
    pub start: usize,
    pub len: usize,
    pub line: usize,
}

/// 注解属性的原始值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnotationValue {
    /// 单值，保留源码文本 (如 `Propagation.REQUIRES_NEW`, `true`, `IOException.class`)
    Text(String),
    /// 数组初始化 `{A.class, B.class}`，元素保留源码文本
    Array(Vec<String>),
}

impl AnnotationValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AnnotationValue::Text(t) => Some(t),
            AnnotationValue::Array(_) => None,
        }
    }

    /// 单值视为一元素数组
    pub fn items(&self) -> Vec<&str> {
        match self {
            AnnotationValue::Text(t) => vec![t.as_str()],
            AnnotationValue::Array(items) => items.iter().map(String::as_str).collect(),
        }
    }

    /// 全部文本拼接，供 "是否提到 EAGER/LAZY" 这类判断使用
    pub fn joined(&self) -> String {
        self.items().join(",")
    }

    /// Java 源码形式
    pub fn to_source(&self) -> String {
        match self {
            AnnotationValue::Text(t) => t.clone(),
            AnnotationValue::Array(items) => format!("{{{}}}", items.join(", ")),
        }
    }
}

/// 注解视图 - 不可变，每次查询重新派生
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationView {
    /// 源码中的写法 (`Transactional` 或 `org.x.Transactional`)
    pub name: String,
    /// 通过 import 解析出的 FQN；无法解析时等于 name
    pub qualified_name: String,
    /// 属性按源码顺序保存；单个无名值存为 `value`
    pub attributes: Vec<(String, AnnotationValue)>,
    pub location: TextRange,
}

impl AnnotationView {
    pub fn attribute(&self, key: &str) -> Option<&AnnotationValue> {
        self.attributes.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// 是否为指定 FQN 的注解
    ///
    /// 未能解析 import 的注解 (qualified_name 不含 '.') 按简单名匹配。
    pub fn is(&self, fqn: &str) -> bool {
        if self.qualified_name == fqn {
            return true;
        }
        !self.qualified_name.contains('.')
            && fqn.rsplit('.').next() == Some(self.qualified_name.as_str())
    }
}

// ============================================================================
// 类 / 方法 / 字段
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Protected,
    #[default]
    PackagePrivate,
    Private,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_final: bool,
    pub is_abstract: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassKind {
    Class,
    Interface,
    Enum,
    Record,
    Annotation,
}

/// 类型来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// 被分析的源码
    Source,
    /// 内置库类型表 (JDK / Spring / JPA)
    Library,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSymbol {
    pub name: String,
    /// 声明类型的源码文本 (如 `List<OrderItem>`)
    pub type_text: String,
    pub annotations: Vec<AnnotationView>,
    pub location: TextRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamInfo {
    pub name: String,
    pub type_text: String,
}

/// 方法符号
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodSymbol {
    pub name: String,
    /// 声明类 FQN
    pub class: String,
    pub modifiers: Modifiers,
    pub is_constructor: bool,
    pub return_type: Option<String>,
    pub params: Vec<ParamInfo>,
    /// throws 子句，按声明顺序保留源码写法
    pub throws: Vec<String>,
    pub annotations: Vec<AnnotationView>,
    /// 方法名位置
    pub location: TextRange,
    pub throws_location: Option<TextRange>,
    pub body: Vec<BodyNode>,
}

impl MethodSymbol {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.class, self.name)
    }
}

/// 类符号
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassSymbol {
    pub name: String,
    pub fqn: String,
    pub kind: ClassKind,
    pub origin: Origin,
    pub annotations: Vec<AnnotationView>,
    /// extends 子句 (源码文本；库类型为 FQN)
    pub superclass: Option<String>,
    /// implements / 接口 extends 子句，按声明顺序
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldSymbol>,
    pub methods: Vec<MethodSymbol>,
    pub location: TextRange,
}

impl ClassSymbol {
    /// 直接父类型 (父类在前，接口按声明顺序)
    pub fn declared_supertypes(&self) -> impl Iterator<Item = &str> {
        self.superclass.iter().chain(self.interfaces.iter()).map(String::as_str)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSymbol> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// 一个源文件 (编译单元)
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    pub path: PathBuf,
    pub package: Option<String>,
    pub imports: ImportIndex,
    /// 文件中所有类，包括嵌套类 (FQN 为 `pkg.Outer.Inner`)
    pub classes: Vec<ClassSymbol>,
    pub suppression: SuppressionContext,
}

impl CompilationUnit {
    pub fn methods(&self) -> impl Iterator<Item = &MethodSymbol> {
        self.classes.iter().flat_map(|c| c.methods.iter())
    }

    pub fn file_name(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}

// ============================================================================
// 方法体 - 浅层表达式树
// ============================================================================

/// 调用点所在的最内层词法结构
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Enclosing {
    #[default]
    None,
    ForEach,
    StreamLambda(String),
}

/// 局部变量类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeExpr {
    /// 显式声明的类型文本
    Declared(String),
    /// 集合/流的元素类型 (lambda 参数推断)
    ElementOf(Box<Expr>),
    Unknown,
}

/// 接收者/成员访问表达式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    This,
    Super,
    /// 参数、局部变量、foreach 变量、lambda 参数
    Local { name: String, ty: TypeExpr },
    /// 未绑定的标识符：外围类字段，或类型名 (静态调用)
    Name(String),
    Field { object: Box<Expr>, name: String },
    Call { object: Option<Box<Expr>>, method: String, args: usize },
    Other,
}

/// 接收者限定方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiverKind {
    None,
    This,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub method: String,
    pub object: Option<Expr>,
    pub args: usize,
    pub location: TextRange,
    pub enclosing: Enclosing,
}

impl CallSite {
    pub fn receiver_kind(&self) -> ReceiverKind {
        match &self.object {
            None => ReceiverKind::None,
            Some(Expr::This) => ReceiverKind::This,
            Some(_) => ReceiverKind::Other,
        }
    }

    /// 调用本身作为表达式 (链式调用的接收者)
    pub fn as_expr(&self) -> Expr {
        Expr::Call {
            object: self.object.clone().map(Box::new),
            method: self.method.clone(),
            args: self.args,
        }
    }
}

/// `getX()` / `isX()` -> `x`
pub fn getter_field_name(method: &str, args: usize) -> Option<String> {
    if args != 0 {
        return None;
    }
    let rest = method
        .strip_prefix("get")
        .or_else(|| method.strip_prefix("is"))?;
    let mut chars = rest.chars();
    let first = chars.next()?;
    if !first.is_uppercase() {
        return None;
    }
    Some(first.to_lowercase().chain(chars).collect())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberAccess {
    pub expr: Expr,
    pub location: TextRange,
    pub enclosing: Enclosing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyNode {
    Call(CallSite),
    Access(MemberAccess),
    ForEach {
        variable: String,
        location: TextRange,
        body: Vec<BodyNode>,
    },
    StreamLambda {
        operator: String,
        location: TextRange,
        body: Vec<BodyNode>,
    },
}

impl BodyNode {
    /// 先序遍历所有节点 (含嵌套循环/lambda 内部)
    pub fn walk<'a>(nodes: &'a [BodyNode], f: &mut impl FnMut(&'a BodyNode)) {
        for node in nodes {
            f(node);
            match node {
                BodyNode::ForEach { body, .. } | BodyNode::StreamLambda { body, .. } => {
                    Self::walk(body, f)
                }
                BodyNode::Call(_) | BodyNode::Access(_) => {}
            }
        }
    }

    /// 所有调用点 (先序)
    pub fn call_sites(nodes: &[BodyNode]) -> Vec<&CallSite> {
        let mut calls = Vec::new();
        Self::walk(nodes, &mut |node| {
            if let BodyNode::Call(call) = node {
                calls.push(call);
            }
        });
        calls
    }
}

// ============================================================================
// SymbolModel - 规则消费的查询接口
// ============================================================================

/// 调用目标
///
/// `symbol` 仅在目标方法声明于被分析源码中时存在；
/// `declaring_class` 为 None 表示接收者类型无法确定。
#[derive(Debug, Clone)]
pub struct Callee<'a> {
    pub name: &'a str,
    pub declaring_class: Option<String>,
    pub symbol: Option<&'a MethodSymbol>,
}

/// 字段引用 (字段 + 声明它的类)
#[derive(Debug, Clone, Copy)]
pub struct FieldRef<'a> {
    pub owner: &'a ClassSymbol,
    pub field: &'a FieldSymbol,
}

/// 只读、确定性的符号查询接口
pub trait SymbolModel: Send + Sync {
    /// 按 FQN 查找类 (源码或内置库类型)
    fn class(&self, fqn: &str) -> Option<&ClassSymbol>;

    /// 把类型文本解析成 FQN，上下文为 `context_class` 所在文件的 import
    fn resolve_type(&self, context_class: &str, type_text: &str) -> Option<String>;

    /// 解析调用点的目标方法
    fn resolve_call<'a>(&'a self, caller: &'a MethodSymbol, call: &'a CallSite) -> Option<Callee<'a>>;

    /// 解析字段访问 / getter 表达式对应的字段
    fn resolve_access<'a>(&'a self, caller: &'a MethodSymbol, expr: &'a Expr) -> Option<FieldRef<'a>>;

    /// 直接父类型 FQN (父类与接口，按声明顺序；无法解析的保留源码文本)
    fn super_types_of(&self, fqn: &str) -> Vec<String>;

    /// 调用点作为 getter 时对应的字段
    fn resolve_getter<'a>(&'a self, caller: &'a MethodSymbol, call: &'a CallSite) -> Option<FieldRef<'a>> {
        let getter = getter_field_name(&call.method, call.args)?;
        let owner = match self.resolve_call(caller, call) {
            Some(Callee { symbol: Some(m), .. }) => self.class(&m.class)?,
            Some(Callee { declaring_class: Some(c), .. }) => self.class(&c)?,
            _ => return None,
        };
        owner.field(&getter).map(|field| FieldRef { owner, field })
    }

    fn annotations_of_class(&self, fqn: &str) -> &[AnnotationView] {
        self.class(fqn).map(|c| c.annotations.as_slice()).unwrap_or(&[])
    }

    fn fields_of(&self, fqn: &str) -> &[FieldSymbol] {
        self.class(fqn).map(|c| c.fields.as_slice()).unwrap_or(&[])
    }

    /// 只查找直接声明的字段 (不含继承)
    fn find_field(&self, fqn: &str, name: &str) -> Option<&FieldSymbol> {
        self.fields_of(fqn).iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn known<'a>(fqns: &'a [&'a str]) -> impl Fn(&str) -> bool + 'a {
        move |candidate: &str| fqns.iter().any(|f| *f == candidate)
    }

    #[test]
    fn test_single_type_import_beats_on_demand() {
        let index = ImportIndex::from_imports(
            vec![
                "com.legacy.OrderRepository".to_string(),
                " com.shop.repo.* ".to_string(),
                String::new(),
            ],
            Some("com.shop.service".to_string()),
        );
        let classes = ["com.shop.repo.OrderRepository", "com.shop.repo.ItemRepository"];

        assert_eq!(index.wildcards, vec!["com.shop.repo".to_string()]);
        assert_eq!(
            index.resolve("OrderRepository", known(&classes)).as_deref(),
            Some("com.legacy.OrderRepository")
        );
        assert_eq!(
            index.resolve("ItemRepository", known(&classes)).as_deref(),
            Some("com.shop.repo.ItemRepository")
        );
        assert_eq!(index.resolve("Invoice", known(&classes)), None);
    }

    #[test]
    fn test_same_package_then_java_lang() {
        let mut index = ImportIndex::from_imports(vec![], Some("com.shop".to_string()));
        index.add_local_class("OrderService");
        index.add_local_class("OrderService");

        assert_eq!(index.local_classes, vec!["OrderService".to_string()]);
        assert_eq!(index.resolve("OrderService", known(&[])).as_deref(), Some("com.shop.OrderService"));
        assert_eq!(
            index.resolve("Invoice", known(&["com.shop.Invoice"])).as_deref(),
            Some("com.shop.Invoice")
        );
        assert_eq!(
            index.resolve("IllegalStateException", known(&[])).as_deref(),
            Some("java.lang.IllegalStateException")
        );
    }

    #[test]
    fn test_getter_field_name() {
        assert_eq!(getter_field_name("getItems", 0), Some("items".to_string()));
        assert_eq!(getter_field_name("isActive", 0), Some("active".to_string()));
        assert_eq!(getter_field_name("getItems", 1), None);
        assert_eq!(getter_field_name("get", 0), None);
        assert_eq!(getter_field_name("getaway", 0), None);
        assert_eq!(getter_field_name("items", 0), None);
    }

    #[test]
    fn test_annotation_view_matching() {
        let resolved = AnnotationView {
            name: "Transactional".into(),
            qualified_name: "org.springframework.transaction.annotation.Transactional".into(),
            attributes: vec![],
            location: TextRange::default(),
        };
        let unresolved = AnnotationView { qualified_name: "Transactional".into(), ..resolved.clone() };
        let foreign = AnnotationView { qualified_name: "jakarta.transaction.Transactional".into(), ..resolved.clone() };

        let fqn = "org.springframework.transaction.annotation.Transactional";
        assert!(resolved.is(fqn));
        assert!(unresolved.is(fqn));
        assert!(!foreign.is(fqn));
    }

    #[test]
    fn test_receiver_kind() {
        let mut call = CallSite {
            method: "save".into(),
            object: None,
            args: 1,
            location: TextRange::default(),
            enclosing: Enclosing::None,
        };
        assert_eq!(call.receiver_kind(), ReceiverKind::None);
        call.object = Some(Expr::This);
        assert_eq!(call.receiver_kind(), ReceiverKind::This);
        call.object = Some(Expr::Name("repo".into()));
        assert_eq!(call.receiver_kind(), ReceiverKind::Other);
    }

    fn package_name() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-z][a-z0-9]{0,7}", 1..=4).prop_map(|parts| parts.join("."))
    }

    proptest! {
        #[test]
        fn prop_single_type_import_is_authoritative(
            simple in "[A-Z][a-zA-Z0-9]{0,15}",
            imported in package_name(),
            on_demand in package_name(),
        ) {
            let fqn = format!("{imported}.{simple}");
            let competitor = format!("{on_demand}.{simple}");
            let index = ImportIndex::from_imports(vec![fqn.clone(), format!("{on_demand}.*")], None);
            prop_assert_eq!(index.resolve(&simple, |c| c == competitor), Some(fqn));
        }
    }
}
