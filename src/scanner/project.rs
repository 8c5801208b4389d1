// ============================================================================
// ProjectModel - 全项目符号快照
// ============================================================================
//
// 一次分析过程的不可变快照：所有已解析的编译单元 + 内置库类型表。
// 实现 SymbolModel，负责类型解析、调用解析与成员访问解析。

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::library;
use crate::symbol_table::{
    getter_field_name, CallSite, Callee, ClassSymbol, CompilationUnit, Expr, FieldRef, ImportIndex,
    MethodSymbol, Origin, SymbolModel, TypeExpr,
};

/// 祖先遍历的类型数上限
const MAX_HIERARCHY: usize = 256;

/// 保持元素类型不变的流操作
const TYPE_PRESERVING_STREAM_OPS: [&str; 6] = ["filter", "sorted", "distinct", "peek", "limit", "skip"];

/// 类型文本及其解析上下文 (所在类)
#[derive(Debug, Clone, PartialEq, Eq)]
struct TypeRef {
    context: String,
    text: String,
}

pub struct ProjectModel {
    units: Vec<Arc<CompilationUnit>>,
    /// FQN -> (单元下标, 类下标)
    classes: HashMap<String, (usize, usize)>,
}

impl ProjectModel {
    pub fn new(units: Vec<CompilationUnit>) -> Self {
        Self::from_shared(units.into_iter().map(Arc::new).collect())
    }

    pub fn from_shared(units: Vec<Arc<CompilationUnit>>) -> Self {
        let mut classes = HashMap::new();
        for (ui, unit) in units.iter().enumerate() {
            for (ci, class) in unit.classes.iter().enumerate() {
                if classes.contains_key(&class.fqn) {
                    debug!("Duplicate class {} in {}, keeping first", class.fqn, unit.path.display());
                    continue;
                }
                classes.insert(class.fqn.clone(), (ui, ci));
            }
        }
        Self { units, classes }
    }

    pub fn units(&self) -> &[Arc<CompilationUnit>] {
        &self.units
    }

    pub fn unit_for(&self, path: &Path) -> Option<&Arc<CompilationUnit>> {
        self.units.iter().find(|u| u.path == path)
    }

    /// 替换 (或追加) 一个编译单元，得到新的快照
    pub fn with_unit(&self, unit: CompilationUnit) -> Self {
        let mut units = self.units.clone();
        match units.iter().position(|u| u.path == unit.path) {
            Some(i) => units[i] = Arc::new(unit),
            None => units.push(Arc::new(unit)),
        }
        Self::from_shared(units)
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn is_known(&self, fqn: &str) -> bool {
        self.classes.contains_key(fqn) || library::contains(fqn)
    }

    fn is_source_class(&self, fqn: &str) -> bool {
        self.classes.contains_key(fqn)
    }

    fn imports_for(&self, class_fqn: &str) -> Option<&ImportIndex> {
        self.classes
            .get(class_fqn)
            .map(|&(ui, _)| &self.units[ui].imports)
    }

    /// 简单名解析：先查当前类及外层类的嵌套类型，再走 import 规则
    fn resolve_simple(&self, context_class: &str, simple: &str) -> Option<String> {
        let mut scope = Some(context_class);
        while let Some(current) = scope {
            let nested = format!("{current}.{simple}");
            if self.is_source_class(&nested) {
                return Some(nested);
            }
            if current.rsplit('.').next() == Some(simple) && self.is_source_class(current) {
                return Some(current.to_string());
            }
            scope = current
                .rsplit_once('.')
                .map(|(outer, _)| outer)
                .filter(|outer| self.is_source_class(outer));
        }

        let is_known = |candidate: &str| self.is_known(candidate);
        match self.imports_for(context_class) {
            Some(index) => index.resolve(simple, is_known),
            None => ImportIndex::default().resolve(simple, is_known),
        }
    }

    /// 字段查找：类本身、父类型，然后外层类
    fn field_in_scope(&self, class_fqn: &str, name: &str) -> Option<FieldRef<'_>> {
        for owner in self.hierarchy(class_fqn) {
            if let Some(class) = self.class(&owner) {
                if let Some(field) = class.field(name) {
                    return Some(FieldRef { owner: class, field });
                }
            }
        }
        let (outer, _) = class_fqn.rsplit_once('.')?;
        if self.is_source_class(outer) {
            self.field_in_scope(outer, name)
        } else {
            None
        }
    }

    /// 类本身 + 全部祖先 (BFS，防环)
    fn hierarchy(&self, fqn: &str) -> Vec<String> {
        let mut order = vec![fqn.to_string()];
        let mut visited: HashSet<String> = HashSet::from([fqn.to_string()]);
        let mut queue = VecDeque::from([fqn.to_string()]);
        while let Some(current) = queue.pop_front() {
            if order.len() >= MAX_HIERARCHY {
                break;
            }
            for parent in self.super_types_of(&current) {
                if visited.insert(parent.clone()) {
                    order.push(parent.clone());
                    queue.push_back(parent);
                }
            }
        }
        order
    }

    /// 在接收者类型及其祖先中按名称查找方法 (同名时优先参数个数匹配)
    fn find_method(&self, receiver: &str, name: &str, args: usize) -> Option<&MethodSymbol> {
        for owner in self.hierarchy(receiver) {
            let Some(class) = self.class(&owner) else { continue };
            let mut candidates = class
                .methods
                .iter()
                .filter(|m| !m.is_constructor && m.name == name)
                .peekable();
            let first = candidates.peek().copied();
            let exact = candidates.find(|m| arity_matches(m, args));
            if let Some(found) = exact.or(first) {
                return Some(found);
            }
        }
        None
    }

    fn receiver_type(&self, caller: &MethodSymbol, object: Option<&Expr>) -> Option<String> {
        match object {
            None => Some(caller.class.clone()),
            Some(expr) => self.type_of(caller, expr),
        }
    }

    /// 表达式的静态类型 FQN
    fn type_of(&self, caller: &MethodSymbol, expr: &Expr) -> Option<String> {
        match expr {
            Expr::This => Some(caller.class.clone()),
            Expr::Super => {
                let parent = self.class(&caller.class)?.superclass.as_deref()?;
                self.resolve_type(&caller.class, parent)
            }
            other => {
                let declared = self.declared_type(caller, other)?;
                self.resolve_type(&declared.context, &declared.text)
            }
        }
    }

    /// 表达式声明类型的源码文本 (保留泛型参数)
    fn declared_type(&self, caller: &MethodSymbol, expr: &Expr) -> Option<TypeRef> {
        match expr {
            Expr::Local { ty, .. } => match ty {
                TypeExpr::Declared(text) => Some(TypeRef { context: caller.class.clone(), text: text.clone() }),
                TypeExpr::ElementOf(source) => self.element_type(caller, source),
                TypeExpr::Unknown => None,
            },
            Expr::Name(name) => match self.field_in_scope(&caller.class, name) {
                Some(r) => Some(TypeRef { context: r.owner.fqn.clone(), text: r.field.type_text.clone() }),
                // 大写开头视为类型名 (静态调用)
                None if name.starts_with(|c: char| c.is_ascii_uppercase()) => {
                    Some(TypeRef { context: caller.class.clone(), text: name.clone() })
                }
                None => None,
            },
            Expr::Field { object, name } => {
                let owner = self.type_of(caller, object)?;
                let r = self.field_in_scope(&owner, name)?;
                Some(TypeRef { context: r.owner.fqn.clone(), text: r.field.type_text.clone() })
            }
            Expr::Call { object, method, args } => {
                let receiver = self.receiver_type(caller, object.as_deref())?;
                if let Some(m) = self.find_method(&receiver, method, *args) {
                    let text = m.return_type.clone()?;
                    return Some(TypeRef { context: m.class.clone(), text });
                }
                // 没有显式 getter (如 Lombok)：按字段类型
                let field = getter_field_name(method, *args)?;
                let class = self.class(&receiver)?;
                let field = class.field(&field)?;
                Some(TypeRef { context: class.fqn.clone(), text: field.type_text.clone() })
            }
            Expr::This | Expr::Super | Expr::Other => None,
        }
    }

    /// 集合 / 流的元素类型
    fn element_type(&self, caller: &MethodSymbol, source: &Expr) -> Option<TypeRef> {
        if let Expr::Call { object: Some(object), method, .. } = source {
            if method == "stream" || method == "parallelStream" {
                let collection = self.declared_type(caller, object)?;
                return first_type_argument(&collection.text)
                    .map(|text| TypeRef { context: collection.context, text });
            }
            if TYPE_PRESERVING_STREAM_OPS.contains(&method.as_str()) {
                return self.element_type(caller, object);
            }
        }
        let declared = self.declared_type(caller, source)?;
        first_type_argument(&declared.text).map(|text| TypeRef { context: declared.context, text })
    }
}

fn arity_matches(method: &MethodSymbol, args: usize) -> bool {
    match method.params.last() {
        Some(last) if last.type_text.ends_with("...") => args + 1 >= method.params.len(),
        _ => method.params.len() == args,
    }
}

fn is_primitive(name: &str) -> bool {
    matches!(
        name,
        "int" | "long" | "short" | "byte" | "char" | "boolean" | "float" | "double" | "void"
    )
}

/// `@Valid List<Order>` -> `List`，`Order[]` -> `Order`
pub fn base_type_name(type_text: &str) -> String {
    let head = type_text.split('<').next().unwrap_or(type_text);
    let head = head.trim().trim_end_matches("...").trim_end_matches("[]").trim();
    head.split_whitespace().last().unwrap_or("").to_string()
}

/// `List<Order>` -> `Order`，`Map<K, List<V>>` -> `K`，`Order[]` -> `Order`
pub fn first_type_argument(type_text: &str) -> Option<String> {
    let trimmed = type_text.trim();
    if let Some(element) = trimmed.strip_suffix("[]") {
        return Some(element.trim().to_string());
    }
    let open = trimmed.find('<')?;
    let close = trimmed.rfind('>').filter(|close| *close > open)?;
    let inner = trimmed.get(open + 1..close)?;

    let mut depth = 0usize;
    let mut end = inner.len();
    for (i, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                end = i;
                break;
            }
            _ => {}
        }
    }
    let arg = inner[..end].trim();
    let arg = arg
        .strip_prefix("? extends ")
        .or_else(|| arg.strip_prefix("? super "))
        .unwrap_or(arg)
        .trim();
    if arg.is_empty() || arg == "?" {
        None
    } else {
        Some(arg.to_string())
    }
}

impl SymbolModel for ProjectModel {
    fn class(&self, fqn: &str) -> Option<&ClassSymbol> {
        if let Some(&(ui, ci)) = self.classes.get(fqn) {
            return self.units[ui].classes.get(ci);
        }
        library::lookup(fqn)
    }

    fn resolve_type(&self, context_class: &str, type_text: &str) -> Option<String> {
        let name = base_type_name(type_text);
        if name.is_empty() || is_primitive(&name) {
            return None;
        }
        match name.split_once('.') {
            None => self.resolve_simple(context_class, &name),
            Some((head, rest)) => match self.resolve_simple(context_class, head) {
                // Outer.Inner
                Some(head_fqn) => Some(format!("{head_fqn}.{rest}")),
                // 全限定名
                None => Some(name),
            },
        }
    }

    fn resolve_call<'a>(&'a self, caller: &'a MethodSymbol, call: &'a CallSite) -> Option<Callee<'a>> {
        if call.method.is_empty() {
            return None;
        }
        let name = call.method.as_str();

        let receiver = match &call.object {
            None | Some(Expr::This) => Some(caller.class.clone()),
            Some(expr) => self.type_of(caller, expr),
        };
        let Some(receiver) = receiver else {
            return Some(Callee { name, declaring_class: None, symbol: None });
        };

        if let Some(m) = self.find_method(&receiver, name, call.args) {
            return Some(Callee { name, declaring_class: Some(m.class.clone()), symbol: Some(m) });
        }

        // 内部类中的无限定调用可能指向外层类的方法
        if call.object.is_none() {
            let mut scope = receiver.rsplit_once('.').map(|(outer, _)| outer);
            while let Some(outer) = scope.filter(|o| self.is_source_class(o)) {
                if let Some(m) = self.find_method(outer, name, call.args) {
                    return Some(Callee { name, declaring_class: Some(m.class.clone()), symbol: Some(m) });
                }
                scope = outer.rsplit_once('.').map(|(o, _)| o);
            }
        }

        Some(Callee { name, declaring_class: Some(receiver), symbol: None })
    }

    fn resolve_access<'a>(&'a self, caller: &'a MethodSymbol, expr: &'a Expr) -> Option<FieldRef<'a>> {
        let (owner, field_name) = match expr {
            Expr::Field { object, name } => (self.type_of(caller, object)?, name.clone()),
            Expr::Name(name) => (caller.class.clone(), name.clone()),
            Expr::Call { object, method, args } => {
                let field_name = getter_field_name(method, *args)?;
                let receiver = self.receiver_type(caller, object.as_deref())?;
                let owner = self
                    .find_method(&receiver, method, *args)
                    .map(|m| m.class.clone())
                    .unwrap_or(receiver);
                (owner, field_name)
            }
            _ => return None,
        };
        // 只查找直接声明在该类上的字段
        let class = self.class(&owner)?;
        class.field(&field_name).map(|field| FieldRef { owner: class, field })
    }

    fn super_types_of(&self, fqn: &str) -> Vec<String> {
        let Some(class) = self.class(fqn) else {
            return Vec::new();
        };
        match class.origin {
            Origin::Library => class.declared_supertypes().map(str::to_string).collect(),
            Origin::Source => class
                .declared_supertypes()
                .map(|text| {
                    self.resolve_type(fqn, text)
                        .unwrap_or_else(|| base_type_name(text))
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::test_support::model_of;
    use crate::symbol_table::BodyNode;

    fn shop() -> ProjectModel {
        model_of(&[
            (
                "Order.java",
                r#"
                package com.shop.domain;
                import jakarta.persistence.*;
                @Entity
                public class Order {
                    @OneToMany private List<OrderItem> items;
                    @ManyToOne private Customer customer;
                    public Customer getCustomer() { return customer; }
                    public static class Key {}
                }
                "#,
            ),
            (
                "OrderItem.java",
                r#"
                package com.shop.domain;
                public class OrderItem { private String sku; }
                "#,
            ),
            (
                "OrderRepository.java",
                r#"
                package com.shop.repo;
                import com.shop.domain.Order;
                import org.springframework.data.jpa.repository.JpaRepository;
                public interface OrderRepository extends JpaRepository<Order, Long> {
                    List<Order> findByStatus(String status);
                }
                "#,
            ),
            (
                "OrderService.java",
                r#"
                package com.shop.service;
                import com.shop.domain.*;
                import com.shop.repo.OrderRepository;
                public class OrderService extends BaseService {
                    private OrderRepository repository;
                    public void run(List<Order> orders, Order.Key key) {
                        repository.save(orders.get(0));
                        orders.stream().filter(o -> o != null).map(o -> o.getItems());
                        helper();
                        repository.findByStatus("NEW");
                        unknown.flush();
                    }
                }
                "#,
            ),
            (
                "BaseService.java",
                r#"
                package com.shop.service;
                public abstract class BaseService {
                    protected void helper() {}
                }
                "#,
            ),
        ])
    }

    fn method<'a>(model: &'a ProjectModel, class: &str, name: &str) -> &'a MethodSymbol {
        model
            .class(class)
            .and_then(|c| c.methods.iter().find(|m| m.name == name))
            .unwrap()
    }

    #[test]
    fn test_resolve_type_variants() {
        let model = shop();
        let ctx = "com.shop.service.OrderService";
        assert_eq!(model.resolve_type(ctx, "Order"), Some("com.shop.domain.Order".into()));
        assert_eq!(model.resolve_type(ctx, "List<Order>"), None);
        assert_eq!(model.resolve_type(ctx, "Order.Key"), Some("com.shop.domain.Order.Key".into()));
        assert_eq!(model.resolve_type(ctx, "java.util.List<Order>"), Some("java.util.List".into()));
        assert_eq!(model.resolve_type(ctx, "int"), None);
        assert_eq!(model.resolve_type(ctx, "BaseService"), Some("com.shop.service.BaseService".into()));
        assert_eq!(model.resolve_type("com.shop.domain.Order", "Key"), Some("com.shop.domain.Order.Key".into()));
    }

    #[test]
    fn test_super_types() {
        let model = shop();
        assert_eq!(
            model.super_types_of("com.shop.repo.OrderRepository"),
            vec!["org.springframework.data.jpa.repository.JpaRepository".to_string()]
        );
        assert_eq!(
            model.super_types_of("com.shop.service.OrderService"),
            vec!["com.shop.service.BaseService".to_string()]
        );
        assert!(model.super_types_of("com.nowhere.X").is_empty());
    }

    #[test]
    fn test_resolve_calls() {
        let model = shop();
        let run = method(&model, "com.shop.service.OrderService", "run");
        let calls = BodyNode::call_sites(&run.body);
        let find = |name: &str| calls.iter().copied().find(|c| c.method == name).unwrap();

        // 接口继承的库方法：只有名称和声明类
        let save = model.resolve_call(run, find("save")).unwrap();
        assert_eq!(save.declaring_class.as_deref(), Some("com.shop.repo.OrderRepository"));
        assert!(save.symbol.is_none());

        // 源码方法
        let by_status = model.resolve_call(run, find("findByStatus")).unwrap();
        assert_eq!(by_status.symbol.map(|m| m.class.as_str()), Some("com.shop.repo.OrderRepository"));

        // 继承的方法
        let helper = model.resolve_call(run, find("helper")).unwrap();
        assert_eq!(helper.declaring_class.as_deref(), Some("com.shop.service.BaseService"));
        assert!(helper.symbol.is_some());

        // 接收者类型未知
        let flush = model.resolve_call(run, find("flush")).unwrap();
        assert_eq!(flush.declaring_class, None);
    }

    #[test]
    fn test_stream_element_and_lombok_getter() {
        let model = shop();
        let run = method(&model, "com.shop.service.OrderService", "run");
        let calls = BodyNode::call_sites(&run.body);
        let get_items = calls.iter().copied().find(|c| c.method == "getItems").unwrap();

        let field = model.resolve_getter(run, get_items).unwrap();
        assert_eq!(field.owner.fqn, "com.shop.domain.Order");
        assert_eq!(field.field.name, "items");

        let expr = get_items.as_expr();
        let access = model.resolve_access(run, &expr).unwrap();
        assert_eq!(access.field.type_text, "List<OrderItem>");
    }

    #[test]
    fn test_with_unit_replaces_snapshot_entry() {
        let model = shop();
        let replacement = crate::scanner::test_support::unit_of(
            "OrderItem.java",
            "package com.shop.domain; public class LineItem {}",
        );
        let next = model.with_unit(replacement);
        assert_eq!(next.units().len(), model.units().len());
        assert!(next.class("com.shop.domain.OrderItem").is_none());
        assert!(next.class("com.shop.domain.LineItem").is_some());
        assert!(model.class("com.shop.domain.OrderItem").is_some());
    }

    #[test]
    fn test_type_text_helpers() {
        assert_eq!(base_type_name("@Valid List<Order>"), "List");
        assert_eq!(base_type_name("Order[]"), "Order");
        assert_eq!(base_type_name("String..."), "String");
        assert_eq!(first_type_argument("List<Order>"), Some("Order".into()));
        assert_eq!(first_type_argument("Map<String, List<Order>>"), Some("String".into()));
        assert_eq!(first_type_argument("Set<? extends Item>"), Some("Item".into()));
        assert_eq!(first_type_argument("Order[]"), Some("Order".into()));
        assert_eq!(first_type_argument("Order"), None);
        assert_eq!(first_type_argument("Weird>Type<"), None);
        assert_eq!(first_type_argument("A>B<C>"), Some("C".into()));
    }
}
