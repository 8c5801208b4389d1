use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Result};
use tracing::debug;
use tree_sitter::{Node, Parser, Query, QueryCursor, Tree};

use super::library;
use crate::error::AnalysisError;
use crate::rules::suppression::{annotated_rules, SuppressionContext};
use crate::symbol_table::{
    AnnotationValue, AnnotationView, BodyNode, CallSite, ClassKind, ClassSymbol, CompilationUnit,
    Enclosing, Expr, FieldSymbol, ImportIndex, MemberAccess, MethodSymbol, Modifiers, Origin,
    ParamInfo, TextRange, TypeExpr, Visibility,
};

// ============================================================================
// thread_local Parser 复用
// ============================================================================
//
// Parser::new() 和 set_language() 涉及 native 层初始化，
// 每个 rayon 工作线程只初始化一次。

thread_local! {
    static JAVA_PARSER: RefCell<Option<Parser>> = const { RefCell::new(None) };
}

/// 获取或初始化线程本地 Parser
fn with_parser<F, R>(language: &tree_sitter::Language, f: F) -> Result<R>
where
    F: FnOnce(&mut Parser) -> Result<R>,
{
    JAVA_PARSER.with(|cell| {
        let mut slot = cell.borrow_mut();

        if slot.is_none() {
            let mut parser = Parser::new();
            parser
                .set_language(language)
                .map_err(|e| anyhow!("Failed to set language: {e}"))?;
            *slot = Some(parser);
        }

        match slot.as_mut() {
            Some(parser) => f(parser),
            None => Err(anyhow!("parser not initialised")),
        }
    })
}

/// 流式操作：lambda / 方法引用实参视为 N+1 检查的循环体
pub const STREAM_OPERATORS: [&str; 4] = ["map", "flatMap", "forEach", "filter"];

/// Java 源码 -> CompilationUnit
pub struct JavaFrontend {
    language: tree_sitter::Language,
    /// package / import 提取查询
    header_query: Query,
}

impl JavaFrontend {
    pub fn new() -> Result<Self> {
        let language = tree_sitter_java::language();
        let header_query = Self::compile_header_query(&language)?;
        Ok(Self { language, header_query })
    }

    fn compile_header_query(language: &tree_sitter::Language) -> Result<Query> {
        let query_str = r#"
            (package_declaration
                [
                    (scoped_identifier) @package
                    (identifier) @package
                ]
            )
            (import_declaration) @import
        "#;
        Query::new(language, query_str).map_err(|e| anyhow!("Failed to compile header query: {e}"))
    }

    pub fn parse_file(&self, path: &Path) -> Result<CompilationUnit, AnalysisError> {
        let code = std::fs::read_to_string(path).map_err(|e| AnalysisError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        self.parse_source(path, &code)
    }

    pub fn parse_source(&self, path: &Path, code: &str) -> Result<CompilationUnit, AnalysisError> {
        let tree = with_parser(&self.language, |parser| {
            parser
                .parse(code, None)
                .ok_or_else(|| anyhow!("tree-sitter produced no tree"))
        })
        .map_err(|e| AnalysisError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if tree.root_node().has_error() {
            debug!("{} contains syntax errors, extracting what parsed", path.display());
        }

        Ok(self.extract_unit(path, code, &tree))
    }

    fn extract_unit(&self, path: &Path, code: &str, tree: &Tree) -> CompilationUnit {
        let src = code.as_bytes();
        let (package, imports) = self.extract_header(tree, src);
        let mut index = ImportIndex::from_imports(imports, package.clone());

        let root = tree.root_node();
        let mut cursor = root.walk();
        let declarations: Vec<Node> = root
            .named_children(&mut cursor)
            .filter(|n| is_type_declaration(n.kind()))
            .collect();

        for decl in &declarations {
            if let Some(name) = decl.child_by_field_name("name") {
                index.add_local_class(&text(name, src));
            }
        }

        let extractor = Extractor { src, imports: &index };
        let mut classes = Vec::new();
        for decl in declarations {
            extractor.extract_class(decl, package.as_deref(), None, &mut classes);
        }

        let mut suppression = SuppressionContext::parse(code);
        register_suppressed_declarations(root, src, &mut suppression);

        CompilationUnit {
            path: path.to_path_buf(),
            package,
            imports: index,
            classes,
            suppression,
        }
    }

    fn extract_header(&self, tree: &Tree, src: &[u8]) -> (Option<String>, Vec<String>) {
        let mut package = None;
        let mut imports = Vec::new();
        let package_idx = self.header_query.capture_index_for_name("package");
        let import_idx = self.header_query.capture_index_for_name("import");

        let mut cursor = QueryCursor::new();
        for m in cursor.matches(&self.header_query, tree.root_node(), src) {
            for capture in m.captures {
                if Some(capture.index) == package_idx && package.is_none() {
                    package = Some(text(capture.node, src));
                } else if Some(capture.index) == import_idx {
                    if let Some(import) = import_name(capture.node, src) {
                        imports.push(import);
                    }
                }
            }
        }

        (package, imports)
    }
}

/// `import a.b.C;` -> `a.b.C`，`import a.b.*;` -> `a.b.*`；静态 import 忽略
fn import_name(node: Node, src: &[u8]) -> Option<String> {
    let mut cursor = node.walk();
    let mut name = None;
    let mut wildcard = false;
    for child in node.children(&mut cursor) {
        match child.kind() {
            "static" => return None,
            "asterisk" => wildcard = true,
            "scoped_identifier" | "identifier" => name = Some(text(child, src)),
            _ => {}
        }
    }
    name.map(|n| if wildcard { format!("{n}.*") } else { n })
}

fn is_type_declaration(kind: &str) -> bool {
    matches!(
        kind,
        "class_declaration"
            | "interface_declaration"
            | "enum_declaration"
            | "record_declaration"
            | "annotation_type_declaration"
    )
}

/// 带 `@SuppressWarnings("tx-lint:...")` 的类 / 方法 / 字段声明，整个声明范围 (含方法体) 都被抑制
fn register_suppressed_declarations(root: Node, src: &[u8], ctx: &mut SuppressionContext) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if is_type_declaration(node.kind())
            || matches!(
                node.kind(),
                "method_declaration" | "constructor_declaration" | "compact_constructor_declaration" | "field_declaration"
            )
        {
            if let Some(modifiers) = child_of_kind(node, "modifiers") {
                for annotation in named_children_of(modifiers) {
                    let is_suppress = annotation
                        .child_by_field_name("name")
                        .is_some_and(|name| text(name, src).ends_with("SuppressWarnings"));
                    if is_suppress {
                        ctx.suppress_declaration(
                            node.start_position().row + 1,
                            node.end_position().row + 1,
                            annotated_rules(&text(annotation, src)),
                        );
                    }
                }
            }
        }
        let mut cursor = node.walk();
        stack.extend(node.named_children(&mut cursor));
    }
}

fn is_comment(node: &Node) -> bool {
    matches!(node.kind(), "line_comment" | "block_comment")
}

fn text(node: Node, src: &[u8]) -> String {
    node.utf8_text(src).unwrap_or("").to_string()
}

fn range(node: Node) -> TextRange {
    TextRange {
        start: node.start_byte(),
        len: node.end_byte().saturating_sub(node.start_byte()),
        line: node.start_position().row + 1,
    }
}

fn named_children_of<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|n| !is_comment(n))
        .collect()
}

fn child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == kind);
    found
}

// ============================================================================
// 声明提取
// ============================================================================

struct Extractor<'a> {
    src: &'a [u8],
    imports: &'a ImportIndex,
}

impl<'a> Extractor<'a> {
    fn text(&self, node: Node) -> String {
        text(node, self.src)
    }

    fn extract_class(&self, node: Node, package: Option<&str>, outer: Option<&str>, out: &mut Vec<ClassSymbol>) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node);
        let fqn = match (outer, package) {
            (Some(outer), _) => format!("{outer}.{name}"),
            (None, Some(pkg)) => format!("{pkg}.{name}"),
            (None, None) => name.clone(),
        };
        let kind = match node.kind() {
            "interface_declaration" => ClassKind::Interface,
            "enum_declaration" => ClassKind::Enum,
            "record_declaration" => ClassKind::Record,
            "annotation_type_declaration" => ClassKind::Annotation,
            _ => ClassKind::Class,
        };

        let (_, annotations) = self.modifiers(child_of_kind(node, "modifiers"), kind);

        let superclass = node
            .child_by_field_name("superclass")
            .and_then(|s| named_children_of(s).into_iter().next())
            .map(|t| self.text(t));

        let mut interfaces = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if matches!(child.kind(), "super_interfaces" | "extends_interfaces") {
                if let Some(list) = child_of_kind(child, "type_list") {
                    interfaces.extend(named_children_of(list).into_iter().map(|t| self.text(t)));
                }
            }
        }

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        let mut nested = Vec::new();

        if let Some(body) = node.child_by_field_name("body") {
            let mut members = Vec::new();
            for member in named_children_of(body) {
                if member.kind() == "enum_body_declarations" {
                    members.extend(named_children_of(member));
                } else {
                    members.push(member);
                }
            }

            for member in members {
                match member.kind() {
                    "field_declaration" => self.extract_fields(member, &mut fields),
                    "method_declaration" | "constructor_declaration" => {
                        if let Some(method) = self.extract_method(member, &fqn, kind) {
                            methods.push(method);
                        }
                    }
                    k if is_type_declaration(k) => nested.push(member),
                    _ => {}
                }
            }
        }

        out.push(ClassSymbol {
            name,
            fqn: fqn.clone(),
            kind,
            origin: Origin::Source,
            annotations,
            superclass,
            interfaces,
            fields,
            methods,
            location: range(name_node),
        });

        for inner in nested {
            self.extract_class(inner, package, Some(&fqn), out);
        }
    }

    /// 修饰符关键字 + 注解
    fn modifiers(&self, node: Option<Node>, owner_kind: ClassKind) -> (Modifiers, Vec<AnnotationView>) {
        let mut modifiers = Modifiers::default();
        let mut annotations = Vec::new();
        let mut explicit_visibility = false;

        if let Some(node) = node {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                match child.kind() {
                    "public" => {
                        modifiers.visibility = Visibility::Public;
                        explicit_visibility = true;
                    }
                    "protected" => {
                        modifiers.visibility = Visibility::Protected;
                        explicit_visibility = true;
                    }
                    "private" => {
                        modifiers.visibility = Visibility::Private;
                        explicit_visibility = true;
                    }
                    "static" => modifiers.is_static = true,
                    "final" => modifiers.is_final = true,
                    "abstract" => modifiers.is_abstract = true,
                    "marker_annotation" | "annotation" => annotations.push(self.annotation(child)),
                    _ => {}
                }
            }
        }

        // 接口成员默认 public
        if !explicit_visibility && matches!(owner_kind, ClassKind::Interface | ClassKind::Annotation) {
            modifiers.visibility = Visibility::Public;
        }

        (modifiers, annotations)
    }

    fn annotation(&self, node: Node) -> AnnotationView {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n))
            .unwrap_or_default();
        let qualified_name = if name.contains('.') {
            name.clone()
        } else {
            self.imports
                .resolve(&name, library::contains)
                .unwrap_or_else(|| name.clone())
        };

        let mut attributes = Vec::new();
        if let Some(args) = node.child_by_field_name("arguments") {
            for arg in named_children_of(args) {
                if arg.kind() == "element_value_pair" {
                    let key = arg.child_by_field_name("key").map(|k| self.text(k));
                    let value = arg.child_by_field_name("value").map(|v| self.annotation_value(v));
                    if let (Some(key), Some(value)) = (key, value) {
                        attributes.push((key, value));
                    }
                } else {
                    attributes.push(("value".to_string(), self.annotation_value(arg)));
                }
            }
        }

        AnnotationView {
            name,
            qualified_name,
            attributes,
            location: range(node),
        }
    }

    fn annotation_value(&self, node: Node) -> AnnotationValue {
        if node.kind() == "element_value_array_initializer" {
            AnnotationValue::Array(named_children_of(node).into_iter().map(|n| self.text(n)).collect())
        } else {
            AnnotationValue::Text(self.text(node))
        }
    }

    fn extract_fields(&self, node: Node, out: &mut Vec<FieldSymbol>) {
        let (_, annotations) = self.modifiers(child_of_kind(node, "modifiers"), ClassKind::Class);
        let type_text = node
            .child_by_field_name("type")
            .map(|t| self.text(t))
            .unwrap_or_default();

        let mut cursor = node.walk();
        for declarator in node.children_by_field_name("declarator", &mut cursor) {
            if let Some(name) = declarator.child_by_field_name("name") {
                out.push(FieldSymbol {
                    name: self.text(name),
                    type_text: type_text.clone(),
                    annotations: annotations.clone(),
                    location: range(name),
                });
            }
        }
    }

    fn extract_method(&self, node: Node, class_fqn: &str, class_kind: ClassKind) -> Option<MethodSymbol> {
        let name_node = node.child_by_field_name("name")?;
        let (modifiers, annotations) = self.modifiers(child_of_kind(node, "modifiers"), class_kind);
        let is_constructor = node.kind() == "constructor_declaration";

        let params = node
            .child_by_field_name("parameters")
            .map(|p| self.parameters(p))
            .unwrap_or_default();

        let throws_node = child_of_kind(node, "throws");
        let throws = throws_node
            .map(|t| named_children_of(t).into_iter().map(|n| self.text(n)).collect())
            .unwrap_or_default();

        let body = node
            .child_by_field_name("body")
            .map(|b| BodyBuilder::new(self.src, &params).build(b))
            .unwrap_or_default();

        Some(MethodSymbol {
            name: self.text(name_node),
            class: class_fqn.to_string(),
            modifiers,
            is_constructor,
            return_type: node.child_by_field_name("type").map(|t| self.text(t)),
            params,
            throws,
            annotations,
            location: range(name_node),
            throws_location: throws_node.map(range),
            body,
        })
    }

    fn parameters(&self, node: Node) -> Vec<ParamInfo> {
        let mut params = Vec::new();
        for param in named_children_of(node) {
            match param.kind() {
                "formal_parameter" => {
                    let type_text = param.child_by_field_name("type").map(|t| self.text(t));
                    let name = param.child_by_field_name("name").map(|n| self.text(n));
                    if let (Some(type_text), Some(name)) = (type_text, name) {
                        params.push(ParamInfo { name, type_text });
                    }
                }
                "spread_parameter" => {
                    let mut type_text = None;
                    let mut name = None;
                    for child in named_children_of(param) {
                        match child.kind() {
                            "modifiers" => {}
                            "variable_declarator" => {
                                name = child.child_by_field_name("name").map(|n| self.text(n));
                            }
                            "identifier" if type_text.is_some() => name = Some(self.text(child)),
                            _ if type_text.is_none() => type_text = Some(format!("{}...", self.text(child))),
                            _ => {}
                        }
                    }
                    if let (Some(type_text), Some(name)) = (type_text, name) {
                        params.push(ParamInfo { name, type_text });
                    }
                }
                _ => {}
            }
        }
        params
    }
}

// ============================================================================
// 方法体提取
// ============================================================================
//
// 只保留规则关心的结构：调用点、成员访问、for-each 循环、流式 lambda。
// 局部变量按作用域记录声明类型，用于后续接收者类型推断。

struct BodyBuilder<'a> {
    src: &'a [u8],
    scopes: Vec<HashMap<String, TypeExpr>>,
}

impl<'a> BodyBuilder<'a> {
    fn new(src: &'a [u8], params: &[ParamInfo]) -> Self {
        let scope = params
            .iter()
            .map(|p| (p.name.clone(), TypeExpr::Declared(p.type_text.clone())))
            .collect();
        Self { src, scopes: vec![scope] }
    }

    fn build(mut self, body: Node) -> Vec<BodyNode> {
        let mut out = Vec::new();
        self.visit(body, &Enclosing::None, &mut out);
        out
    }

    fn text(&self, node: Node) -> String {
        text(node, self.src)
    }

    fn lookup(&self, name: &str) -> Option<&TypeExpr> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn declare(&mut self, name: String, ty: TypeExpr) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, ty);
        }
    }

    fn declared(type_text: String) -> TypeExpr {
        if type_text.is_empty() || type_text == "var" {
            TypeExpr::Unknown
        } else {
            TypeExpr::Declared(type_text)
        }
    }

    fn visit(&mut self, node: Node, enclosing: &Enclosing, out: &mut Vec<BodyNode>) {
        match node.kind() {
            "method_invocation" => self.invocation(node, enclosing, out),
            "field_access" => {
                if let Some(object) = node.child_by_field_name("object") {
                    self.visit(object, enclosing, out);
                }
                out.push(BodyNode::Access(MemberAccess {
                    expr: self.expr(node),
                    location: range(node),
                    enclosing: enclosing.clone(),
                }));
            }
            "identifier" => {
                let name = self.text(node);
                if self.lookup(&name).is_none() {
                    out.push(BodyNode::Access(MemberAccess {
                        expr: Expr::Name(name),
                        location: range(node),
                        enclosing: enclosing.clone(),
                    }));
                }
            }
            "local_variable_declaration" => {
                let type_text = node
                    .child_by_field_name("type")
                    .map(|t| self.text(t))
                    .unwrap_or_default();
                let mut cursor = node.walk();
                let declarators: Vec<Node> = node.children_by_field_name("declarator", &mut cursor).collect();
                for declarator in declarators {
                    if let Some(value) = declarator.child_by_field_name("value") {
                        self.visit(value, enclosing, out);
                    }
                    if let Some(name) = declarator.child_by_field_name("name") {
                        let name = self.text(name);
                        self.declare(name, Self::declared(type_text.clone()));
                    }
                }
            }
            "catch_formal_parameter" => {
                let type_text = child_of_kind(node, "catch_type")
                    .map(|t| self.text(t))
                    .unwrap_or_default();
                if let Some(name) = node.child_by_field_name("name") {
                    let name = self.text(name);
                    self.declare(name, Self::declared(type_text));
                }
            }
            "resource" => match node.child_by_field_name("name") {
                Some(name) => {
                    if let Some(value) = node.child_by_field_name("value") {
                        self.visit(value, enclosing, out);
                    }
                    let type_text = node
                        .child_by_field_name("type")
                        .map(|t| self.text(t))
                        .unwrap_or_default();
                    let name = self.text(name);
                    self.declare(name, Self::declared(type_text));
                }
                None => self.visit_children(node, enclosing, out),
            },
            "instanceof_expression" => {
                if let Some(left) = node.child_by_field_name("left") {
                    self.visit(left, enclosing, out);
                }
                let pattern_type = node.child_by_field_name("right").map(|t| self.text(t));
                if let (Some(name), Some(type_text)) = (node.child_by_field_name("name"), pattern_type) {
                    let name = self.text(name);
                    self.declare(name, Self::declared(type_text));
                }
            }
            "enhanced_for_statement" => self.for_each(node, enclosing, out),
            "lambda_expression" => {
                // 非流式 lambda：内容按当前结构处理
                self.scopes.push(HashMap::new());
                for (name, type_text) in self.lambda_params(node) {
                    self.declare(name, type_text.map(Self::declared).unwrap_or(TypeExpr::Unknown));
                }
                if let Some(body) = node.child_by_field_name("body") {
                    self.visit(body, enclosing, out);
                }
                self.scopes.pop();
            }
            "object_creation_expression" => {
                // 匿名类体不进入
                if let Some(args) = node.child_by_field_name("arguments") {
                    self.visit(args, enclosing, out);
                }
            }
            "block" | "for_statement" | "catch_clause" | "try_with_resources_statement" | "switch_block_statement_group" => {
                self.scopes.push(HashMap::new());
                self.visit_children(node, enclosing, out);
                self.scopes.pop();
            }
            "method_reference" | "line_comment" | "block_comment" | "modifiers" | "class_body" => {}
            k if is_type_declaration(k) => {}
            _ => self.visit_children(node, enclosing, out),
        }
    }

    fn visit_children(&mut self, node: Node, enclosing: &Enclosing, out: &mut Vec<BodyNode>) {
        let mut cursor = node.walk();
        if !cursor.goto_first_child() {
            return;
        }
        loop {
            let child = cursor.node();
            // 名称 / 类型位置上的标识符不是表达式
            let skip = matches!(
                cursor.field_name(),
                Some("name" | "type" | "key" | "dimensions" | "type_arguments" | "type_parameters")
            );
            if child.is_named() && !skip {
                self.visit(child, enclosing, out);
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }

    fn invocation(&mut self, node: Node, enclosing: &Enclosing, out: &mut Vec<BodyNode>) {
        let Some(name_node) = node.child_by_field_name("name") else {
            self.visit_children(node, enclosing, out);
            return;
        };
        let method = self.text(name_node);
        let object_node = node.child_by_field_name("object");
        if let Some(object) = object_node {
            self.visit(object, enclosing, out);
        }
        let object = object_node.map(|o| self.expr(o));
        let args = node
            .child_by_field_name("arguments")
            .map(named_children_of)
            .unwrap_or_default();

        out.push(BodyNode::Call(CallSite {
            method: method.clone(),
            object: object.clone(),
            args: args.len(),
            location: TextRange {
                start: name_node.start_byte(),
                len: node.end_byte().saturating_sub(name_node.start_byte()),
                line: name_node.start_position().row + 1,
            },
            enclosing: enclosing.clone(),
        }));

        let is_stream_op = STREAM_OPERATORS.contains(&method.as_str());
        for arg in args {
            match arg.kind() {
                "lambda_expression" if is_stream_op => self.stream_lambda(arg, &method, object.clone(), out),
                "method_reference" if is_stream_op => self.stream_method_ref(arg, &method, out),
                _ => self.visit(arg, enclosing, out),
            }
        }
    }

    fn lambda_params(&self, node: Node) -> Vec<(String, Option<String>)> {
        let Some(params) = node.child_by_field_name("parameters") else {
            return Vec::new();
        };
        match params.kind() {
            "identifier" => vec![(self.text(params), None)],
            "inferred_parameters" => named_children_of(params)
                .into_iter()
                .map(|p| (self.text(p), None))
                .collect(),
            "formal_parameters" => named_children_of(params)
                .into_iter()
                .filter_map(|p| {
                    let name = p.child_by_field_name("name")?;
                    let type_text = p.child_by_field_name("type").map(|t| self.text(t));
                    Some((self.text(name), type_text))
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// `source.op(x -> body)`：首个参数类型为 source 的元素类型
    fn stream_lambda(&mut self, node: Node, operator: &str, source: Option<Expr>, out: &mut Vec<BodyNode>) {
        let params = self.lambda_params(node);
        self.scopes.push(HashMap::new());
        for (i, (name, type_text)) in params.into_iter().enumerate() {
            let ty = match type_text.map(Self::declared) {
                Some(TypeExpr::Declared(t)) => TypeExpr::Declared(t),
                _ if i == 0 => source
                    .clone()
                    .map(|s| TypeExpr::ElementOf(Box::new(s)))
                    .unwrap_or(TypeExpr::Unknown),
                _ => TypeExpr::Unknown,
            };
            self.declare(name, ty);
        }

        let inner = Enclosing::StreamLambda(operator.to_string());
        let mut body = Vec::new();
        if let Some(body_node) = node.child_by_field_name("body") {
            self.visit(body_node, &inner, &mut body);
        }
        self.scopes.pop();

        out.push(BodyNode::StreamLambda {
            operator: operator.to_string(),
            location: range(node),
            body,
        });
    }

    /// `Order::getItems` 视为对元素调用 getter；`this::process` 视为对 this 的调用
    fn stream_method_ref(&mut self, node: Node, operator: &str, out: &mut Vec<BodyNode>) {
        let parts = named_children_of(node);
        let (Some(receiver), Some(method)) = (parts.first().copied(), parts.last().copied()) else {
            return;
        };
        if parts.len() < 2 || method.kind() != "identifier" {
            return;
        }

        let receiver_text = self.text(receiver);
        let unbound_type_ref = matches!(receiver.kind(), "type_identifier" | "generic_type" | "scoped_type_identifier")
            || (receiver.kind() == "identifier"
                && self.lookup(&receiver_text).is_none()
                && receiver_text.starts_with(|c: char| c.is_ascii_uppercase()));

        let (object, args) = if unbound_type_ref {
            (
                Expr::Local {
                    name: String::new(),
                    ty: TypeExpr::Declared(receiver_text),
                },
                0,
            )
        } else {
            (self.expr(receiver), 1)
        };

        let inner = Enclosing::StreamLambda(operator.to_string());
        let call = CallSite {
            method: self.text(method),
            object: Some(object),
            args,
            location: range(node),
            enclosing: inner,
        };
        out.push(BodyNode::StreamLambda {
            operator: operator.to_string(),
            location: range(node),
            body: vec![BodyNode::Call(call)],
        });
    }

    fn for_each(&mut self, node: Node, enclosing: &Enclosing, out: &mut Vec<BodyNode>) {
        let value = node.child_by_field_name("value");
        if let Some(v) = value {
            self.visit(v, enclosing, out);
        }

        let variable = node
            .child_by_field_name("name")
            .map(|n| self.text(n))
            .unwrap_or_default();
        let declared = node
            .child_by_field_name("type")
            .map(|t| Self::declared(self.text(t)))
            .unwrap_or(TypeExpr::Unknown);
        let ty = match declared {
            TypeExpr::Unknown => value
                .map(|v| TypeExpr::ElementOf(Box::new(self.expr(v))))
                .unwrap_or(TypeExpr::Unknown),
            known => known,
        };

        self.scopes.push(HashMap::new());
        self.declare(variable.clone(), ty);
        let mut body = Vec::new();
        if let Some(body_node) = node.child_by_field_name("body") {
            self.visit(body_node, &Enclosing::ForEach, &mut body);
        }
        self.scopes.pop();

        // 位置只覆盖循环头
        let header_end = node
            .child_by_field_name("body")
            .map(|b| b.start_byte())
            .unwrap_or_else(|| node.end_byte());
        out.push(BodyNode::ForEach {
            variable,
            location: TextRange {
                start: node.start_byte(),
                len: header_end.saturating_sub(node.start_byte()),
                line: node.start_position().row + 1,
            },
            body,
        });
    }

    /// 浅层表达式
    fn expr(&self, node: Node) -> Expr {
        match node.kind() {
            "this" => Expr::This,
            "super" => Expr::Super,
            "identifier" => {
                let name = self.text(node);
                match self.lookup(&name) {
                    Some(ty) => Expr::Local { name, ty: ty.clone() },
                    None => Expr::Name(name),
                }
            }
            "field_access" => {
                let object = node
                    .child_by_field_name("object")
                    .map(|o| self.expr(o))
                    .unwrap_or(Expr::Other);
                let name = node
                    .child_by_field_name("field")
                    .map(|f| self.text(f))
                    .unwrap_or_default();
                Expr::Field { object: Box::new(object), name }
            }
            "method_invocation" => Expr::Call {
                object: node.child_by_field_name("object").map(|o| Box::new(self.expr(o))),
                method: node
                    .child_by_field_name("name")
                    .map(|n| self.text(n))
                    .unwrap_or_default(),
                args: node
                    .child_by_field_name("arguments")
                    .map(|a| named_children_of(a).len())
                    .unwrap_or(0),
            },
            "parenthesized_expression" => named_children_of(node)
                .into_iter()
                .next()
                .map(|inner| self.expr(inner))
                .unwrap_or(Expr::Other),
            // `new Ledger().post()`：接收者类型即被构造的类型
            "object_creation_expression" | "cast_expression" => match node.child_by_field_name("type") {
                Some(t) => Expr::Local {
                    name: String::new(),
                    ty: TypeExpr::Declared(self.text(t)),
                },
                None => Expr::Other,
            },
            _ => Expr::Other,
        }
    }
}
