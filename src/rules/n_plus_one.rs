//! N_PLUS_ONE - 循环 / 流操作中访问懒加载关联
//!
//! 只检查带事务的方法 (方法级或类级)。每个懒加载访问报告一次，
//! 归属到包住它的最内层 (已启用的) foreach 循环或 map / flatMap / forEach / filter lambda。

use super::{describe, Rule, RuleContext};
use crate::annotation;
use crate::config::Config;
use crate::error::AnalysisError;
use crate::report::{Problem, Severity};
use crate::scanner::tree_sitter_java::STREAM_OPERATORS;
use crate::symbol_table::{BodyNode, FieldRef, MethodSymbol, TextRange};

pub const ID: &str = "N_PLUS_ONE";

pub struct NPlusOne;

/// 懒加载访问所在的迭代结构
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Construct<'a> {
    Loop,
    Stream(&'a str),
}

impl Construct<'_> {
    fn describe(&self) -> String {
        match self {
            Construct::Loop => "loop".to_string(),
            Construct::Stream(op) => format!("stream '{op}'"),
        }
    }
}

struct Scan<'r, 'a> {
    ctx: &'r RuleContext<'a>,
    method: &'a MethodSymbol,
    problems: Vec<Problem>,
}

impl<'r, 'a> Scan<'r, 'a> {
    fn nodes(&mut self, nodes: &'a [BodyNode], construct: Option<Construct<'a>>) -> Result<(), AnalysisError> {
        let config = self.ctx.config;
        for node in nodes {
            match node {
                BodyNode::ForEach { body, .. } => {
                    self.ctx.checkpoint()?;
                    let inner = if config.n1_in_loops { Some(Construct::Loop) } else { construct };
                    self.nodes(body, inner)?;
                }
                BodyNode::StreamLambda { operator, body, .. } => {
                    self.ctx.checkpoint()?;
                    let tracked = config.n1_in_streams && STREAM_OPERATORS.contains(&operator.as_str());
                    let inner = if tracked { Some(Construct::Stream(operator.as_str())) } else { construct };
                    self.nodes(body, inner)?;
                }
                BodyNode::Access(access) => {
                    let Some(construct) = construct else { continue };
                    if let Some(field) = self.ctx.classifiers.lazy_access(self.method, &access.expr) {
                        self.report(field, construct, access.location);
                    }
                }
                BodyNode::Call(call) => {
                    let Some(construct) = construct else { continue };
                    self.ctx.checkpoint()?;
                    if let Some(field) = self.ctx.classifiers.lazy_getter(self.method, call) {
                        self.report(field, construct, call.location);
                    }
                }
            }
        }
        Ok(())
    }

    fn report(&mut self, field: FieldRef<'a>, construct: Construct<'a>, location: TextRange) {
        let message = format!(
            "Lazy relationship {}.{} accessed inside {} in {}; each iteration triggers a separate query (N+1)",
            field.owner.name,
            field.field.name,
            construct.describe(),
            describe(self.method)
        );
        self.problems.push(self.ctx.problem(ID, Severity::Warning, location, message));
    }
}

impl Rule for NPlusOne {
    fn id(&self) -> &'static str {
        ID
    }

    fn is_enabled(&self, config: &Config) -> bool {
        config.n1_detection && (config.n1_in_loops || config.n1_in_streams)
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Problem>, AnalysisError> {
        let mut problems = Vec::new();

        for method in ctx.methods() {
            if !annotation::is_transactional(ctx.model, method) {
                continue;
            }
            let mut scan = Scan { ctx, method, problems: Vec::new() };
            scan.nodes(&method.body, None)?;
            problems.append(&mut scan.problems);
        }

        Ok(problems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{run_rule, run_rule_with};

    const DOMAIN: [(&str, &str); 2] = [
        (
            "Order.java",
            r#"
            package com.shop;
            import jakarta.persistence.*;
            import java.util.List;
            @Entity
            public class Order {
                @OneToMany(mappedBy = "order") private List<Line> lines;
                @ManyToOne private Customer customer;
                private String code;
                public List<Line> getLines() { return lines; }
            }
            "#,
        ),
        (
            "Line.java",
            r#"
            package com.shop;
            public class Line { private String sku; }
            "#,
        ),
    ];

    fn service(body: &str, class_annotation: &str) -> String {
        format!(
            r#"
            package com.shop;
            import java.util.List;
            import org.springframework.transaction.annotation.Transactional;
            {class_annotation}
            public class OrderService {{
                {body}
            }}
            "#
        )
    }

    fn run(src: &str, config: &Config) -> Vec<Problem> {
        let files = [("OrderService.java", src), DOMAIN[0], DOMAIN[1]];
        run_rule_with(&NPlusOne, config, &files)
    }

    #[test]
    fn test_loop_and_stream_access() {
        let src = service(
            r#"
            @Transactional
            public void totals(List<Order> orders) {
                for (Order order : orders) {
                    order.getLines().size();
                    order.getCode();
                }
                orders.stream().map(o -> o.getLines()).count();
                orders.stream().map(Order::getLines).count();
                orders.stream().sorted().count();
            }
            "#,
            "",
        );
        let problems = run(&src, &Config::default());
        let where_: Vec<String> = problems
            .iter()
            .map(|p| p.message.split(" inside ").nth(1).unwrap_or("").split(" in ").next().unwrap_or("").to_string())
            .collect();
        assert_eq!(where_, vec!["loop", "stream 'map'", "stream 'map'"]);
        assert!(problems.iter().all(|p| p.message.contains("Order.lines")));
    }

    #[test]
    fn test_innermost_construct_wins_and_toggles() {
        let src = service(
            r#"
            public void totals(List<Order> orders) {
                for (Order order : orders) {
                    orders.forEach(o -> o.getLines().size());
                }
            }
            "#,
            "@Transactional",
        );
        let problems = run(&src, &Config::default());
        assert_eq!(problems.len(), 1);
        assert!(problems[0].message.contains("stream 'forEach'"));

        let loops_only = Config { n1_in_streams: false, ..Config::default() };
        let problems = run(&src, &loops_only);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].message.contains("inside loop"));

        let neither = Config { n1_in_streams: false, n1_in_loops: false, ..Config::default() };
        assert!(!NPlusOne.is_enabled(&neither));
    }

    #[test]
    fn test_non_transactional_method_ignored() {
        let src = service(
            r#"
            public void totals(List<Order> orders) {
                for (Order order : orders) { order.getLines(); }
            }
            "#,
            "",
        );
        let files = [("OrderService.java", src.as_str()), DOMAIN[0], DOMAIN[1]];
        assert!(run_rule(&NPlusOne, &files).is_empty());
    }
}
