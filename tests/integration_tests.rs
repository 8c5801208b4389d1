// ============================================================================
// Integration Tests - Full Project Analysis
// ============================================================================
//
// These tests build a small Spring project on disk and verify that:
// 1. Rules see symbols across files and packages (repository, entity, service)
// 2. The report is deterministic across runs
// 3. Config discovery, `--rule` filtering and `--fail-on` thresholds behave
// 4. Unreadable files are skipped and counted instead of failing the run

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use tx_lint::cli::{exit_code, load_config, render_report, FailOn, Format, EXIT_FINDINGS, EXIT_OK};
use tx_lint::config::Config;
use tx_lint::engine::{analyze_path, CancellationToken};
use tx_lint::error::ConfigError;

mod common {
    use super::*;

    pub const ORDER: &str = r#"
package com.shop.domain;

import jakarta.persistence.*;
import java.util.List;

@Entity
public class Order {
    @OneToMany(mappedBy = "order")
    private List<OrderLine> lines;

    public List<OrderLine> getLines() { return lines; }
}
"#;

    pub const ORDER_LINE: &str = r#"
package com.shop.domain;

public class OrderLine {
    private String sku;
}
"#;

    pub const REPOSITORY: &str = r#"
package com.shop.repository;

import org.springframework.data.jpa.repository.JpaRepository;
import com.shop.domain.Order;

public interface OrderRepository extends JpaRepository<Order, Long> {}
"#;

    pub const SERVICE: &str = r#"
package com.shop.service;

import java.util.List;
import org.springframework.transaction.annotation.Transactional;
import com.shop.domain.Order;
import com.shop.repository.OrderRepository;

public class OrderService {
    private OrderRepository orders;

    @Transactional(readOnly = true)
    public void summarize(List<Order> all, Order order) {
        orders.save(order);
        for (Order o : all) {
            o.getLines().size();
        }
    }

    @Transactional
    private void archive() {}
}
"#;

    /// 在临时目录下生成 Maven 布局的示例项目
    pub fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/main/java/com/shop/domain/Order.java", ORDER);
        write(dir.path(), "src/main/java/com/shop/domain/OrderLine.java", ORDER_LINE);
        write(dir.path(), "src/main/java/com/shop/repository/OrderRepository.java", REPOSITORY);
        write(dir.path(), "src/main/java/com/shop/service/OrderService.java", SERVICE);
        // build output must be ignored
        write(dir.path(), "target/generated/Ignored.java", SERVICE);
        dir
    }

    pub fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

fn rule_ids(report: &tx_lint::report::Report) -> Vec<&str> {
    report.problems.iter().map(|p| p.rule_id.as_str()).collect()
}

#[test]
fn test_cross_package_analysis() {
    let project = common::project();
    let report = analyze_path(project.path(), &Config::default(), &CancellationToken::new()).unwrap();

    assert_eq!(report.files_analyzed, 4);
    assert_eq!(report.files_skipped, 0);

    let ids = rule_ids(&report);
    assert!(ids.contains(&"READ_ONLY_WRITE"), "{ids:?}");
    assert!(ids.contains(&"N_PLUS_ONE"), "{ids:?}");
    assert!(ids.contains(&"INVALID_MODIFIER"), "{ids:?}");
    assert!(report.problems.iter().all(|p| p.file.ends_with("OrderService.java")));

    // INVALID_MODIFIER 是 Warning，不会达到默认阈值
    assert_eq!(exit_code(&report, FailOn::Error), EXIT_OK);
    assert_eq!(exit_code(&report, FailOn::Warning), EXIT_FINDINGS);
}

#[test]
fn test_report_is_deterministic() {
    let project = common::project();
    let first = analyze_path(project.path(), &Config::default(), &CancellationToken::new()).unwrap();
    let second = analyze_path(project.path(), &Config::default(), &CancellationToken::new()).unwrap();

    assert_eq!(first.problems, second.problems);
    assert_eq!(
        render_report(&first, Format::Json).unwrap(),
        render_report(&second, Format::Json).unwrap()
    );

    let json: serde_json::Value = serde_json::from_str(&render_report(&first, Format::Json).unwrap()).unwrap();
    assert_eq!(json["summary"]["filesAnalyzed"], 4);
    assert_eq!(json["problems"].as_array().map(Vec::len), Some(first.problems.len()));
}

#[test]
fn test_rule_filter_and_config_discovery() {
    let project = common::project();
    common::write(project.path(), ".tx-lint.yml", "n1Detection: false\n");

    let config = load_config(None, project.path(), &[]).unwrap();
    assert!(!config.n1_detection);
    let report = analyze_path(project.path(), &config, &CancellationToken::new()).unwrap();
    assert!(!rule_ids(&report).contains(&"N_PLUS_ONE"));

    let only = load_config(None, project.path(), &["INVALID_MODIFIER".to_string()]).unwrap();
    let report = analyze_path(project.path(), &only, &CancellationToken::new()).unwrap();
    assert_eq!(rule_ids(&report), vec!["INVALID_MODIFIER"]);
}

#[test]
fn test_config_errors() {
    let project = common::project();

    let err = load_config(None, project.path(), &["NO_SUCH_RULE".to_string()]).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownRule(_)));

    common::write(project.path(), "broken.yml", "n1Detection: [not, a, bool]\n");
    let err = load_config(Some(&project.path().join("broken.yml")), project.path(), &[]).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));

    let err = load_config(Some(&project.path().join("missing.yml")), project.path(), &[]).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_unreadable_file_is_skipped() {
    let project = common::project();
    let bad = project.path().join("src/main/java/com/shop/Bad.java");
    fs::write(&bad, [0xff, 0xfe, 0x00, 0xc3]).unwrap();

    let report = analyze_path(project.path(), &Config::default(), &CancellationToken::new()).unwrap();
    assert_eq!(report.files_analyzed, 4);
    assert_eq!(report.files_skipped, 1);
    assert!(report.render_text().contains("1 file(s) skipped"));
}

#[test]
fn test_single_file_and_cancellation() {
    let project = common::project();
    let file = project.path().join("src/main/java/com/shop/service/OrderService.java");

    let report = analyze_path(&file, &Config::default(), &CancellationToken::new()).unwrap();
    assert_eq!(report.files_analyzed, 1);
    assert!(rule_ids(&report).contains(&"INVALID_MODIFIER"));

    let cancel = CancellationToken::new();
    cancel.cancel();
    assert!(analyze_path(project.path(), &Config::default(), &cancel).is_err());
}
