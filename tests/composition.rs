//! Composition tests: import resolution across files on disk

use std::fs;
use std::path::{Path, PathBuf};

use groom::{Composer, Config, FlavorKind, TemplateError};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;

/// A directory of template files
struct Site {
    dir: TempDir,
}

impl Site {
    fn new(files: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        for (name, text) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("mkdir");
            }
            fs::write(path, text).expect("write");
        }
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn compose(&self, composer: &Composer, root: &str) -> Result<groom::TemplateSet, TemplateError> {
        let path = self.path(root);
        let text = fs::read_to_string(&path).expect("root exists");
        let name = Path::new(root)
            .file_stem()
            .and_then(|s| s.to_str())
            .expect("root name");
        composer.compose(name, &path, &text)
    }

    fn render(&self, root: &str, data: Value) -> Result<String, TemplateError> {
        let composer = Composer::default();
        let set = self.compose(&composer, root)?;
        let name = Path::new(root).file_stem().and_then(|s| s.to_str()).expect("root name");
        composer.render(&set, name, &data)
    }
}

#[test]
fn test_greet_import() {
    let site = Site::new(&[
        ("root.grm", r#"{{import "greet"}}"#),
        ("greet.grm", "Hello"),
    ]);
    assert_eq!(site.render("root.grm", json!(null)).unwrap(), "Hello");
}

#[test]
fn test_import_with_alias_and_data() {
    let site = Site::new(&[
        ("root.grm", r#"{{import hi "./greet" .user}}!"#),
        ("greet.grm", "Hello, {{.name}}"),
    ]);
    let composer = Composer::default();
    let set = site.compose(&composer, "root.grm").unwrap();
    assert!(set.contains("hi"));
    assert!(!set.contains("greet"));
    assert_eq!(
        composer.render(&set, "root", &json!({"user": {"name": "Ann"}})).unwrap(),
        "Hello, Ann!"
    );
}

#[test]
fn test_template_spelling_is_an_import() {
    let site = Site::new(&[
        ("root.grm", r#"{{template "import \"greet\""}}"#),
        ("greet.grm", "Hello"),
    ]);
    assert_eq!(site.render("root.grm", json!(null)).unwrap(), "Hello");
}

#[test]
fn test_no_imports_matches_direct_evaluation() {
    let text = "{{range .}}<{{.}}>{{end}}";
    let site = Site::new(&[("plain.grm", text)]);
    let composed = site.render("plain.grm", json!([1, 2])).unwrap();

    let composer = Composer::default();
    let set = composer
        .compose("direct", Path::new("/nowhere/direct.grm"), text)
        .unwrap();
    let direct = composer.render(&set, "direct", &json!([1, 2])).unwrap();
    assert_eq!(composed, direct);
    assert_eq!(composed, "<1><2>");
}

#[test]
fn test_same_file_imported_twice_merges_once() {
    let site = Site::new(&[
        ("root.grm", r#"{{import "c"}}{{import "c"}}"#),
        ("c.grm", "C"),
    ]);
    let composer = Composer::default();
    let set = site.compose(&composer, "root.grm").unwrap();
    assert_eq!(set.len(), 2);
    assert_eq!(composer.render(&set, "root", &json!(null)).unwrap(), "CC");
}

#[test]
fn test_diamond_through_different_relative_paths() {
    let site = Site::new(&[
        ("root.grm", r#"{{import "a/a"}}{{import "b/b"}}"#),
        ("a/a.grm", r#"a{{import "../lib/c"}}"#),
        ("b/b.grm", r#"b{{import "./../lib/./c"}}"#),
        ("lib/c.grm", "c"),
    ]);
    let composer = Composer::default();
    let set = site.compose(&composer, "root.grm").unwrap();
    assert_eq!(set.names().collect::<Vec<_>>(), vec!["a", "b", "c", "root"]);
    assert_eq!(set.source("c"), Some(site.path("lib/c.grm").as_path()));
    assert_eq!(composer.render(&set, "root", &json!(null)).unwrap(), "acbc");
}

#[test]
fn test_same_name_from_two_paths_is_duplicate() {
    let site = Site::new(&[
        ("root.grm", r#"{{import "x/c"}}{{import "y/c"}}"#),
        ("x/c.grm", "one"),
        ("y/c.grm", "two"),
    ]);
    let err = site.render("root.grm", json!(null)).unwrap_err();
    match err {
        TemplateError::DuplicateName {
            name,
            existing,
            conflicting,
        } => {
            assert_eq!(name, "c");
            assert_eq!(existing, site.path("x/c.grm"));
            assert_eq!(conflicting, site.path("y/c.grm"));
        }
        other => panic!("expected duplicate name, got {other}"),
    }
}

#[test]
fn test_name_bound_by_nested_import_first_is_duplicate() {
    let site = Site::new(&[
        ("root.grm", r#"{{import "a"}}{{import "x/c"}}"#),
        ("a.grm", r#"{{import "y/c"}}"#),
        ("x/c.grm", "one"),
        ("y/c.grm", "two"),
    ]);
    let err = site.render("root.grm", json!(null)).unwrap_err();
    match err {
        TemplateError::DuplicateName {
            name,
            existing,
            conflicting,
        } => {
            assert_eq!(name, "c");
            assert_eq!(existing, site.path("y/c.grm"));
            assert_eq!(conflicting, site.path("x/c.grm"));
        }
        other => panic!("expected duplicate name, got {other}"),
    }
}

#[test]
fn test_define_clashing_with_import_is_duplicate() {
    let site = Site::new(&[
        ("root.grm", r#"{{import "a"}}{{import "b"}}"#),
        ("a.grm", r#"{{define "shared"}}A{{end}}"#),
        ("b.grm", r#"{{define "shared"}}B{{end}}"#),
    ]);
    let err = site.render("root.grm", json!(null)).unwrap_err();
    assert!(matches!(err, TemplateError::DuplicateName { ref name, .. } if name == "shared"));
}

#[test]
fn test_self_import_hits_recursion_limit() {
    let site = Site::new(&[("self.grm", r#"{{import "self"}}"#)]);
    let err = site.render("self.grm", json!(null)).unwrap_err();
    assert!(matches!(err, TemplateError::RecursionLimit { limit: 1000, .. }));
}

#[test]
fn test_mutual_import_hits_recursion_limit() {
    let site = Site::new(&[
        ("a.grm", r#"{{import "b"}}"#),
        ("b.grm", r#"{{import "a"}}"#),
    ]);
    let composer = Composer::new(Config::default().with_max_import_depth(20));
    let err = site.compose(&composer, "a.grm").unwrap_err();
    assert!(matches!(err, TemplateError::RecursionLimit { limit: 20, .. }));
}

#[test]
fn test_long_chain_under_limit_loads() {
    let mut files: Vec<(String, String)> = (0..30)
        .map(|i| (format!("n{i}.grm"), format!(r#"{i} {{{{import "n{}"}}}}"#, i + 1)))
        .collect();
    files.push(("n30.grm".to_string(), "end".to_string()));
    let refs: Vec<(&str, &str)> = files.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
    let site = Site::new(&refs);

    let composer = Composer::new(Config::default().with_max_import_depth(31));
    let set = site.compose(&composer, "n0.grm").expect("chain fits");
    assert_eq!(set.len(), 31);

    let composer = Composer::new(Config::default().with_max_import_depth(30));
    assert!(matches!(
        site.compose(&composer, "n0.grm"),
        Err(TemplateError::RecursionLimit { .. })
    ));
}

#[test]
fn test_nested_directives_resolve() {
    let site = Site::new(&[
        (
            "root.grm",
            r#"{{if .show}}{{range .items}}{{with .}}{{import "item" .}}{{end}}{{end}}{{else}}{{import "empty"}}{{end}}"#,
        ),
        ("item.grm", "[{{.}}]"),
        ("empty.grm", "none"),
    ]);
    assert_eq!(
        site.render("root.grm", json!({"show": true, "items": ["a", "b"]})).unwrap(),
        "[a][b]"
    );
    assert_eq!(site.render("root.grm", json!({"show": false})).unwrap(), "none");
}

#[test]
fn test_extension_applied_once() {
    let site = Site::new(&[
        ("root.grm", r#"{{import "a"}}{{import "b.grm"}}"#),
        ("a.grm", "A"),
        ("b.grm", "B"),
    ]);
    assert_eq!(site.render("root.grm", json!(null)).unwrap(), "AB");
}

#[test]
fn test_configured_extension() {
    let site = Site::new(&[("root.tmpl", r#"{{import "part"}}"#), ("part.tmpl", "P")]);
    let composer = Composer::new(Config::default().with_extension("tmpl"));
    let set = site.compose(&composer, "root.tmpl").unwrap();
    assert_eq!(composer.render(&set, "root", &json!(null)).unwrap(), "P");
}

#[test]
fn test_imports_in_imported_defines() {
    let site = Site::new(&[
        ("root.grm", r#"{{import "layout"}}{{template "frame" "body"}}"#),
        ("layout.grm", r#"{{define "frame"}}<{{import "inner" .}}>{{end}}"#),
        ("inner.grm", "{{.}}"),
    ]);
    assert_eq!(site.render("root.grm", json!(null)).unwrap(), "<body>");
}

#[test]
fn test_missing_import_file() {
    let site = Site::new(&[("root.grm", r#"{{import "missing"}}"#)]);
    let err = site.render("root.grm", json!(null)).unwrap_err();
    assert!(matches!(err, TemplateError::SourceUnavailable { ref path, .. } if *path == site.path("missing.grm")));
}

#[test]
fn test_syntax_error_in_import_reports_file() {
    let site = Site::new(&[("root.grm", r#"{{import "bad"}}"#), ("bad.grm", "ok {{range}}")]);
    let err = site.render("root.grm", json!(null)).unwrap_err();
    assert!(matches!(err, TemplateError::Syntax { .. }));
    assert!(err.report().contains("bad.grm"));
}

#[test]
fn test_deeply_nested_import_is_syntax_error() {
    let levels = 2000;
    let deep = format!("{}x{}", "{{if .}}".repeat(levels), "{{end}}".repeat(levels));
    let site = Site::new(&[("root.grm", r#"{{import "deep"}}"#), ("deep.grm", &deep)]);
    let err = site.render("root.grm", json!(true)).unwrap_err();
    assert!(matches!(err, TemplateError::Syntax { ref path, .. } if *path == site.path("deep.grm")));
    assert!(err.to_string().contains("nesting exceeds"));
}

#[test]
fn test_malformed_reference() {
    let site = Site::new(&[("root.grm", r#"{{template "import a b c"}}"#)]);
    let err = site.render("root.grm", json!(null)).unwrap_err();
    assert!(matches!(err, TemplateError::MalformedImport { ref reference, .. } if reference == "import a b c"));
}

#[test]
fn test_html_flavor_escapes_imported_output() {
    let site = Site::new(&[
        ("page.grm", r#"<h1>{{.title}}</h1>{{import "body" .}}"#),
        ("body.grm", "<p>{{.text}}</p>"),
    ]);
    let composer = Composer::new(Config::default().with_flavor(FlavorKind::Html));
    let set = site.compose(&composer, "page.grm").unwrap();
    let out = composer
        .render(&set, "page", &json!({"title": "A & B", "text": "<em>"}))
        .unwrap();
    assert_eq!(out, "<h1>A &amp; B</h1><p>&lt;em&gt;</p>");
}

#[test]
fn test_execution_error_keeps_partial_output() {
    let site = Site::new(&[("root.grm", "start {{.missing}} end")]);
    let composer = Composer::default();
    let set = site.compose(&composer, "root.grm").unwrap();
    let mut out = Vec::new();
    let err = composer
        .execute(&set, "root", &json!({}), &mut out)
        .unwrap_err();
    assert!(matches!(err, TemplateError::Evaluation { .. }));
    assert_eq!(out, b"start ");
}
