//! Test-file presence per language naming convention.

use std::path::Path;

use crate::collaborators::RepoPaths;
use crate::diff::FileDiff;
use crate::domain::{Dimension, ReviewFinding};

/// Extensions the reviewer treats as source code.
const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "jsx", "mjs", "cjs", "ts", "tsx", "go", "rb", "java", "kt", "php",
];

/// Files that conventionally carry no tests of their own.
const EXEMPT_FILE_NAMES: &[&str] = &[
    "main.rs", "build.rs", "mod.rs", "__init__.py", "__main__.py", "setup.py", "conftest.py",
    "manage.py", "index.js", "index.ts", "main.go", "doc.go",
];

fn split_path(path: &str) -> (&str, &str, &str) {
    let (dir, name) = match path.rsplit_once('/') {
        Some((d, n)) => (d, n),
        None => ("", path),
    };
    let (stem, ext) = name.rsplit_once('.').unwrap_or((name, ""));
    (dir, stem, ext)
}

fn join(dir: &str, rest: &str) -> String {
    if dir.is_empty() {
        rest.to_string()
    } else {
        format!("{dir}/{rest}")
    }
}

pub fn is_source_file(path: &str) -> bool {
    let (_, _, ext) = split_path(path);
    SOURCE_EXTENSIONS.contains(&ext)
}

/// Whether `path` is itself a test file.
pub fn is_test_path(path: &str) -> bool {
    let (_, stem, ext) = split_path(path);
    let in_test_dir = path
        .split('/')
        .any(|seg| matches!(seg, "tests" | "test" | "spec" | "__tests__" | "testdata"));
    in_test_dir
        || stem.starts_with("test_")
        || stem.ends_with("_test")
        || stem.ends_with("_spec")
        || stem.ends_with(".test")
        || stem.ends_with(".spec")
        || (matches!(ext, "java" | "kt" | "php") && (stem.ends_with("Test") || stem.ends_with("Tests")))
}

/// Whether `path` needs a corresponding test at all.
pub fn requires_test(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    is_source_file(path)
        && !is_test_path(path)
        && !EXEMPT_FILE_NAMES.contains(&name)
        && !name.ends_with(".d.ts")
        && !name.contains(".config.")
}

/// Candidate test paths for a source file, most conventional first.
pub fn expected_test_paths(path: &str) -> Vec<String> {
    let (dir, stem, ext) = split_path(path);
    match ext {
        "rs" => {
            // Crate root is whatever precedes the last `src` component.
            let parts: Vec<&str> = Path::new(dir)
                .components()
                .filter_map(|c| c.as_os_str().to_str())
                .collect();
            let root: String = match parts.iter().rposition(|p| *p == "src") {
                Some(idx) => parts[..idx].iter().map(|p| format!("{p}/")).collect(),
                None => String::new(),
            };
            vec![
                format!("{root}tests/{stem}.rs"),
                format!("{root}tests/{stem}_test.rs"),
            ]
        }
        "py" => {
            let sub = dir
                .strip_prefix("src/")
                .or_else(|| (dir == "src").then_some(""))
                .unwrap_or(dir);
            let mut out = vec![format!("tests/test_{stem}.py")];
            if !sub.is_empty() {
                out.push(format!("tests/{sub}/test_{stem}.py"));
            }
            out.push(join(dir, &format!("test_{stem}.py")));
            out
        }
        "js" | "jsx" | "mjs" | "cjs" | "ts" | "tsx" => vec![
            join(dir, &format!("{stem}.test.{ext}")),
            join(dir, &format!("{stem}.spec.{ext}")),
            join(dir, &format!("__tests__/{stem}.test.{ext}")),
        ],
        "go" => vec![join(dir, &format!("{stem}_test.go"))],
        "rb" => {
            let sub = ["app/", "lib/"]
                .iter()
                .find_map(|p| dir.strip_prefix(p))
                .or_else(|| matches!(dir, "app" | "lib").then_some(""))
                .unwrap_or(dir);
            vec![
                join(&join("spec", sub), &format!("{stem}_spec.rb")),
                join(&join("test", sub), &format!("{stem}_test.rb")),
            ]
        }
        "java" | "kt" => {
            let lang = if ext == "java" { "java" } else { "kotlin" };
            let main = format!("src/main/{lang}/");
            match path.find(&main) {
                Some(idx) => {
                    let prefix = &path[..idx];
                    let rel_dir = dir.get(idx + main.len()..).unwrap_or("");
                    let test_dir = join(&format!("{prefix}src/test/{lang}"), rel_dir);
                    vec![join(&test_dir, &format!("{stem}Test.{ext}"))]
                }
                None => vec![join(dir, &format!("{stem}Test.{ext}"))],
            }
        }
        "php" => {
            let sub = dir
                .strip_prefix("src/")
                .or_else(|| (dir == "src").then_some(""))
                .unwrap_or(dir);
            let mut out = vec![format!("tests/{stem}Test.php")];
            if !sub.is_empty() {
                out.push(format!("tests/{sub}/{stem}Test.php"));
            }
            out
        }
        _ => Vec::new(),
    }
}

fn has_inline_rust_tests(file: &FileDiff) -> bool {
    file.added_lines().any(|l| l.trim_start().starts_with("#[cfg(test)]"))
}

/// `ShouldFix` for every changed source file with no test on disk or in the change.
pub fn check(
    diff: &[FileDiff],
    changed_files: &[String],
    repo_paths: &dyn RepoPaths,
) -> Vec<ReviewFinding> {
    let mut findings = Vec::new();
    for file in diff {
        if file.is_deleted_file || !requires_test(&file.path) {
            continue;
        }
        if file.path.ends_with(".rs") && has_inline_rust_tests(file) {
            continue;
        }
        let candidates = expected_test_paths(&file.path);
        let Some(first) = candidates.first() else {
            continue;
        };
        let found = candidates
            .iter()
            .any(|c| changed_files.iter().any(|f| f == c) || repo_paths.exists(c));
        if !found {
            findings.push(
                ReviewFinding::should_fix(
                    Dimension::TestCoverage,
                    format!("No test found for {}; expected {first}", file.path),
                )
                .at(file.path.clone(), None),
            );
        }
    }
    findings
}
