//! Deterministic conflict classification.
//!
//! Rules are applied in a fixed precedence order and the first match wins:
//!
//! 1. `WhitespaceOnly`: both sides equal once all whitespace is removed.
//! 2. `ImportOrdering`: every non-blank line on both sides is an import for
//!    the file's language.
//! 3. `LockfileRegen`: the file name is a known lock artifact.
//! 4. `DeletedVsModified`: one side has no content for the file.
//! 5. `SemanticOverlap`: any other parsed text region.
//! 6. `Unknown`: binary or unparseable regions.
//!
//! The result depends only on the hunk and the configured lockfile names.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::{ConflictCategory, ConflictHunk, ConflictRegion, HunkOrigin};

/// Source language, as far as import syntax is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportLanguage {
    Rust,
    Python,
    JavaScript,
    Go,
    Jvm,
    CFamily,
    Ruby,
    Php,
    CSharp,
    Swift,
}

impl ImportLanguage {
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = path.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase())?;
        Some(match ext.as_str() {
            "rs" => ImportLanguage::Rust,
            "py" | "pyi" => ImportLanguage::Python,
            "js" | "jsx" | "mjs" | "cjs" | "ts" | "tsx" | "mts" | "cts" => {
                ImportLanguage::JavaScript
            }
            "go" => ImportLanguage::Go,
            "java" | "kt" | "kts" | "scala" => ImportLanguage::Jvm,
            "c" | "h" | "cc" | "cpp" | "cxx" | "hpp" | "hh" | "hxx" | "m" | "mm" => {
                ImportLanguage::CFamily
            }
            "rb" => ImportLanguage::Ruby,
            "php" => ImportLanguage::Php,
            "cs" => ImportLanguage::CSharp,
            "swift" => ImportLanguage::Swift,
            _ => return None,
        })
    }

    fn statement_patterns(self) -> &'static [Regex] {
        match self {
            ImportLanguage::Rust => RUST.as_slice(),
            ImportLanguage::Python => PYTHON.as_slice(),
            ImportLanguage::JavaScript => JAVASCRIPT.as_slice(),
            ImportLanguage::Go => GO.as_slice(),
            ImportLanguage::Jvm => JVM.as_slice(),
            ImportLanguage::CFamily => C_FAMILY.as_slice(),
            ImportLanguage::Ruby => RUBY.as_slice(),
            ImportLanguage::Php => PHP.as_slice(),
            ImportLanguage::CSharp => CSHARP.as_slice(),
            ImportLanguage::Swift => SWIFT.as_slice(),
        }
    }
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("invalid import pattern"))
        .collect()
}

static RUST: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"^(pub(\([\w:\s]+\))?\s+)?use\s+.+;$",
        r"^(pub(\([\w:\s]+\))?\s+)?use\s+[\w:]+::\{[^}]*$",
        r"^extern\s+crate\s+\w+(\s+as\s+\w+)?;$",
    ])
});

static PYTHON: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"^import\s+[\w.]+(\s+as\s+\w+)?(\s*,\s*[\w.]+(\s+as\s+\w+)?)*$",
        r"^from\s+[.\w]+\s+import\s+.+$",
    ])
});

static JAVASCRIPT: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r#"^import\s+(type\s+)?.+\s+from\s+['"][^'"]+['"];?$"#,
        r#"^import\s+['"][^'"]+['"];?$"#,
        r"^import\s+(type\s+)?\{[^}]*$",
        r#"^(const|let|var)\s+[\w${}\s,:]+=\s*require\(\s*['"][^'"]+['"]\s*\)(\.[\w$]+)?;?$"#,
        r#"^export\s+(type\s+)?(\*(\s+as\s+\w+)?|\{[^}]*\})\s+from\s+['"][^'"]+['"];?$"#,
    ])
});

static GO: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r#"^import\s+([\w.]+\s+)?"[^"]+"$"#,
        r"^import\s*\($",
        r#"^([\w.]+\s+)?"[^"]+"$"#,
    ])
});

static JVM: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[r"^import\s+(static\s+)?[\w.]+(\.\*|\._|\.\{[^}]*\})?(\s+as\s+\w+)?;?$"])
});

static C_FAMILY: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r#"^#\s*(include|import)\s*[<"][^>"]+[>"]$"#,
        r#"^import\s+[\w.:<>"]+;$"#,
        r"^using\s+namespace\s+[\w:]+;$",
    ])
});

static RUBY: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[r#"^(require|require_relative|load)\s*\(?\s*['"][^'"]+['"]\s*\)?$"#])
});

static PHP: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"^use\s+(function\s+|const\s+)?[\w\\]+(\s+as\s+\w+)?(\s*,\s*[\w\\]+(\s+as\s+\w+)?)*;$",
        r"^(require|require_once|include|include_once)\s*\(?.+\)?\s*;$",
    ])
});

static CSHARP: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[r"^(global\s+)?using\s+(static\s+)?(\w+\s*=\s*)?[\w.]+;$"])
});

static SWIFT: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"^(@testable\s+)?import\s+((class|struct|enum|protocol|func|var|let|typealias)\s+)?[\w.]+$",
    ])
});

/// Lines inside a brace or paren import group (`use a::{`, `import {`, `import (`).
static GROUP_CONTINUATION: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"^[\w:.*$\\]+(\s+as\s+[\w$]+)?,?$",
        r"^[\w:]+::\{[^}]*\},?$",
        r#"^\}\s*(from\s+['"][^'"]+['"])?\s*;?$"#,
        r"^\}\s*;$",
        r"^\)$",
    ])
});

/// Whether every non-blank line of `side` is an import statement.
///
/// Group continuation lines only count when the same side opens the group,
/// so a hunk made of bare identifiers is never mistaken for imports.
pub fn is_import_block(language: ImportLanguage, side: &str) -> bool {
    let patterns = language.statement_patterns();
    let mut opens_group = false;
    let mut pending_continuations = false;
    for line in side.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if patterns.iter().any(|p| p.is_match(line)) {
            if line.ends_with('{') || line.ends_with('(') {
                opens_group = true;
            }
            continue;
        }
        if GROUP_CONTINUATION.iter().any(|p| p.is_match(line)) {
            pending_continuations = true;
            continue;
        }
        return false;
    }
    !pending_continuations || opens_group
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn has_content(s: &str) -> bool {
    s.lines().any(|l| !l.trim().is_empty())
}

/// Classifies raw hunks into [`ConflictRegion`]s.
#[derive(Debug, Clone)]
pub struct ConflictClassifier {
    lockfile_names: Vec<String>,
}

impl ConflictClassifier {
    pub fn new(lockfile_names: Vec<String>) -> Self {
        Self { lockfile_names }
    }

    fn is_lockfile(&self, path: &str) -> bool {
        let name = path.rsplit('/').next().unwrap_or(path);
        self.lockfile_names.iter().any(|l| l == name)
    }

    /// Pure category decision for one hunk.
    pub fn categorize(&self, hunk: &ConflictHunk) -> ConflictCategory {
        if hunk.origin == HunkOrigin::Markers {
            if let (Some(ours), Some(theirs)) = (&hunk.ours, &hunk.theirs) {
                if strip_whitespace(ours) == strip_whitespace(theirs) {
                    return ConflictCategory::WhitespaceOnly;
                }
                if let Some(language) = ImportLanguage::from_path(&hunk.path) {
                    if (has_content(ours) || has_content(theirs))
                        && is_import_block(language, ours)
                        && is_import_block(language, theirs)
                    {
                        return ConflictCategory::ImportOrdering;
                    }
                }
            }
        }
        if self.is_lockfile(&hunk.path) {
            return ConflictCategory::LockfileRegen;
        }
        match (&hunk.ours, &hunk.theirs) {
            (None, Some(_)) | (Some(_), None) => ConflictCategory::DeletedVsModified,
            (Some(_), Some(_)) if hunk.origin == HunkOrigin::Markers => {
                ConflictCategory::SemanticOverlap
            }
            _ => ConflictCategory::Unknown,
        }
    }

    /// Assign the category once; the region is immutable afterwards.
    pub fn classify(&self, hunk: ConflictHunk) -> ConflictRegion {
        let category = self.categorize(&hunk);
        ConflictRegion::classified(hunk, category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GateConfig;

    fn classifier() -> ConflictClassifier {
        ConflictClassifier::new(GateConfig::default().lockfile_names)
    }

    fn markers(path: &str, ours: &str, theirs: &str) -> ConflictHunk {
        ConflictHunk {
            path: path.into(),
            ours: Some(ours.into()),
            theirs: Some(theirs.into()),
            base: None,
            origin: HunkOrigin::Markers,
        }
    }

    #[test]
    fn test_whitespace_only() {
        let hunk = markers("src/a.rs", "let x = 1;\n", "let  x =\n    1;\n");
        assert_eq!(classifier().categorize(&hunk), ConflictCategory::WhitespaceOnly);
    }

    #[test]
    fn test_whitespace_precedes_lockfile() {
        let hunk = markers("Cargo.lock", "a = 1\n", "a=1\n");
        assert_eq!(classifier().categorize(&hunk), ConflictCategory::WhitespaceOnly);
    }

    #[test]
    fn test_rust_import_ordering() {
        let hunk = markers(
            "src/lib.rs",
            "use std::fs;\nuse std::io;\n",
            "use std::io;\nuse std::fs;\nuse std::path::Path;\n",
        );
        assert_eq!(classifier().categorize(&hunk), ConflictCategory::ImportOrdering);
    }

    #[test]
    fn test_import_patterns_per_language() {
        let cases = [
            ("app.py", "import os\nfrom typing import List\n", "from typing import Dict\nimport sys\n"),
            ("web/a.ts", "import { a } from './a';\n", "import b from \"b\";\nimport './side.css';\n"),
            ("main.go", "import \"fmt\"\n", "import (\n\t\"fmt\"\n\tlog \"github.com/x/log\"\n)\n"),
            ("A.java", "import java.util.List;\n", "import static org.junit.Assert.*;\n"),
            ("a.c", "#include <stdio.h>\n", "#include \"local.h\"\n"),
            ("a.rb", "require 'json'\n", "require_relative \"lib/x\"\n"),
            ("a.php", "use App\\Models\\User;\n", "require_once 'vendor/autoload.php';\n"),
            ("A.cs", "using System;\n", "using static System.Math;\n"),
            ("A.swift", "import Foundation\n", "@testable import App\n"),
            ("a.js", "const fs = require('fs');\n", "const { join } = require(\"path\");\n"),
        ];
        for (path, ours, theirs) in cases {
            assert_eq!(
                classifier().categorize(&markers(path, ours, theirs)),
                ConflictCategory::ImportOrdering,
                "{path}"
            );
        }
    }

    #[test]
    fn test_brace_group_needs_opening_line() {
        let grouped = markers(
            "src/lib.rs",
            "use std::{\n    fs,\n    io,\n};\n",
            "use std::{\n    io,\n};\n",
        );
        assert_eq!(classifier().categorize(&grouped), ConflictCategory::ImportOrdering);

        let bare = markers("src/lib.rs", "    fs,\n    io,\n", "    io,\n");
        assert_eq!(classifier().categorize(&bare), ConflictCategory::SemanticOverlap);
    }

    #[test]
    fn test_imports_mixed_with_code_are_semantic() {
        let hunk = markers("src/lib.rs", "use std::fs;\n", "use std::io;\nfn x() {}\n");
        assert_eq!(classifier().categorize(&hunk), ConflictCategory::SemanticOverlap);
    }

    #[test]
    fn test_unknown_language_imports_fall_through() {
        let hunk = markers("notes.txt", "import a\n", "import b\n");
        assert_eq!(classifier().categorize(&hunk), ConflictCategory::SemanticOverlap);
    }

    #[test]
    fn test_lockfile_by_name() {
        let hunk = markers("frontend/package-lock.json", "\"v\": \"1\"\n", "\"v\": \"2\"\n");
        assert_eq!(classifier().categorize(&hunk), ConflictCategory::LockfileRegen);
        let binary = ConflictHunk {
            path: "bun.lockb".into(),
            ours: None,
            theirs: None,
            base: None,
            origin: HunkOrigin::Unparsed,
        };
        assert_eq!(classifier().categorize(&binary), ConflictCategory::LockfileRegen);
    }

    #[test]
    fn test_deleted_vs_modified() {
        let hunk = ConflictHunk {
            path: "src/old.rs".into(),
            ours: None,
            theirs: Some("fn changed() {}\n".into()),
            base: None,
            origin: HunkOrigin::Deletion,
        };
        assert_eq!(classifier().categorize(&hunk), ConflictCategory::DeletedVsModified);
    }

    #[test]
    fn test_unparsed_is_unknown() {
        let hunk = ConflictHunk {
            path: "assets/logo.png".into(),
            ours: Some(String::new()),
            theirs: Some(String::new()),
            base: None,
            origin: HunkOrigin::Unparsed,
        };
        let region = classifier().classify(hunk);
        assert_eq!(region.category(), ConflictCategory::Unknown);
        assert!(!region.is_simple());
    }

    #[test]
    fn test_categorization_is_deterministic() {
        let hunk = markers("src/a.rs", "let a = compute(1);\n", "let a = compute(2);\n");
        let first = classifier().categorize(&hunk);
        for _ in 0..10 {
            assert_eq!(classifier().categorize(&hunk.clone()), first);
        }
        assert_eq!(first, ConflictCategory::SemanticOverlap);
    }
}
