use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// File extensions recognised as paths when they appear in an issue.
const PATH_EXTENSIONS: [&str; 17] = [
    "md", "mdx", "markdown", "txt", "rst", "adoc", "rs", "py", "js", "ts", "go", "java", "toml",
    "yaml", "yml", "json", "ipynb",
];

/// Well-known documents that issues name without an extension.
const BARE_DOCUMENTS: [(&str, &str); 3] = [
    ("readme", "README.md"),
    ("changelog", "CHANGELOG.md"),
    ("contributing", "CONTRIBUTING.md"),
];

static WANTS_EVERYTHING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(all|entire|whole|everything in the)\s+(the\s+)?(docs|documentation|repository|repo)\b",
    )
    .expect("scope pattern is valid")
});

static BARE_DOCUMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(readme|changelog|contributing)\b").expect("document pattern is valid")
});

static PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\./)?(?:[\w.-]+/)*[\w-][\w.-]*\.([A-Za-z][A-Za-z0-9]*)$")
        .expect("path pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
}

impl RepositoryRef {
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Which files a request is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    All,
    Paths(BTreeSet<String>),
}

impl Scope {
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        let paths = match self {
            Scope::All => None,
            Scope::Paths(paths) => Some(paths.iter().map(String::as_str)),
        };
        paths.into_iter().flatten()
    }
}

/// A parsed documentation request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentationRequest {
    pub source_event_id: String,
    pub repository: RepositoryRef,
    pub issue_number: u64,
    pub requested_scope: Scope,
    pub raw_instruction: String,
}

impl DocumentationRequest {
    /// Build a request from an issue's title and body.
    pub fn parse(
        source_event_id: String,
        repository: RepositoryRef,
        issue_number: u64,
        marker: &str,
        title: &str,
        body: &str,
    ) -> Self {
        let instruction_title = title.replace(marker, "");
        let instruction_title = instruction_title.trim();
        let body = body.trim();

        let raw_instruction = if body.is_empty() {
            instruction_title.to_string()
        } else {
            format!("{instruction_title}\n\n{body}")
        };

        let requested_scope = extract_scope(&format!("{instruction_title}\n{body}"));

        Self {
            source_event_id,
            repository,
            issue_number,
            requested_scope,
            raw_instruction,
        }
    }
}

/// Work out the requested scope from free text.
pub fn extract_scope(text: &str) -> Scope {
    if WANTS_EVERYTHING_RE.is_match(text) {
        return Scope::All;
    }

    let mut paths: BTreeSet<String> = text
        .split(|c: char| c.is_whitespace() || c == ',')
        .map(|token| {
            token
                .trim_start_matches(|c: char| "`'\"([<{*".contains(c))
                .trim_end_matches(|c: char| "`'\")]>}.:;!?*".contains(c))
        })
        .filter(|token| is_path(token))
        .map(|token| token.trim_start_matches("./").to_string())
        .collect();

    let named: BTreeSet<String> = BARE_DOCUMENT_RE
        .captures_iter(text)
        .map(|cap| cap[1].to_lowercase())
        .collect();
    for (word, document) in BARE_DOCUMENTS {
        let named = named.contains(word);
        let already_listed = paths
            .iter()
            .any(|p| p.rsplit('/').next().unwrap_or(p).to_lowercase().starts_with(word));
        if named && !already_listed {
            paths.insert(document.to_string());
        }
    }

    if paths.is_empty() {
        Scope::All
    } else {
        Scope::Paths(paths)
    }
}

fn is_path(token: &str) -> bool {
    if token.is_empty() || token.contains("://") || token.starts_with('#') {
        return false;
    }
    PATH_RE
        .captures(token)
        .map(|cap| PATH_EXTENSIONS.contains(&cap[1].to_lowercase().as_str()))
        .unwrap_or(false)
}
