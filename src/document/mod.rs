use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};
use regex::Regex;

static HEADING_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?m)^#\s+(.+)$").ok());

/// A file the model proposes to write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFile {
    pub path: String,
    pub content: String,
    pub title: String,
}

/// The documentation carried by the model's final answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentationOutput {
    pub files: Vec<DocumentFile>,
    pub summary: Option<String>,
}

impl DocumentationOutput {
    /// Parse a final answer.
    ///
    /// Every fenced block whose info string carries `path=<file>` becomes a
    /// [`DocumentFile`]; the prose around the blocks becomes the summary. A
    /// later block for the same path replaces an earlier one. A block that is
    /// never closed is a cut-off answer and yields no file.
    pub fn parse(answer: &str) -> Self {
        let mut files: Vec<DocumentFile> = Vec::new();
        let mut prose = String::new();
        // (path, content, closing fence present)
        let mut current: Option<(String, String, bool)> = None;
        let mut in_other_block = false;
        let mut in_heading = false;

        for (event, range) in Parser::new(answer).into_offset_iter() {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let path = match &kind {
                        CodeBlockKind::Fenced(info) => path_from_info(info),
                        CodeBlockKind::Indented => None,
                    };
                    match path {
                        Some(path) => {
                            let closed = fence_is_closed(&answer[range]);
                            current = Some((path, String::new(), closed));
                        }
                        None => in_other_block = true,
                    }
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((path, content, closed)) = current.take() {
                        if !closed {
                            tracing::warn!("Dropping {}: its code block is never closed", path);
                            in_other_block = false;
                            continue;
                        }
                        let title = extract_title(&content).unwrap_or_else(|| {
                            path.rsplit('/').next().unwrap_or("Untitled").to_string()
                        });
                        files.retain(|f| f.path != path);
                        files.push(DocumentFile {
                            path,
                            content,
                            title,
                        });
                    }
                    in_other_block = false;
                }
                Event::Start(Tag::Heading { .. }) => in_heading = true,
                Event::End(TagEnd::Heading(_)) => in_heading = false,
                Event::Text(text) | Event::Code(text) => match current.as_mut() {
                    Some((_, content, _)) => content.push_str(&text),
                    None if !in_other_block && !in_heading => prose.push_str(&text),
                    None => {}
                },
                Event::SoftBreak | Event::HardBreak => prose.push('\n'),
                Event::End(TagEnd::Paragraph) | Event::End(TagEnd::Item) => prose.push('\n'),
                _ => {}
            }
        }

        Self {
            files,
            summary: generate_summary(&prose),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Whether a fenced block's source ends with a fence at least as long as the
/// one that opened it.
fn fence_is_closed(block: &str) -> bool {
    let block = block.trim();
    let fence_char = match block.chars().next() {
        Some(c @ ('`' | '~')) => c,
        _ => return false,
    };
    let width = block.chars().take_while(|&c| c == fence_char).count();
    let Some((_, rest)) = block.split_once('\n') else {
        return false;
    };
    rest.lines()
        .last()
        .map(str::trim)
        .is_some_and(|last| last.len() >= width && last.chars().all(|c| c == fence_char))
}

/// Read `path=...` (or `file=...`) out of a fence info string.
fn path_from_info(info: &str) -> Option<String> {
    info.split_whitespace()
        .find_map(|part| {
            part.strip_prefix("path=")
                .or_else(|| part.strip_prefix("file="))
        })
        .map(|p| p.trim_matches(|c| c == '"' || c == '\''))
        .map(|p| p.trim_start_matches("./").to_string())
        .filter(|p| !p.is_empty() && !p.starts_with('/') && !p.split('/').any(|seg| seg == ".."))
}

/// Extract the title from a markdown document (first heading)
pub fn extract_title(content: &str) -> Option<String> {
    HEADING_RE
        .as_ref()?
        .captures(content)
        .map(|cap| cap[1].trim().to_string())
}

/// Summarise text: the first non-heading lines, capped at about 200 characters
pub fn generate_summary(content: &str) -> Option<String> {
    let mut summary = String::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        summary.push_str(line);
        summary.push(' ');

        if summary.chars().count() > 200 {
            summary = summary.chars().take(197).collect();
            summary.push_str("...");
            break;
        }
    }

    if summary.is_empty() {
        None
    } else {
        Some(summary.trim().to_string())
    }
}
