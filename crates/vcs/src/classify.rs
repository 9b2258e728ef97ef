//! Conventional-commit classification.
//!
//! Parsing is delegated to `git-conventional`. On top of it this module
//! understands two monorepo conventions:
//!
//! - comma-separated scopes (`fix(core, cli): ...`) address several packages
//!   with one change;
//! - additional scoped headers in the body start per-scope sections, turning
//!   the commit into a multi-scope commit:
//!
//! ```text
//! chore: release parser work
//!
//! feat(core): streaming parser
//! Parses input incrementally.
//!
//! fix(cli)!: reject unknown flags
//! ```

use monorel_release::{Classification, CommitClassifier, CommitType, Error, Result, ScopeTarget};
use std::collections::BTreeMap;
use tracing::trace;

const BREAKING_FOOTERS: [&str; 2] = ["BREAKING CHANGE:", "BREAKING-CHANGE:"];

/// Classifier for conventional commit messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConventionalClassifier;

impl ConventionalClassifier {
    /// Create a classifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// A parsed header line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Header {
    commit_type: CommitType,
    scopes: Vec<String>,
    breaking: bool,
    description: String,
}

/// A scoped header in the body and the lines following it.
#[derive(Debug)]
struct Section {
    header: Header,
    lines: Vec<String>,
}

impl Section {
    fn breaking(&self) -> bool {
        self.header.breaking
            || self
                .lines
                .iter()
                .any(|l| BREAKING_FOOTERS.iter().any(|f| l.starts_with(f)))
    }

    fn text(&self) -> String {
        let mut text = self.header.description.clone();
        let body = self.lines.join("\n");
        let body = body.trim();
        if !body.is_empty() {
            text.push('\n');
            text.push_str(body);
        }
        text
    }
}

/// Split `type(a, b)!: desc` into `type(a)!: desc` and `["a", "b"]`.
///
/// `git-conventional` accepts a single scope, so the list is parsed here.
fn split_scopes(header: &str) -> (String, Vec<String>) {
    let Some(open) = header.find('(') else {
        return (header.to_string(), Vec::new());
    };
    if header[..open].contains(':') {
        return (header.to_string(), Vec::new());
    }
    let Some(close) = header[open..].find(')').map(|i| open + i) else {
        return (header.to_string(), Vec::new());
    };
    let scopes: Vec<String> = header[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    let normalized = match scopes.first() {
        Some(first) => format!("{}({first}){}", &header[..open], &header[close + 1..]),
        None => format!("{}{}", &header[..open], &header[close + 1..]),
    };
    (normalized, scopes)
}

/// Parse a message whose first line is a conventional header.
fn parse(message: &str) -> std::result::Result<Header, String> {
    let (first, rest) = message.split_once('\n').unwrap_or((message, ""));
    let (normalized, scopes) = split_scopes(first.trim());
    let text = if rest.is_empty() {
        normalized
    } else {
        format!("{normalized}\n{rest}")
    };
    let parsed = git_conventional::Commit::parse(&text).map_err(|e| e.to_string())?;
    Ok(Header {
        commit_type: CommitType::from(parsed.type_().to_string()),
        scopes,
        breaking: parsed.breaking(),
        description: parsed.description().to_string(),
    })
}

/// A body line that opens a per-scope section.
///
/// Only known types with at least one scope qualify, so prose such as
/// `Note: ...` stays body text.
fn scoped_header(line: &str) -> Option<Header> {
    let header = parse(line.trim()).ok()?;
    if header.scopes.is_empty() || matches!(header.commit_type, CommitType::Other(_)) {
        return None;
    }
    Some(header)
}

impl CommitClassifier for ConventionalClassifier {
    fn classify(&self, hash: &str, raw_message: &str) -> Result<Classification> {
        let message = raw_message.trim();
        let (first, body) = message.split_once('\n').unwrap_or((message, ""));

        let mut sections: Vec<Section> = Vec::new();
        let mut after_blank = true;
        for line in body.lines() {
            let trimmed = line.trim_end();
            if after_blank && let Some(header) = scoped_header(trimmed) {
                sections.push(Section {
                    header,
                    lines: Vec::new(),
                });
            } else if let Some(section) = sections.last_mut() {
                section.lines.push(trimmed.to_string());
            }
            after_blank = trimmed.trim().is_empty();
        }

        if sections.is_empty() {
            let header = parse(message).map_err(|e| Error::classification(hash, e))?;
            trace!(hash, commit_type = %header.commit_type, "Classified single-scope commit");
            return Ok(Classification::Single {
                commit_type: header.commit_type,
                scopes: header.scopes,
                breaking: header.breaking,
                message: header.description,
            });
        }

        // The subject header counts as a section when it is scoped.
        let subject = parse(first).map_err(|e| Error::classification(hash, e))?;
        if !subject.scopes.is_empty() {
            sections.insert(
                0,
                Section {
                    header: subject.clone(),
                    lines: Vec::new(),
                },
            );
        }

        let mut targets = Vec::new();
        let mut per_scope_sections = BTreeMap::new();
        for section in &sections {
            let breaking = section.breaking();
            let text = section.text();
            for scope in &section.header.scopes {
                if per_scope_sections.contains_key(scope) {
                    continue;
                }
                targets.push(ScopeTarget {
                    commit_type: section.header.commit_type.clone(),
                    scope: scope.clone(),
                    breaking,
                });
                per_scope_sections.insert(scope.clone(), text.clone());
            }
        }
        trace!(hash, targets = targets.len(), "Classified multi-scope commit");

        Ok(Classification::Multi {
            targets,
            message: subject.description,
            per_scope_sections,
        })
    }
}
