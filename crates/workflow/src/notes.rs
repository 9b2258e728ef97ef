//! Markdown release notes for external release records.

use monorel_release::{CommitType, ReleaseItem, ScopedCommit};
use std::fmt::Write as _;

const SHORT_HASH_LEN: usize = 7;

/// Title of the external release for an item.
#[must_use]
pub fn release_title(item: &ReleaseItem) -> String {
    format!("{} v{}", item.package, item.next_version)
}

/// Render the notes for one release item.
///
/// Commits are projected onto the item's scope, so a multi-scope commit
/// only contributes its own section of the message.
#[must_use]
pub fn render(item: &ReleaseItem) -> String {
    let mut breaking = Vec::new();
    let mut features = Vec::new();
    let mut fixes = Vec::new();
    let mut dependencies = Vec::new();
    let mut other = Vec::new();

    for commit in &item.commits {
        let scoped = commit.for_scope(&item.scope);
        let line = entry(&scoped);
        if commit.is_cascade() {
            dependencies.push(line);
            continue;
        }
        if scoped.breaking {
            breaking.push(line.clone());
        }
        match scoped.commit_type {
            CommitType::Feat => features.push(line),
            CommitType::Fix | CommitType::Perf => fixes.push(line),
            _ => other.push(line),
        }
    }

    let mut notes = String::new();
    section(&mut notes, "Breaking Changes", &breaking);
    section(&mut notes, "Features", &features);
    section(&mut notes, "Bug Fixes", &fixes);
    section(&mut notes, "Dependencies", &dependencies);
    section(&mut notes, "Other", &other);

    if notes.is_empty() {
        notes.push_str("No notable changes.\n");
    }
    notes
}

fn entry(commit: &ScopedCommit) -> String {
    let short: String = commit.hash.chars().take(SHORT_HASH_LEN).collect();
    if short.is_empty() {
        commit.description.clone()
    } else {
        format!("{} ({short})", commit.description)
    }
}

fn section(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "### {title}\n");
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
    out.push('\n');
}
