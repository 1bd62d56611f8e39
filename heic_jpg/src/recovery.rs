//! Remediation hints for failed items.
//!
//! Categories come from the failure text, so this is presentation only; the
//! orchestrator's retry decisions use [`ErrorKind`](crate::errors::ErrorKind).

use crate::item::{ConversionItem, ItemId, ItemStatus};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureCategory {
    Size,
    Corrupt,
    Memory,
    Unknown,
}

impl FailureCategory {
    pub fn from_message(message: &str) -> Self {
        if message.contains("too large") {
            FailureCategory::Size
        } else if message.contains("Invalid") || message.contains("corrupt") {
            FailureCategory::Corrupt
        } else if message.contains("memory") {
            FailureCategory::Memory
        } else {
            FailureCategory::Unknown
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestedAction {
    Retry,
    Remove,
    Info,
}

impl fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SuggestedAction::Retry => "retry",
            SuggestedAction::Remove => "remove",
            SuggestedAction::Info => "info",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub category: FailureCategory,
    pub title: &'static str,
    pub description: &'static str,
    pub action_label: &'static str,
    pub action: SuggestedAction,
    /// Failed items this suggestion applies to, in list order.
    pub item_ids: Vec<ItemId>,
}

fn template(category: FailureCategory) -> (&'static str, &'static str, &'static str, SuggestedAction) {
    match category {
        FailureCategory::Size => (
            "File Size Too Large",
            "Some files exceed the 50MB limit. Try compressing them or converting smaller batches.",
            "Remove Large Files",
            SuggestedAction::Remove,
        ),
        FailureCategory::Corrupt => (
            "Corrupted Files",
            "Some HEIC files appear to be corrupted or invalid. These need to be removed or replaced.",
            "Remove Corrupted Files",
            SuggestedAction::Remove,
        ),
        FailureCategory::Memory => (
            "Memory Limit Reached",
            "The converter ran out of memory. Try converting fewer files at once.",
            "Process Smaller Batches",
            SuggestedAction::Info,
        ),
        FailureCategory::Unknown => (
            "Conversion Failed",
            "Some files failed to convert for unknown reasons. You can try again.",
            "Retry Failed Files",
            SuggestedAction::Retry,
        ),
    }
}

/// One suggestion per category present among failed items, in
/// size / corrupt / memory / unknown order.
pub fn suggestions(items: &[ConversionItem]) -> Vec<Suggestion> {
    let mut grouped: Vec<(FailureCategory, Vec<ItemId>)> = Vec::new();

    for item in items.iter().filter(|i| i.status() == ItemStatus::Failed) {
        let category = FailureCategory::from_message(item.error_message().unwrap_or_default());
        match grouped.iter_mut().find(|(c, _)| *c == category) {
            Some((_, ids)) => ids.push(item.id()),
            None => grouped.push((category, vec![item.id()])),
        }
    }
    grouped.sort_by_key(|(category, _)| *category);

    grouped
        .into_iter()
        .map(|(category, item_ids)| {
            let (title, description, action_label, action) = template(category);
            Suggestion {
                category,
                title,
                description,
                action_label,
                action,
                item_ids,
            }
        })
        .collect()
}
