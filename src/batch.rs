//! Batch data model: the files queued for renaming and their per-item state.
//!
//! Items move through `pending → processing → ready → renamed`, with
//! `error(message)` reachable from `processing` (analysis failure) and from
//! `ready` (move failure). All status changes go through the pure
//! [`ItemStatus::transition`] function so the state machine stays testable
//! without any I/O.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Token accounting for a single analysis call, or a running total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
}

impl TokenUsage {
    pub fn new(input: u64, output: u64) -> Self {
        Self { input, output }
    }

    /// Always derived, never stored.
    pub fn total(&self) -> u64 {
        self.input + self.output
    }

    pub fn add(&mut self, other: TokenUsage) {
        self.input += other.input;
        self.output += other.output;
    }
}

/// Lifecycle state of a single batch item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Queued, not yet analyzed.
    Pending,
    /// Analysis in flight.
    Processing,
    /// Analysis produced a proposed name, awaiting confirmation.
    Ready,
    /// The file has been moved to its proposed name. Terminal.
    Renamed,
    /// A stage failed; the message is shown to the user.
    Error(String),
}

/// Events the orchestrator feeds through the status machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemEvent {
    /// Analysis has begun.
    Start,
    /// Analysis produced a proposed name.
    Analyzed,
    /// The file was moved to its proposed name.
    Moved,
    /// The current stage failed with a human-readable reason.
    Failed(String),
    /// Send an errored item back for another analysis pass.
    Requeue,
}

impl ItemStatus {
    /// Pure transition function. Illegal `(status, event)` pairs leave the
    /// status unchanged.
    pub fn transition(&self, event: ItemEvent) -> ItemStatus {
        match (self, event) {
            (ItemStatus::Pending, ItemEvent::Start) => ItemStatus::Processing,
            (ItemStatus::Processing, ItemEvent::Analyzed) => ItemStatus::Ready,
            (ItemStatus::Processing, ItemEvent::Failed(message)) => ItemStatus::Error(message),
            (ItemStatus::Ready, ItemEvent::Moved) => ItemStatus::Renamed,
            (ItemStatus::Ready, ItemEvent::Failed(message)) => ItemStatus::Error(message),
            (ItemStatus::Error(_), ItemEvent::Requeue) => ItemStatus::Pending,
            (current, _) => current.clone(),
        }
    }
}

/// A single file queued for renaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileItem {
    /// Assigned at creation, never reused.
    pub id: Uuid,
    original_path: PathBuf,
    /// File name component at the time the item entered the batch.
    pub original_name: String,
    /// Filled by analysis; the user may hand-edit it before confirming.
    pub proposed_name: Option<String>,
    pub status: ItemStatus,
    pub is_selected: bool,
    pub token_usage: Option<TokenUsage>,
}

impl FileItem {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let original_path = path.into();
        let original_name = original_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            id: Uuid::new_v4(),
            original_path,
            original_name,
            proposed_name: None,
            status: ItemStatus::Pending,
            is_selected: true,
            token_usage: None,
        }
    }

    /// The path the file had when it entered the batch.
    pub fn original_path(&self) -> &Path {
        &self.original_path
    }

    /// Extension exactly as stored on the path; empty when absent.
    pub fn file_extension(&self) -> String {
        self.original_path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Run one event through the status machine.
    pub fn apply(&mut self, event: ItemEvent) {
        self.status = self.status.transition(event);
    }
}

/// Ordered collection of items, deduplicated by original path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Batch {
    items: Vec<FileItem>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[FileItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.items.iter().any(|item| item.original_path() == path)
    }

    /// Append unless the path is already present. Returns whether the item
    /// was added.
    pub fn push(&mut self, item: FileItem) -> bool {
        if self.contains_path(item.original_path()) {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn get(&self, index: usize) -> Option<&FileItem> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut FileItem> {
        self.items.get_mut(index)
    }

    pub fn remove(&mut self, index: usize) -> Option<FileItem> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut FileItem> {
        self.items.iter_mut()
    }

    /// True only for a non-empty batch in which every item has been renamed.
    pub fn all_renamed(&self) -> bool {
        !self.items.is_empty()
            && self
                .items
                .iter()
                .all(|item| item.status == ItemStatus::Renamed)
    }
}
