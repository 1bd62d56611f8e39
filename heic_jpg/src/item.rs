//! Conversion items, their state machine, and derived batch progress.

use crate::errors::{ClassifiedError, HeicJpgError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_ITEM_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque item identifier, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(u64);

impl ItemId {
    pub fn next() -> Self {
        Self(NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Waiting,
    Converting,
    Done,
    Failed,
}

impl ItemStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Done | ItemStatus::Failed)
    }

    /// Edges of the item state machine. Removal is not a transition.
    pub fn can_transition_to(self, next: ItemStatus) -> bool {
        matches!(
            (self, next),
            (ItemStatus::Waiting, ItemStatus::Converting)
                | (ItemStatus::Converting, ItemStatus::Done)
                | (ItemStatus::Converting, ItemStatus::Failed)
                | (ItemStatus::Failed, ItemStatus::Waiting)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Waiting => "waiting",
            ItemStatus::Converting => "converting",
            ItemStatus::Done => "done",
            ItemStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user file and its conversion state.
///
/// Payload buffers are shared read-only (`Arc<[u8]>`) so snapshots are cheap;
/// they are released once the item and every snapshot holding it are dropped.
#[derive(Clone)]
pub struct ConversionItem {
    id: ItemId,
    source: Arc<[u8]>,
    display_name: String,
    size_bytes: u64,
    status: ItemStatus,
    error: Option<ClassifiedError>,
    output: Option<Arc<[u8]>>,
    preview: Option<Arc<[u8]>>,
    attempts: u32,
}

impl ConversionItem {
    pub fn new(display_name: impl Into<String>, source: impl Into<Arc<[u8]>>) -> Self {
        let source = source.into();
        Self {
            id: ItemId::next(),
            size_bytes: source.len() as u64,
            source,
            display_name: display_name.into(),
            status: ItemStatus::Waiting,
            error: None,
            output: None,
            preview: None,
            attempts: 0,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn source(&self) -> &Arc<[u8]> {
        &self.source
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    pub fn error(&self) -> Option<&ClassifiedError> {
        self.error.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }

    pub fn output(&self) -> Option<&Arc<[u8]>> {
        self.output.as_ref()
    }

    pub fn preview(&self) -> Option<&Arc<[u8]>> {
        self.preview.as_ref()
    }

    /// Backend calls made during the item's most recent run.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn transition(&mut self, to: ItemStatus) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(HeicJpgError::InvalidTransition {
                id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    pub(crate) fn start_converting(&mut self) -> Result<()> {
        self.transition(ItemStatus::Converting)?;
        self.attempts = 0;
        Ok(())
    }

    pub(crate) fn record_attempt(&mut self) {
        self.attempts += 1;
    }

    pub(crate) fn complete(&mut self, output: Arc<[u8]>, preview: Option<Arc<[u8]>>) -> Result<()> {
        self.transition(ItemStatus::Done)?;
        self.output = Some(output);
        self.preview = preview;
        self.error = None;
        Ok(())
    }

    pub(crate) fn fail(&mut self, error: ClassifiedError) -> Result<()> {
        self.transition(ItemStatus::Failed)?;
        self.error = Some(error);
        self.output = None;
        self.preview = None;
        Ok(())
    }

    /// Failed → Waiting for a user-requested retry.
    pub(crate) fn requeue(&mut self) -> Result<()> {
        self.transition(ItemStatus::Waiting)?;
        self.error = None;
        Ok(())
    }
}

impl fmt::Debug for ConversionItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionItem")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("size_bytes", &self.size_bytes)
            .field("status", &self.status)
            .field("error", &self.error)
            .field("output_bytes", &self.output.as_ref().map(|o| o.len()))
            .field("preview_bytes", &self.preview.as_ref().map(|p| p.len()))
            .field("attempts", &self.attempts)
            .finish()
    }
}

/// Aggregate counts, always derived from the item list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

impl BatchProgress {
    pub fn from_items(items: &[ConversionItem]) -> Self {
        items.iter().fold(
            BatchProgress {
                total: items.len(),
                ..Default::default()
            },
            |mut acc, item| {
                match item.status() {
                    ItemStatus::Done => acc.completed += 1,
                    ItemStatus::Failed => acc.failed += 1,
                    _ => {}
                }
                acc
            },
        )
    }

    pub fn settled(&self) -> usize {
        self.completed + self.failed
    }

    pub fn pending(&self) -> usize {
        self.total - self.settled()
    }

    pub fn is_finished(&self) -> bool {
        self.total > 0 && self.settled() == self.total
    }

    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.settled() as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchPhase {
    Idle,
    Running,
    Completed,
}

impl fmt::Display for BatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BatchPhase::Idle => "idle",
            BatchPhase::Running => "running",
            BatchPhase::Completed => "completed",
        })
    }
}

/// What observers see after every state change.
#[derive(Debug, Clone)]
pub struct BatchSnapshot {
    pub phase: BatchPhase,
    pub items: Vec<ConversionItem>,
    pub progress: BatchProgress,
    /// Set when the capability check failed; submissions are refused.
    pub unsupported_reason: Option<String>,
}

impl BatchSnapshot {
    pub fn item(&self, id: ItemId) -> Option<&ConversionItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn current(&self) -> Option<&ConversionItem> {
        self.items
            .iter()
            .find(|item| item.status() == ItemStatus::Converting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn item() -> ConversionItem {
        ConversionItem::new("IMG_0001", vec![1u8, 2, 3, 4])
    }

    #[test]
    fn test_new_item_is_waiting() {
        let item = item();
        assert_eq!(item.status(), ItemStatus::Waiting);
        assert_eq!(item.size_bytes(), 4);
        assert!(item.error().is_none());
        assert!(item.output().is_none());
        assert!(item.preview().is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = item();
        let b = item();
        assert_ne!(a.id(), b.id());
        assert!(b.id().get() > a.id().get());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut item = item();
        item.start_converting().unwrap();
        item.record_attempt();
        item.complete(Arc::from(vec![9u8; 8]), Some(Arc::from(vec![7u8; 2])))
            .unwrap();

        assert_eq!(item.status(), ItemStatus::Done);
        assert_eq!(item.output().unwrap().len(), 8);
        assert_eq!(item.preview().unwrap().len(), 2);
        assert_eq!(item.attempts(), 1);
    }

    #[test]
    fn test_cannot_skip_converting() {
        let mut item = item();
        let err = item
            .complete(Arc::from(vec![1u8]), None)
            .unwrap_err();
        assert!(matches!(
            err,
            HeicJpgError::InvalidTransition {
                from: ItemStatus::Waiting,
                to: ItemStatus::Done,
                ..
            }
        ));
        assert_eq!(item.status(), ItemStatus::Waiting);

        assert!(item.fail(ClassifiedError::unclassified("x")).is_err());
        assert!(item.error().is_none());
    }

    #[test]
    fn test_failed_requeue_clears_error() {
        let mut item = item();
        item.start_converting().unwrap();
        item.fail(ClassifiedError::invalid_input("bad")).unwrap();
        assert_eq!(item.error().unwrap().kind, ErrorKind::InvalidInput);
        assert_eq!(item.error_message(), Some("bad"));

        item.requeue().unwrap();
        assert_eq!(item.status(), ItemStatus::Waiting);
        assert!(item.error().is_none());
    }

    #[test]
    fn test_done_is_terminal() {
        let mut item = item();
        item.start_converting().unwrap();
        item.complete(Arc::from(vec![1u8]), None).unwrap();
        assert!(item.requeue().is_err());
        assert!(item.start_converting().is_err());
    }

    #[test]
    fn test_transition_table() {
        use ItemStatus::*;
        let all = [Waiting, Converting, Done, Failed];
        let allowed = [
            (Waiting, Converting),
            (Converting, Done),
            (Converting, Failed),
            (Failed, Waiting),
        ];
        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{} → {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_progress_from_items() {
        let mut done = item();
        done.start_converting().unwrap();
        done.complete(Arc::from(vec![1u8]), None).unwrap();

        let mut failed = item();
        failed.start_converting().unwrap();
        failed.fail(ClassifiedError::unclassified("x")).unwrap();

        let waiting = item();

        let items = vec![done, failed, waiting];
        let progress = BatchProgress::from_items(&items);
        assert_eq!(
            progress,
            BatchProgress {
                total: 3,
                completed: 1,
                failed: 1
            }
        );
        assert_eq!(progress.pending(), 1);
        assert!(!progress.is_finished());
        assert!((progress.fraction() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_progress_is_not_finished() {
        let progress = BatchProgress::from_items(&[]);
        assert_eq!(progress, BatchProgress::default());
        assert!(!progress.is_finished());
        assert_eq!(progress.fraction(), 0.0);
    }
}
