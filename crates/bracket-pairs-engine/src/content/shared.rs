use std::sync::Arc;

use parking_lot::RwLock;

use crate::content::{ContentAccessor, ContentSnapshot, ContentSnapshotProvider, TextDocument, TokenSpans};
use crate::position::Position;

struct DocumentState {
    document: TextDocument,
    spans: Option<Arc<dyn TokenSpans>>,
}

/// A document shared between an editing thread and background readers.
///
/// Readers never see the document mid-edit: [`snapshot`](ContentSnapshotProvider::snapshot)
/// clones the rope under the read lock.
#[derive(Clone)]
pub struct SharedDocument {
    state: Arc<RwLock<DocumentState>>,
}

impl SharedDocument {
    pub fn new(document: TextDocument) -> Self {
        Self {
            state: Arc::new(RwLock::new(DocumentState { document, spans: None })),
        }
    }

    /// Replaces `[start, end)` with `text`.
    pub fn replace(&self, start: Position, end: Position, text: &str) {
        self.state.write().document.replace(start, end, text);
    }

    /// Installs a new classification. `None` falls back to plain scanning.
    pub fn set_spans(&self, spans: Option<Arc<dyn TokenSpans>>) {
        self.state.write().spans = spans;
    }

    #[must_use]
    pub fn has_spans(&self) -> bool {
        self.state.read().spans.is_some()
    }

    /// A copy of the current document.
    #[must_use]
    pub fn document(&self) -> TextDocument {
        self.state.read().document.clone()
    }

    pub fn with_document<R>(&self, f: impl FnOnce(&TextDocument) -> R) -> R {
        f(&self.state.read().document)
    }
}

impl ContentSnapshotProvider for SharedDocument {
    fn snapshot(&self) -> Option<ContentSnapshot> {
        let state = self.state.read();
        Some(ContentSnapshot {
            content: Arc::new(state.document.clone()),
            spans: state.spans.clone(),
        })
    }

    fn version(&self) -> Option<u64> {
        Some(self.state.read().document.version())
    }
}
