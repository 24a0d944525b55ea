use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::broadcast::{Subscription, TocBroadcaster};
use crate::formats::{FlatToc, TocEntry};

/// A non-text page shown before the collection's texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontMatterPage {
    pub page: String,
    pub text: String,
}

impl FrontMatterPage {
    pub fn new(page: &str, text: &str) -> Self {
        Self {
            page: page.to_owned(),
            text: text.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SequenceEntry {
    Page(FrontMatterPage),
    Text(TocEntry),
}

impl SequenceEntry {
    pub fn text(&self) -> &str {
        match self {
            Self::Page(page) => &page.text,
            Self::Text(entry) => &entry.text,
        }
    }

    pub fn item_id(&self) -> Option<&str> {
        match self {
            Self::Page(_) => None,
            Self::Text(entry) => entry.item_id(),
        }
    }

    pub fn page(&self) -> Option<&str> {
        match self {
            Self::Page(page) => Some(&page.page),
            Self::Text(_) => None,
        }
    }
}

/// Linear reading order: front matter, then every text in TOC order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextSequence {
    entries: Vec<SequenceEntry>,
}

impl TextSequence {
    pub fn new(flattened: &FlatToc, front_matter: &[FrontMatterPage]) -> Self {
        let entries = front_matter
            .iter()
            .cloned()
            .map(SequenceEntry::Page)
            .chain(
                flattened
                    .children
                    .iter()
                    .filter(|e| e.item_id().is_some())
                    .cloned()
                    .map(SequenceEntry::Text),
            )
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[SequenceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the entry being read. Item ids are matched exactly first,
    /// then without a `;position` suffix; `page` is only consulted when no
    /// item id is active.
    pub fn position(&self, item_id: Option<&str>, page: Option<&str>) -> Option<usize> {
        if let Some(item_id) = item_id.filter(|id| !id.is_empty()) {
            return self.find_item(item_id).or_else(|| {
                let (base, _) = item_id.split_once(';')?;
                self.find_item(base)
            });
        }
        let page = page?;
        self.entries.iter().position(|e| e.page() == Some(page))
    }

    /// True when the item id occurs more than once in the sequence.
    pub fn is_duplicate(&self, item_id: &str) -> bool {
        self.entries
            .iter()
            .filter(|e| e.item_id() == Some(item_id))
            .nth(1)
            .is_some()
    }

    pub fn previous(&self, index: usize) -> Option<&SequenceEntry> {
        index.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    pub fn next(&self, index: usize) -> Option<&SequenceEntry> {
        self.entries.get(index.checked_add(1)?)
    }

    fn find_item(&self, item_id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.item_id() == Some(item_id))
    }
}

/// Keeps a [`TextSequence`] in step with the flattened TOC channel.
pub struct TextChanger {
    sequence: Arc<Mutex<TextSequence>>,
    _flattened: Subscription,
}

impl TextChanger {
    pub fn attach(broadcaster: &TocBroadcaster, front_matter: Vec<FrontMatterPage>) -> Self {
        let sequence = Arc::new(Mutex::new(TextSequence::default()));
        let flattened = broadcaster.flattened.subscribe({
            let sequence = Arc::clone(&sequence);
            move |flat: &Arc<FlatToc>| {
                let rebuilt = TextSequence::new(flat, &front_matter);
                *sequence.lock().unwrap_or_else(PoisonError::into_inner) = rebuilt;
            }
        });
        Self {
            sequence,
            _flattened: flattened,
        }
    }

    pub fn sequence(&self) -> TextSequence {
        self.sequence
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
