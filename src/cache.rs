use std::sync::Arc;

use crate::broadcast::TocBroadcaster;
use crate::config::OrderingConfig;
use crate::flatten::{flatten, normalize, normalize_children};
use crate::formats::{FlatToc, TocDocument, TocNode, TocOrder, TocTree};
use crate::order::order_entries;

/// One collection's TOC in one order, as broadcast to consumers.
#[derive(Debug, Clone)]
pub struct CollectionTocState {
    pub collection_id: String,
    pub order: TocOrder,
    pub tree: Arc<TocTree>,
    pub flattened: Arc<FlatToc>,
}

impl CollectionTocState {
    pub fn empty(collection_id: &str) -> Self {
        Self {
            collection_id: collection_id.to_owned(),
            order: TocOrder::Default,
            tree: Arc::new(TocDocument::empty(collection_id)),
            flattened: Arc::new(TocDocument::empty(collection_id)),
        }
    }

    /// Default-order state built from a fetched root. A missing root or one
    /// without children yields the empty state.
    pub fn from_tree(collection_id: &str, root: Option<&TocNode>) -> Self {
        let Some(root) = root.filter(|root| !root.children().is_empty()) else {
            return Self::empty(collection_id);
        };
        let root = normalize(root);
        let text = root.entry.text.clone();
        let flattened = flatten(root.children(), None);
        Self {
            collection_id: collection_id.to_owned(),
            order: TocOrder::Default,
            tree: Arc::new(TocDocument {
                collection_id: collection_id.to_owned(),
                order: TocOrder::Default,
                text: text.clone(),
                children: root.children.unwrap_or_default(),
            }),
            flattened: Arc::new(TocDocument {
                collection_id: collection_id.to_owned(),
                order: TocOrder::Default,
                text,
                children: flattened,
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// True when both views are the very same allocations as `other`'s.
    pub fn shares_views_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.tree, &other.tree) && Arc::ptr_eq(&self.flattened, &other.flattened)
    }
}

/// Reorders a default-order baseline.
///
/// `None` means the order produced nothing (disabled for the collection or no
/// qualifying entries) and the current view should be kept.
pub fn derive_ordered_view(
    baseline: &CollectionTocState,
    order: TocOrder,
    config: &OrderingConfig,
) -> Option<CollectionTocState> {
    if order == TocOrder::Default {
        return Some(baseline.clone());
    }

    let ordered = order_entries(
        &baseline.flattened.children,
        order,
        &baseline.collection_id,
        config,
    );
    if ordered.is_empty() {
        return None;
    }

    let children = normalize_children(&ordered, None);
    let flattened = flatten(&children, None);
    let text = baseline.tree.text.clone();
    Some(CollectionTocState {
        collection_id: baseline.collection_id.clone(),
        order,
        tree: Arc::new(TocDocument {
            collection_id: baseline.collection_id.clone(),
            order,
            text: text.clone(),
            children,
        }),
        flattened: Arc::new(TocDocument {
            collection_id: baseline.collection_id.clone(),
            order,
            text,
            children: flattened,
        }),
    })
}

/// Identifies one fetch. Only the most recently issued ticket may complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub collection_id: String,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Answered from the cache and broadcast.
    Served,
    /// The caller must fetch the collection and hand the result to
    /// [`TocCache::complete`].
    Fetch(FetchTicket),
}

#[derive(Debug)]
struct Loaded {
    baseline: CollectionTocState,
    current: CollectionTocState,
}

#[derive(Debug)]
enum Target {
    None,
    Pending(FetchTicket),
    Loaded(Loaded),
}

/// Holds the TOC of the collection being read.
///
/// Each request and each accepted fetch result ends with one emission on both
/// broadcast channels, except a request that starts a fetch.
#[derive(Debug)]
pub struct TocCache {
    config: OrderingConfig,
    broadcaster: TocBroadcaster,
    target: Target,
    generation: u64,
}

impl TocCache {
    pub fn new(config: OrderingConfig, broadcaster: TocBroadcaster) -> Self {
        Self {
            config,
            broadcaster,
            target: Target::None,
            generation: 0,
        }
    }

    pub fn broadcaster(&self) -> &TocBroadcaster {
        &self.broadcaster
    }

    pub fn current(&self) -> Option<&CollectionTocState> {
        match &self.target {
            Target::Loaded(loaded) => Some(&loaded.current),
            _ => None,
        }
    }

    pub fn baseline(&self) -> Option<&CollectionTocState> {
        match &self.target {
            Target::Loaded(loaded) => Some(&loaded.baseline),
            _ => None,
        }
    }

    pub fn pending(&self) -> Option<&FetchTicket> {
        match &self.target {
            Target::Pending(ticket) => Some(ticket),
            _ => None,
        }
    }

    pub fn request(&mut self, collection_id: &str, order: TocOrder) -> Request {
        let loaded = match &mut self.target {
            Target::Loaded(loaded) if loaded.baseline.collection_id == collection_id => loaded,
            _ => return self.start_fetch(collection_id),
        };

        if order == TocOrder::Default {
            tracing::debug!(collection_id, "restore default toc");
            loaded.current = loaded.baseline.clone();
        } else {
            match derive_ordered_view(&loaded.baseline, order, &self.config) {
                Some(ordered) => {
                    tracing::debug!(collection_id, %order, "reordered toc");
                    loaded.current = ordered;
                }
                None => {
                    tracing::debug!(collection_id, %order, "order produced nothing; keeping current toc");
                }
            }
        }

        let current = loaded.current.clone();
        self.emit(&current);
        Request::Served
    }

    /// Drops the held state and waits for a fetch. Nothing is emitted here:
    /// the channels keep the previous value until the fetch is committed.
    fn start_fetch(&mut self, collection_id: &str) -> Request {
        self.generation += 1;
        let ticket = FetchTicket {
            collection_id: collection_id.to_owned(),
            generation: self.generation,
        };
        tracing::debug!(collection_id, generation = ticket.generation, "fetch toc");
        self.target = Target::Pending(ticket.clone());
        Request::Fetch(ticket)
    }

    /// Applies a fetch result. Returns `false` when the ticket has been
    /// superseded; the result is then dropped without touching any state.
    ///
    /// Errors are logged and replaced with the empty state; the collection
    /// is loaded in default order whatever order was asked for.
    pub fn complete(
        &mut self,
        ticket: &FetchTicket,
        result: anyhow::Result<Option<TocNode>>,
    ) -> bool {
        match &self.target {
            Target::Pending(pending) if pending == ticket => {}
            _ => {
                tracing::debug!(
                    collection_id = %ticket.collection_id,
                    generation = ticket.generation,
                    "discarding stale toc response"
                );
                return false;
            }
        }

        let baseline = match result {
            Ok(root) => CollectionTocState::from_tree(&ticket.collection_id, root.as_ref()),
            Err(err) => {
                tracing::warn!(collection_id = %ticket.collection_id, ?err, "toc fetch failed");
                CollectionTocState::empty(&ticket.collection_id)
            }
        };
        tracing::info!(
            collection_id = %ticket.collection_id,
            entries = baseline.flattened.children.len(),
            "loaded toc"
        );

        self.target = Target::Loaded(Loaded {
            current: baseline.clone(),
            baseline: baseline.clone(),
        });
        self.emit(&baseline);
        true
    }

    fn emit(&self, state: &CollectionTocState) {
        self.broadcaster
            .emit(Arc::clone(&state.tree), Arc::clone(&state.flattened));
    }
}
