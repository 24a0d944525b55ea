use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::broadcast::TocBroadcaster;
use crate::cache::{CollectionTocState, FetchTicket, Request, TocCache};
use crate::config::OrderingConfig;
use crate::formats::{TocNode, TocOrder};
use crate::source::TocSource;

enum Command {
    Request {
        collection_id: String,
        order: TocOrder,
    },
    Snapshot(oneshot::Sender<Option<CollectionTocState>>),
}

type FetchDone = (FetchTicket, anyhow::Result<Option<TocNode>>);

/// Cloneable front of the TOC task.
///
/// The task owns the [`TocCache`]; it stops once every handle is dropped.
#[derive(Clone)]
pub struct TocServiceHandle {
    commands: mpsc::UnboundedSender<Command>,
    broadcaster: TocBroadcaster,
}

impl TocServiceHandle {
    pub fn broadcaster(&self) -> &TocBroadcaster {
        &self.broadcaster
    }

    /// Asks for `collection_id` in `order`. Results arrive on the broadcaster.
    pub fn request(&self, collection_id: &str, order: TocOrder) -> anyhow::Result<()> {
        self.commands
            .send(Command::Request {
                collection_id: collection_id.to_owned(),
                order,
            })
            .map_err(|_| anyhow::anyhow!("toc service has stopped"))
    }

    /// Current state once every earlier request has been processed.
    pub async fn snapshot(&self) -> anyhow::Result<Option<CollectionTocState>> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Snapshot(tx))
            .map_err(|_| anyhow::anyhow!("toc service has stopped"))?;
        rx.await
            .map_err(|_| anyhow::anyhow!("toc service dropped snapshot request"))
    }
}

pub fn spawn(
    source: Arc<dyn TocSource>,
    config: OrderingConfig,
    broadcaster: TocBroadcaster,
) -> TocServiceHandle {
    let (commands, command_rx) = mpsc::unbounded_channel();
    let cache = TocCache::new(config, broadcaster.clone());
    tokio::spawn(run(source, cache, command_rx));
    TocServiceHandle {
        commands,
        broadcaster,
    }
}

async fn run(
    source: Arc<dyn TocSource>,
    mut cache: TocCache,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<FetchDone>();
    let mut in_flight: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    break;
                };
                match command {
                    Command::Request { collection_id, order } => {
                        if let Request::Fetch(ticket) = cache.request(&collection_id, order) {
                            if let Some(previous) = in_flight.take() {
                                previous.abort();
                            }
                            in_flight = Some(spawn_fetch(Arc::clone(&source), ticket, done_tx.clone()));
                        }
                    }
                    Command::Snapshot(reply) => {
                        let _ = reply.send(cache.current().cloned());
                    }
                }
            }
            Some((ticket, result)) = done_rx.recv() => {
                if cache.complete(&ticket, result) {
                    in_flight = None;
                }
            }
        }
    }

    if let Some(fetch) = in_flight {
        fetch.abort();
    }
    tracing::debug!("toc service stopped");
}

fn spawn_fetch(
    source: Arc<dyn TocSource>,
    ticket: FetchTicket,
    done: mpsc::UnboundedSender<FetchDone>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = source.fetch_toc(&ticket.collection_id).await;
        let _ = done.send((ticket, result));
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct StaticSource {
        trees: HashMap<String, TocNode>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TocSource for StaticSource {
        async fn fetch_toc(&self, collection_id: &str) -> anyhow::Result<Option<TocNode>> {
            self.calls
                .lock()
                .expect("calls lock")
                .push(collection_id.to_owned());
            Ok(self.trees.get(collection_id).cloned())
        }
    }

    #[tokio::test]
    async fn reorders_without_refetching() -> anyhow::Result<()> {
        let mut trees = HashMap::new();
        trees.insert(
            "1".to_owned(),
            TocNode::section(
                "Coll",
                vec![TocNode::leaf("1_2", "Beta"), TocNode::leaf("1_1", "Alpha")],
            ),
        );
        let source = Arc::new(StaticSource {
            trees,
            ..StaticSource::default()
        });
        let handle = spawn(
            Arc::clone(&source) as Arc<dyn TocSource>,
            OrderingConfig::default().allow(TocOrder::Alphabetical, "1"),
            TocBroadcaster::new(),
        );

        let mut rx = handle.broadcaster().flattened.watch();
        handle.request("1", TocOrder::Alphabetical)?;
        rx.changed().await?;
        assert_eq!(
            rx.borrow().as_ref().map(|flat| flat.order),
            Some(TocOrder::Default)
        );

        handle.request("1", TocOrder::Alphabetical)?;
        rx.changed().await?;
        let texts = rx
            .borrow()
            .as_ref()
            .map(|flat| {
                flat.children
                    .iter()
                    .map(|e| e.text.clone())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        assert_eq!(texts, vec!["Alpha", "Beta"]);

        let snapshot = handle.snapshot().await?.expect("loaded");
        assert_eq!(snapshot.order, TocOrder::Alphabetical);
        assert_eq!(*source.calls.lock().expect("calls lock"), vec!["1"]);
        Ok(())
    }
}
