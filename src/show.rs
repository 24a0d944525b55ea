use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;

use crate::broadcast::TocBroadcaster;
use crate::cli::ShowArgs;
use crate::config::AppConfig;
use crate::formats::TocOrder;
use crate::source::HttpTocSource;

pub async fn run(args: ShowArgs) -> anyhow::Result<()> {
    let mut config = AppConfig::load(args.config.as_deref().map(Path::new)).context("load config")?;
    if let Some(api_base) = args.api_base {
        config.api_base = Some(api_base);
    }
    if let Some(locale) = args.locale {
        config.locale = Some(locale);
    }

    let source = HttpTocSource::new(config.api_base_url()?, config.locale.clone());
    let broadcaster = TocBroadcaster::new();
    let handle = crate::service::spawn(Arc::new(source), config.ordering.clone(), broadcaster);

    let mut tree_rx = handle.broadcaster().tree.watch();
    handle.request(&args.collection, args.order)?;
    tree_rx.changed().await.context("wait for toc")?;

    // A freshly loaded collection always starts in default order.
    if args.order != TocOrder::Default {
        handle.request(&args.collection, args.order)?;
        tree_rx.changed().await.context("wait for ordered toc")?;
    }

    let json = if args.flat {
        let flat = handle
            .broadcaster()
            .flattened
            .latest()
            .ok_or_else(|| anyhow::anyhow!("no flattened toc was published"))?;
        serde_json::to_string_pretty(flat.as_ref()).context("serialize flattened toc")?
    } else {
        let tree = handle
            .broadcaster()
            .tree
            .latest()
            .ok_or_else(|| anyhow::anyhow!("no toc was published"))?;
        serde_json::to_string_pretty(tree.as_ref()).context("serialize toc")?
    };
    println!("{json}");
    Ok(())
}
