use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::cli::FlattenArgs;
use crate::formats::{TocEntry, TocNode};

/// Pre-order flattening of a tree.
///
/// A node is emitted when `required_key` is `None` or the node's value for it is
/// truthy. Excluded nodes are still descended into.
pub fn flatten(nodes: &[TocNode], required_key: Option<&str>) -> Vec<TocEntry> {
    let mut out = Vec::new();
    flatten_into(nodes, required_key, &mut out);
    out
}

fn flatten_into(nodes: &[TocNode], required_key: Option<&str>, out: &mut Vec<TocEntry>) {
    for node in nodes {
        if required_key.is_none_or(|key| node.entry.is_truthy(key)) {
            out.push(node.entry.clone());
        }
        flatten_into(node.children(), required_key, out);
    }
}

/// Rebuilds `root` with hierarchical node ids (`n1`, `n1-2`, ...) on every
/// descendant. The root itself is left unnumbered.
pub fn normalize(root: &TocNode) -> TocNode {
    TocNode {
        entry: root.entry.clone(),
        children: root
            .children
            .as_ref()
            .map(|children| normalize_children(children, None)),
    }
}

pub fn normalize_children(children: &[TocNode], parent: Option<&str>) -> Vec<TocNode> {
    children
        .iter()
        .enumerate()
        .map(|(idx, child)| {
            let node_id = match parent {
                Some(parent) => format!("{parent}-{}", idx + 1),
                None => format!("n{}", idx + 1),
            };
            let mut entry = child.entry.clone();
            if entry.text.trim().is_empty()
                && let Some(item_id) = entry.item_id().map(str::to_owned)
            {
                tracing::warn!(item_id = %item_id, node_id = %node_id, "toc item without text; using item id");
                entry.text = item_id;
            }
            let children = child
                .children
                .as_ref()
                .map(|grandchildren| normalize_children(grandchildren, Some(&node_id)));
            entry.node_id = Some(node_id);
            TocNode { entry, children }
        })
        .collect()
}

pub fn read_tree(path: &Path) -> anyhow::Result<TocNode> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read toc tree: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse toc tree: {}", path.display()))
}

pub fn run(args: FlattenArgs) -> anyhow::Result<()> {
    let input = PathBuf::from(&args.input);
    let tree = normalize(&read_tree(&input)?);
    let entries = flatten(tree.children(), args.required_key.as_deref());
    tracing::debug!(entries = entries.len(), "flattened toc");

    let json = serde_json::to_string_pretty(&entries).context("serialize flattened toc")?;
    println!("{json}");
    Ok(())
}
