use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context as _;

use crate::cli::OrderArgs;
use crate::config::{AppConfig, OrderingConfig};
use crate::formats::{TocEntry, TocNode, TocOrder};

/// Reorders the default-order flattened entries of a collection.
///
/// Returns an empty list when the order is not enabled for the collection or
/// when no entry qualifies; callers treat that as "keep what you have".
pub fn order_entries(
    entries: &[TocEntry],
    order: TocOrder,
    collection_id: &str,
    config: &OrderingConfig,
) -> Vec<TocNode> {
    if !config.is_enabled(order, collection_id) {
        tracing::debug!(collection_id, %order, "order not enabled for collection");
        return Vec::new();
    }

    let items = entries
        .iter()
        .filter(|e| e.item_id().is_some())
        .cloned()
        .collect::<Vec<_>>();

    match order {
        TocOrder::Default => Vec::new(),
        TocOrder::Alphabetical => alphabetical(items),
        TocOrder::Chronological => chronological(items),
        TocOrder::Categorical => categorical(
            items,
            &config.categorical_primary_key,
            config.categorical_secondary_key.as_deref(),
        ),
    }
}

pub fn alphabetical(mut items: Vec<TocEntry>) -> Vec<TocNode> {
    items.sort_by(|a, b| compare_text(&a.text, &b.text));
    items.into_iter().map(TocEntry::into_node).collect()
}

pub fn chronological(items: Vec<TocEntry>) -> Vec<TocNode> {
    let dated = items
        .into_iter()
        .filter(|e| e.date().is_some())
        .collect::<Vec<_>>();
    group_entries(dated, |e| e.date.clone(), true, |e| e.date.clone(), true)
}

pub fn categorical(
    items: Vec<TocEntry>,
    primary_key: &str,
    secondary_key: Option<&str>,
) -> Vec<TocNode> {
    let kept = items
        .into_iter()
        .filter(|e| e.is_truthy(primary_key) && secondary_key.is_none_or(|key| e.is_truthy(key)))
        .collect::<Vec<_>>();

    let group_is_date = primary_key == "date";
    let (sort_key, sort_is_date) = match secondary_key {
        Some(key) => (key, key == "date"),
        None => (primary_key, group_is_date),
    };

    group_entries(
        kept,
        |e| e.field_string(primary_key),
        group_is_date,
        |e| e.field_string(sort_key),
        sort_is_date,
    )
}

/// Buckets entries by a label, orders the buckets and the entries in them, and
/// wraps every bucket in a subtitle node.
///
/// Date-valued labels are reduced to their year prefix and compared as numbers.
fn group_entries(
    items: Vec<TocEntry>,
    group_value: impl Fn(&TocEntry) -> Option<String>,
    group_is_date: bool,
    sort_value: impl Fn(&TocEntry) -> Option<String>,
    sort_is_date: bool,
) -> Vec<TocNode> {
    let mut groups: BTreeMap<GroupKey, Vec<TocEntry>> = BTreeMap::new();
    for entry in items {
        let Some(value) = group_value(&entry) else {
            continue;
        };
        let key = if group_is_date {
            GroupKey::year(&value)
        } else {
            GroupKey::text(&value)
        };
        groups.entry(key).or_default().push(entry);
    }

    groups
        .into_iter()
        .map(|(key, mut entries)| {
            entries.sort_by(|a, b| {
                let (a, b) = (
                    sort_value(a).unwrap_or_default(),
                    sort_value(b).unwrap_or_default(),
                );
                if sort_is_date {
                    compare_dates(&a, &b)
                } else {
                    compare_text(&a, &b)
                }
            });
            TocNode::subtitle(&key.label, entries)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct GroupKey {
    numeric: Option<i64>,
    folded: String,
    label: String,
}

impl GroupKey {
    fn year(date: &str) -> Self {
        let label = year_of(date).to_owned();
        Self {
            numeric: label.trim().parse().ok(),
            folded: label.to_lowercase(),
            label,
        }
    }

    fn text(value: &str) -> Self {
        Self {
            numeric: None,
            folded: value.to_lowercase(),
            label: value.to_owned(),
        }
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Numeric labels first, in numeric order; the rest alphabetically.
        match (self.numeric, other.numeric) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| self.folded.cmp(&other.folded))
        .then_with(|| self.label.cmp(&other.label))
    }
}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The part of a date before the first `-`.
pub fn year_of(date: &str) -> &str {
    date.split('-').next().unwrap_or(date)
}

fn compare_dates(a: &str, b: &str) -> Ordering {
    let year = |d: &str| year_of(d).trim().parse::<i64>().ok();
    match (year(a), year(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

pub fn run(args: OrderArgs) -> anyhow::Result<()> {
    let config = AppConfig::load(args.config.as_deref().map(std::path::Path::new))
        .context("load config")?;
    let input = PathBuf::from(&args.input);
    let tree = crate::flatten::read_tree(&input)?;

    let baseline = crate::cache::CollectionTocState::from_tree(&args.collection, Some(&tree));
    let state = crate::cache::derive_ordered_view(&baseline, args.order, &config.ordering)
        .unwrap_or(baseline);
    tracing::debug!(order = %state.order, entries = state.flattened.children.len(), "ordered toc");

    let json = serde_json::to_string_pretty(state.tree.as_ref()).context("serialize toc")?;
    println!("{json}");
    Ok(())
}
