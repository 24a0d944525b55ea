use crate::flatten::flatten;
use crate::formats::TocEntry;
use crate::source::TocSource;

pub fn occurrence_item_id(collection_id: &str, publication_id: &str) -> String {
    format!("{collection_id}_{publication_id}")
}

/// Display title of `{collection_id}_{publication_id}` in a flattened TOC.
pub fn resolve_title<'a>(
    entries: &'a [TocEntry],
    collection_id: &str,
    publication_id: &str,
) -> Option<&'a str> {
    let item_id = occurrence_item_id(collection_id, publication_id);
    entries
        .iter()
        .find(|e| e.item_id() == Some(item_id.as_str()))
        .map(|e| e.text.as_str())
}

/// Resolves publication titles for named-entity occurrences with one TOC
/// lookup per occurrence group, bypassing the shared cache.
pub struct OccurrenceResolver<'s> {
    source: &'s dyn TocSource,
}

impl<'s> OccurrenceResolver<'s> {
    pub fn new(source: &'s dyn TocSource) -> Self {
        Self { source }
    }

    /// Titles for each publication of one collection, in input order. A
    /// failed or empty lookup yields `None` for every publication.
    pub async fn titles(
        &self,
        collection_id: &str,
        publication_ids: &[&str],
    ) -> Vec<Option<String>> {
        let entries = match self.source.fetch_toc(collection_id).await {
            Ok(Some(root)) => flatten(root.children(), Some("itemId")),
            Ok(None) => Vec::new(),
            Err(err) => {
                tracing::warn!(collection_id, ?err, "occurrence toc lookup failed");
                Vec::new()
            }
        };
        publication_ids
            .iter()
            .map(|publication_id| {
                resolve_title(&entries, collection_id, publication_id).map(str::to_owned)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::formats::TocNode;

    struct OneTree;

    #[async_trait]
    impl TocSource for OneTree {
        async fn fetch_toc(&self, collection_id: &str) -> anyhow::Result<Option<TocNode>> {
            if collection_id != "4" {
                anyhow::bail!("unknown collection {collection_id}");
            }
            Ok(Some(TocNode::section(
                "Coll",
                vec![TocNode::section(
                    "Part",
                    vec![TocNode::leaf("4_10", "Ten"), TocNode::leaf("4_11", "Eleven")],
                )],
            )))
        }
    }

    #[test]
    fn resolves_title_by_composed_id() {
        let entries = vec![
            TocEntry {
                text: "Heading".to_owned(),
                ..TocEntry::default()
            },
            TocEntry {
                item_id: Some("4_10".to_owned()),
                text: "Ten".to_owned(),
                ..TocEntry::default()
            },
        ];
        assert_eq!(resolve_title(&entries, "4", "10"), Some("Ten"));
        assert_eq!(resolve_title(&entries, "4", "1"), None);
    }

    #[tokio::test]
    async fn resolver_looks_up_nested_items() {
        let source = OneTree;
        let resolver = OccurrenceResolver::new(&source);
        assert_eq!(
            resolver.titles("4", &["11", "99"]).await,
            vec![Some("Eleven".to_owned()), None]
        );
        assert_eq!(resolver.titles("5", &["1"]).await, vec![None]);
    }
}
