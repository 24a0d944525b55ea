use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TocOrder {
    #[default]
    Default,
    Alphabetical,
    Chronological,
    Categorical,
}

impl TocOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Alphabetical => "alphabetical",
            Self::Chronological => "chronological",
            Self::Categorical => "categorical",
        }
    }
}

impl fmt::Display for TocOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TocOrder {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "default" => Ok(Self::Default),
            "alphabetical" => Ok(Self::Alphabetical),
            "chronological" => Ok(Self::Chronological),
            "categorical" => Ok(Self::Categorical),
            other => anyhow::bail!("unsupported toc order: {other}"),
        }
    }
}

/// A TOC node without its `children`: the unit emitted by flattening.
///
/// Keys the backend sends beyond the well-known ones are kept in `extra` so
/// that categorical ordering can group by any of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TocEntry {
    #[serde(rename = "itemId", default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "nodeId", default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TocEntry {
    pub fn item_id(&self) -> Option<&str> {
        self.item_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn date(&self) -> Option<&str> {
        self.date.as_deref().filter(|date| !date.is_empty())
    }

    /// Looks up a field by its wire name.
    pub fn field(&self, key: &str) -> Option<Value> {
        match key {
            "itemId" => self.item_id.clone().map(Value::String),
            "text" => Some(Value::String(self.text.clone())),
            "type" => self.kind.clone().map(Value::String),
            "collapsed" => self.collapsed.map(Value::Bool),
            "date" => self.date.clone().map(Value::String),
            "nodeId" => self.node_id.clone().map(Value::String),
            "children" => None,
            other => self.extra.get(other).cloned(),
        }
    }

    pub fn is_truthy(&self, key: &str) -> bool {
        self.field(key).as_ref().is_some_and(is_truthy)
    }

    /// String rendition of a field, used as a sort and group key.
    pub fn field_string(&self, key: &str) -> Option<String> {
        match self.field(key)? {
            Value::Null => None,
            Value::String(s) => Some(s),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            other => Some(other.to_string()),
        }
    }

    pub fn into_node(self) -> TocNode {
        TocNode {
            entry: self,
            children: None,
        }
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TocNode {
    #[serde(flatten)]
    pub entry: TocEntry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TocNode>>,
}

impl TocNode {
    pub fn leaf(item_id: &str, text: &str) -> Self {
        TocEntry {
            item_id: Some(item_id.to_owned()),
            text: text.to_owned(),
            ..TocEntry::default()
        }
        .into_node()
    }

    pub fn section(text: &str, children: Vec<TocNode>) -> Self {
        Self {
            entry: TocEntry {
                text: text.to_owned(),
                ..TocEntry::default()
            },
            children: Some(children),
        }
    }

    /// Synthetic grouping node produced by the grouped orders.
    pub fn subtitle(text: &str, children: Vec<TocEntry>) -> Self {
        Self {
            entry: TocEntry {
                text: text.to_owned(),
                kind: Some("subtitle".to_owned()),
                ..TocEntry::default()
            },
            children: Some(children.into_iter().map(TocEntry::into_node).collect()),
        }
    }

    pub fn children(&self) -> &[TocNode] {
        self.children.as_deref().unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        1 + self.children().iter().map(TocNode::count).sum::<usize>()
    }
}

/// Payload shape of both broadcast channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocDocument<N> {
    #[serde(rename = "collectionId")]
    pub collection_id: String,
    pub order: TocOrder,
    pub text: String,
    pub children: Vec<N>,
}

pub type TocTree = TocDocument<TocNode>;
pub type FlatToc = TocDocument<TocEntry>;

impl<N> TocDocument<N> {
    pub fn empty(collection_id: &str) -> Self {
        Self {
            collection_id: collection_id.to_owned(),
            order: TocOrder::Default,
            text: String::new(),
            children: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}
