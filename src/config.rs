use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::formats::TocOrder;

pub const API_BASE_ENV: &str = "EDITION_TOC_API_BASE";
pub const LOCALE_ENV: &str = "EDITION_TOC_LOCALE";

/// Per-collection switches for the non-default orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderingConfig {
    pub alphabetical: Vec<String>,
    pub chronological: Vec<String>,
    pub categorical: Vec<String>,
    pub categorical_primary_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categorical_secondary_key: Option<String>,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            alphabetical: Vec::new(),
            chronological: Vec::new(),
            categorical: Vec::new(),
            categorical_primary_key: Self::default_primary_key(),
            categorical_secondary_key: None,
        }
    }
}

impl OrderingConfig {
    pub fn default_primary_key() -> String {
        "date".to_owned()
    }

    /// `default` is always enabled.
    pub fn is_enabled(&self, order: TocOrder, collection_id: &str) -> bool {
        let allowed = match order {
            TocOrder::Default => return true,
            TocOrder::Alphabetical => &self.alphabetical,
            TocOrder::Chronological => &self.chronological,
            TocOrder::Categorical => &self.categorical,
        };
        allowed.iter().any(|id| id == collection_id)
    }

    pub fn allow(mut self, order: TocOrder, collection_id: &str) -> Self {
        let list = match order {
            TocOrder::Default => return self,
            TocOrder::Alphabetical => &mut self.alphabetical,
            TocOrder::Chronological => &mut self.chronological,
            TocOrder::Categorical => &mut self.categorical,
        };
        list.push(collection_id.to_owned());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    pub ordering: OrderingConfig,
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("read config: {}", path.display()))?;
                serde_yaml::from_str::<Self>(&raw)
                    .with_context(|| format!("parse config: {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(api_base) = env_non_empty(API_BASE_ENV) {
            self.api_base = Some(api_base);
        }
        if let Some(locale) = env_non_empty(LOCALE_ENV) {
            self.locale = Some(locale);
        }
    }

    pub fn api_base_url(&self) -> anyhow::Result<Url> {
        let raw = self
            .api_base
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("api base is required (--api-base or {API_BASE_ENV})"))?;
        let url = Url::parse(raw).with_context(|| format!("parse api base: {raw}"))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            anyhow::bail!("api base must be http/https: {url}");
        }
        if url.cannot_be_a_base() {
            anyhow::bail!("api base cannot be used as a base url: {url}");
        }
        Ok(url)
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
