use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use url::Url;

use crate::formats::TocNode;

/// Where raw collection trees come from.
#[async_trait]
pub trait TocSource: Send + Sync {
    /// `Ok(None)` means the backend has no TOC for the collection.
    async fn fetch_toc(&self, collection_id: &str) -> anyhow::Result<Option<TocNode>>;
}

#[derive(Debug, Clone)]
pub struct HttpTocSource {
    client: reqwest::Client,
    api_base: Url,
    locale: Option<String>,
}

impl HttpTocSource {
    pub fn new(api_base: Url, locale: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base,
            locale: locale.filter(|l| !l.trim().is_empty()),
        }
    }

    /// `{api_base}/toc/{collection_id}[/{locale}]`
    pub fn toc_url(&self, collection_id: &str) -> anyhow::Result<Url> {
        let mut url = self.api_base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| anyhow::anyhow!("api base cannot be a base: {}", self.api_base))?;
            segments.pop_if_empty().push("toc").push(collection_id);
            if let Some(locale) = &self.locale {
                segments.push(locale);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl TocSource for HttpTocSource {
    async fn fetch_toc(&self, collection_id: &str) -> anyhow::Result<Option<TocNode>> {
        let url = self.toc_url(collection_id)?;
        tracing::debug!(%url, "GET toc");

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("toc request failed ({status}): {url}");
        }
        let body = response.text().await.context("read toc response body")?;
        parse_toc_body(&body)
    }
}

/// Parses a TOC response body. Blank bodies, `null` and non-object JSON are
/// treated as "no TOC"; malformed JSON is an error.
pub fn parse_toc_body(body: &str) -> anyhow::Result<Option<TocNode>> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    let value: serde_json::Value = serde_json::from_str(body).context("parse toc json")?;
    if !value.is_object() {
        return Ok(None);
    }
    let root: TocNode = serde_json::from_value(value).context("decode toc tree")?;
    Ok(Some(root))
}
