use std::sync::Arc;
use std::time::Duration;

use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::api::{
    ApiModelDetail, ApiPack, ApiPpvItem, CombinedSearchResponse, ListEnvelope, Page, TagDictionary, TrendingResponse,
};
use crate::config::BaseUrlResolver;
use crate::error::StoreError;

/// Which combined-search endpoint to hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchScope {
    /// `/search?query=`
    Term(String),
    /// `/tag/search?tag=`
    Tag(String),
}

impl SearchScope {
    fn path(&self) -> &'static [&'static str] {
        match self {
            SearchScope::Term(_) => &["search"],
            SearchScope::Tag(_) => &["tag", "search"],
        }
    }

    fn param(&self) -> (&'static str, &str) {
        match self {
            SearchScope::Term(t) => ("query", t),
            SearchScope::Tag(t) => ("tag", t),
        }
    }
}

/// The two halves of a combined search response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSection {
    Products,
    Streams,
}

impl SearchSection {
    /// Each half is paged through its own query parameter.
    pub fn page_param(self) -> &'static str {
        match self {
            SearchSection::Products => "productos_page",
            SearchSection::Streams => "streams_page",
        }
    }
}

/// Thin HTTP layer over the catalog API. Every call maps failures onto [`StoreError`].
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Arc<dyn BaseUrlResolver>,
}

impl ApiClient {
    pub fn new(base: Arc<dyn BaseUrlResolver>, timeout: Duration) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Network(format!("building HTTP client: {e}")))?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url { self.base.base_url() }

    fn endpoint(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url, StoreError> {
        let mut url = self.base.base_url().clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| StoreError::Network(format!("API base is not a hierarchical URL: {}", self.base.base_url())))?;
            path.pop_if_empty();
            for seg in segments.iter().filter(|s| !s.is_empty()) {
                path.push(seg);
            }
        }
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, StoreError> {
        debug!(%url, "GET");
        let resp = self
            .http
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(%url, status = status.as_u16(), "request failed");
            return Err(StoreError::Http { status: status.as_u16(), body });
        }
        let bytes = resp.bytes().await.map_err(|e| StoreError::Network(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(StoreError::from)
    }

    /// `GET /packs?page=N`
    pub async fn packs_page(&self, page: u32) -> Result<Page<ApiPack>, StoreError> {
        let url = self.endpoint(&["packs"], &[("page", page.to_string())])?;
        let env: ListEnvelope<ApiPack> = self.get_json(url).await?;
        env.into_page("packs")
    }

    /// `GET /ppv?page=N`
    pub async fn streams_page(&self, page: u32) -> Result<Page<ApiPpvItem>, StoreError> {
        let url = self.endpoint(&["ppv"], &[("page", page.to_string())])?;
        let env: ListEnvelope<ApiPpvItem> = self.get_json(url).await?;
        env.into_page("ppv")
    }

    /// Raw combined search, paging only `section`.
    pub async fn search(&self, scope: &SearchScope, section: SearchSection, page: u32) -> Result<CombinedSearchResponse, StoreError> {
        let (key, value) = scope.param();
        let url = self.endpoint(scope.path(), &[(key, value.to_string()), (section.page_param(), page.to_string())])?;
        self.get_json(url).await
    }

    pub async fn search_products_page(&self, scope: &SearchScope, page: u32) -> Result<Page<ApiPack>, StoreError> {
        let resp = self.search(scope, SearchSection::Products, page).await?;
        resp.productos
            .ok_or_else(|| StoreError::MalformedResponse("productos: missing collection".to_string()))?
            .into_page("productos")
    }

    pub async fn search_streams_page(&self, scope: &SearchScope, page: u32) -> Result<Page<ApiPpvItem>, StoreError> {
        let resp = self.search(scope, SearchSection::Streams, page).await?;
        resp.streams
            .ok_or_else(|| StoreError::MalformedResponse("streams: missing collection".to_string()))?
            .into_page("streams")
    }

    /// `GET /model/{id}`
    pub async fn model_detail(&self, id: &str) -> Result<ApiModelDetail, StoreError> {
        let url = self.endpoint(&["model", id], &[])?;
        self.get_json(url).await
    }

    /// Hot / popular endpoints; `path` comes from config.
    pub async fn trending(&self, path: &str) -> Result<Vec<ApiPack>, StoreError> {
        let url = self.endpoint(&split_path(path), &[])?;
        let resp: TrendingResponse = self.get_json(url).await?;
        Ok(resp.into_records())
    }

    pub async fn tag_dictionary(&self, path: &str) -> Result<TagDictionary, StoreError> {
        let url = self.endpoint(&split_path(path), &[])?;
        self.get_json(url).await
    }
}

// Configured paths like `packs/hot` span several segments.
fn split_path(path: &str) -> Vec<&str> { path.split('/').filter(|s| !s.is_empty()).collect() }
