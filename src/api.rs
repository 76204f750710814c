// Wire types for the catalog REST API
use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::StoreError;

/// Record from `/packs`, the `productos` half of search results, and `/model/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiPack {
    #[serde(deserialize_with = "required_flex_string")]
    pub id: String,
    #[serde(default, deserialize_with = "flex_string")]
    pub producto_id: Option<String>,
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub imagen: Option<String>,
    #[serde(rename = "NombreLink", default)]
    pub nombre_link: Option<String>,
    #[serde(rename = "hotLink", default)]
    pub hot_link: Option<String>,
    #[serde(rename = "isVideo", default, deserialize_with = "flex_string")]
    pub is_video: Option<String>,
    #[serde(default)]
    pub url_video: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
}

/// Record from `/ppv` and the `streams` half of search results.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiPpvItem {
    #[serde(deserialize_with = "required_flex_string")]
    pub id: String,
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub imagen: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
}

/// `/model/{id}`: a pack record plus detail-only extras.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiModelDetail {
    #[serde(flatten)]
    pub pack: ApiPack,
    #[serde(default)]
    pub visitas: Option<Value>,
}

/// Paginated list envelope. Every field is optional on the wire so that a
/// missing one surfaces as `MalformedResponse` instead of a decode error.
#[derive(Debug, Clone, Deserialize)]
pub struct ListEnvelope<R> {
    pub data: Option<Vec<R>>,
    pub current_page: Option<u32>,
    pub last_page: Option<u32>,
    pub next_page_url: Option<String>,
}

/// `/search` and `/tag/search` return both collections at once.
#[derive(Debug, Clone, Deserialize)]
pub struct CombinedSearchResponse {
    pub productos: Option<ListEnvelope<ApiPack>>,
    pub streams: Option<ListEnvelope<ApiPpvItem>>,
}

/// Trending endpoints answer with either a bare array or a list envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TrendingResponse {
    Bare(Vec<ApiPack>),
    Envelope(ListEnvelope<ApiPack>),
}

impl TrendingResponse {
    pub fn into_records(self) -> Vec<ApiPack> {
        match self {
            TrendingResponse::Bare(v) => v,
            TrendingResponse::Envelope(env) => env.data.unwrap_or_default(),
        }
    }
}

/// `/tags`: arbitrary keys mapped to tag names.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TagDictionary {
    Map(BTreeMap<String, Option<String>>),
    List(Vec<Option<String>>),
}

impl TagDictionary {
    /// Flatten to a sorted, de-duplicated list of non-empty names.
    pub fn flatten(self) -> Vec<String> {
        let names: Vec<Option<String>> = match self {
            TagDictionary::Map(m) => m.into_values().collect(),
            TagDictionary::List(v) => v,
        };
        let mut out: Vec<String> = names
            .into_iter()
            .flatten()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        out.sort();
        out.dedup();
        out
    }
}

/// One validated page of a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub last_page: u32,
    pub has_next_url: bool,
}

impl<T> Page<T> {
    /// Paging continues while a next URL is advertised and the last page is not reached.
    pub fn has_more(&self) -> bool { self.has_next_url && self.current_page < self.last_page }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            current_page: self.current_page,
            last_page: self.last_page,
            has_next_url: self.has_next_url,
        }
    }
}

impl<R> ListEnvelope<R> {
    /// Validate the envelope shape. `collection` only feeds the error message.
    pub fn into_page(self, collection: &str) -> Result<Page<R>, StoreError> {
        let items = self
            .data
            .ok_or_else(|| StoreError::MalformedResponse(format!("{collection}: missing `data` array")))?;
        let (current_page, last_page) = match (self.current_page, self.last_page) {
            (Some(c), Some(l)) => (c, l),
            _ => {
                return Err(StoreError::MalformedResponse(format!(
                    "{collection}: missing `current_page`/`last_page`"
                )))
            }
        };
        let has_next_url = self.next_page_url.map(|u| !u.trim().is_empty()).unwrap_or(false);
        Ok(Page { items, current_page, last_page, has_next_url })
    }
}

// Ids and flags show up both as JSON numbers and as strings.
fn flex_string<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(de)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(if b { "1" } else { "0" }.to_string())),
        other => Err(serde::de::Error::custom(format!("expected string or number, got {other}"))),
    }
}

fn required_flex_string<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    flex_string(de)?.ok_or_else(|| serde::de::Error::custom("id must not be null"))
}
