use serde::{Deserialize, Serialize};

use crate::api::{ApiPack, ApiPpvItem};
use crate::loader::Listable;

pub const DEFAULT_DESCRIPTION: &str = "No description available.";
pub const DEFAULT_CATEGORY: &str = "general";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Standard,
    Streaming,
}

/// Uniform display record produced from every API record shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    /// Unique within one listing only; packs and streams may share ids.
    pub id: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub category: String,
    pub kind: ItemKind,
    pub video_url: Option<String>,
    pub external_link: Option<String>,
}

impl ListItem {
    /// Embeddable player URL. YouTube watch links become embed links.
    pub fn embed_url(&self) -> Option<String> {
        let url = self.video_url.as_deref().filter(|u| !u.is_empty())?;
        if url.contains("youtube.com") || url.contains("youtu.be") {
            Some(url.replace("watch?v=", "embed/"))
        } else {
            Some(url.to_string())
        }
    }

    pub fn is_streaming(&self) -> bool { self.kind == ItemKind::Streaming }
}

impl Listable for ListItem {
    fn id(&self) -> &str { &self.id }
    fn title(&self) -> &str { &self.title }
}

/// First `-`-separated segment of the tag string, trimmed and lower-cased.
pub fn category_from_tags(tags: Option<&str>) -> String {
    let first = tags.and_then(|t| t.split('-').next()).unwrap_or("").trim();
    if first.is_empty() {
        DEFAULT_CATEGORY.to_string()
    } else {
        first.to_lowercase()
    }
}

pub fn classify_kind(video_flag: Option<&str>, video_url: Option<&str>) -> ItemKind {
    let flagged = video_flag == Some("1");
    let has_url = video_url.map(|u| !u.is_empty()).unwrap_or(false);
    if flagged || has_url { ItemKind::Streaming } else { ItemKind::Standard }
}

fn description_from_tags(tags: Option<&str>) -> String {
    match tags {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => DEFAULT_DESCRIPTION.to_string(),
    }
}

fn non_empty(s: Option<String>) -> Option<String> { s.filter(|v| !v.is_empty()) }

/// Pack records (listing, search `productos`, detail). `producto_id` wins over `id` when present.
pub fn normalize_pack(p: ApiPack) -> ListItem {
    let kind = classify_kind(p.is_video.as_deref(), p.url_video.as_deref());
    let id = non_empty(p.producto_id).unwrap_or(p.id);
    ListItem {
        id,
        title: p.nombre,
        description: description_from_tags(p.tags.as_deref()),
        image_url: p.imagen.unwrap_or_default(),
        category: category_from_tags(p.tags.as_deref()),
        kind,
        video_url: non_empty(p.url_video),
        external_link: non_empty(p.hot_link),
    }
}

/// Stream / PPV records are video-only, so they are always `Streaming`.
pub fn normalize_stream(s: ApiPpvItem) -> ListItem {
    let url = non_empty(s.url.map(|u| u.trim().to_string()));
    ListItem {
        id: s.id,
        title: s.nombre,
        description: description_from_tags(s.tags.as_deref()),
        image_url: s.imagen.map(|i| i.trim().to_string()).unwrap_or_default(),
        category: category_from_tags(s.tags.as_deref()),
        kind: ItemKind::Streaming,
        video_url: url.clone(),
        external_link: url,
    }
}
