use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::warn;

use crate::client::ApiClient;
use crate::config::SidebarConfig;
use crate::error::StoreError;
use crate::loader::ItemKey;
use crate::normalize::{normalize_pack, ListItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SidebarSection {
    Hot,
    Popular,
    Tags,
}

/// Everything the collapsible sidebar shows. Sections fail independently.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SidebarData {
    pub hot: Vec<ListItem>,
    pub popular: Vec<ListItem>,
    pub tags: Vec<String>,
    pub errors: Vec<(SidebarSection, String)>,
}

pub async fn load_sidebar<R: Rng>(client: &ApiClient, cfg: &SidebarConfig, rng: &mut R) -> SidebarData {
    let (hot, popular, tags) = tokio::join!(
        client.trending(&cfg.hot_path),
        client.trending(&cfg.popular_path),
        client.tag_dictionary(&cfg.tags_path),
    );

    let mut out = SidebarData::default();
    let mut record = |section: SidebarSection, e: StoreError| {
        warn!(?section, error = %e, "sidebar section failed");
        out.errors.push((section, e.user_message()));
    };
    let hot: Vec<ListItem> = hot.map(|v| v.into_iter().map(normalize_pack).collect()).unwrap_or_else(|e| { record(SidebarSection::Hot, e); Vec::new() });
    let popular: Vec<ListItem> = popular.map(|v| v.into_iter().map(normalize_pack).collect()).unwrap_or_else(|e| { record(SidebarSection::Popular, e); Vec::new() });
    let tags: Vec<String> = tags.map(|d| d.flatten()).unwrap_or_else(|e| { record(SidebarSection::Tags, e); Vec::new() });

    let (hot, popular) = dedupe_sections(hot, popular);
    out.hot = hot;
    out.popular = popular;
    out.tags = sample_tags(&tags, cfg.tag_sample, rng);
    out
}

/// Drop repeats inside each section, and popular entries already shown under hot.
pub fn dedupe_sections(hot: Vec<ListItem>, popular: Vec<ListItem>) -> (Vec<ListItem>, Vec<ListItem>) {
    let mut seen = HashSet::new();
    let mut keep = |item: &ListItem| seen.insert(ItemKey::new("packs", item));
    let hot: Vec<ListItem> = hot.into_iter().filter(|i| keep(i)).collect();
    let popular: Vec<ListItem> = popular.into_iter().filter(|i| keep(i)).collect();
    (hot, popular)
}

/// Random subset of at most `n` names, sorted for display.
pub fn sample_tags<R: Rng>(tags: &[String], n: usize, rng: &mut R) -> Vec<String> {
    let mut picked: Vec<String> = tags.choose_multiple(rng, n).cloned().collect();
    picked.sort();
    picked
}
