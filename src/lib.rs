pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod loader;
pub mod normalize;
pub mod scroll;
pub mod sidebar;
pub mod source;
pub mod view;

// --- Library API for embedding ---

/// Convenience re-exports for embedders.
pub mod prelude {
    pub use crate::config::{BaseUrlResolver, Config, ResolvedBase, RuntimeMode};
    pub use crate::error::StoreError;
    pub use crate::loader::{Collection, ItemKey, ListKind, ListLoader, ListQuery, LoadOutcome, LoaderSnapshot, RetryPolicy};
    pub use crate::normalize::{ItemKind, ListItem};
    pub use crate::scroll::ScrollMetrics;
    pub use crate::sidebar::SidebarData;
    pub use crate::view::ViewState;
    pub use crate::Storefront;
}

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::debug;

use crate::client::ApiClient;
use crate::config::{BaseUrlResolver, Config};
use crate::error::StoreError;
use crate::loader::{Collection, ListLoader, ListQuery, RetryPolicy};
use crate::normalize::{normalize_pack, normalize_stream, ListItem};
use crate::sidebar::SidebarData;
use crate::source::from_fn;

/// Library entry point. Owns the resolved configuration and the API client,
/// and hands out one loader per listing view.
pub struct Storefront {
    config: Config,
    client: ApiClient,
}

impl Storefront {
    /// Resolve the API base from `config` once and build the client.
    pub fn new(config: Config) -> Result<Self> {
        let base = config.resolve_base()?;
        Self::with_resolver(config, Arc::new(base))
    }

    /// Use an externally supplied base URL instead of the configured mode.
    pub fn with_resolver(config: Config, resolver: Arc<dyn BaseUrlResolver>) -> Result<Self> {
        let client = ApiClient::new(resolver, config.request_timeout())?;
        debug!(base = %client.base_url(), "storefront ready");
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &Config { &self.config }
    pub fn client(&self) -> &ApiClient { &self.client }

    /// Loader wired with the collections a listing of this kind shows.
    /// Tag and search listings page products and streams independently.
    /// The loader only accepts queries of the same kind as `query`.
    pub fn loader_for(&self, query: &ListQuery) -> ListLoader<ListItem> {
        let collections = match query {
            ListQuery::All => {
                let c = self.client.clone();
                vec![Collection::new(
                    "packs",
                    from_fn(move |_q: ListQuery, page: u32| {
                        let c = c.clone();
                        async move { Ok::<_, StoreError>(c.packs_page(page).await?.map(normalize_pack)) }
                    }),
                )]
            }
            ListQuery::Streams => {
                let c = self.client.clone();
                vec![Collection::new(
                    "ppv",
                    from_fn(move |_q: ListQuery, page: u32| {
                        let c = c.clone();
                        async move { Ok::<_, StoreError>(c.streams_page(page).await?.map(normalize_stream)) }
                    }),
                )]
            }
            ListQuery::Tag(_) | ListQuery::Search(_) => {
                let products = self.client.clone();
                let streams = self.client.clone();
                vec![
                    Collection::new(
                        "productos",
                        from_fn(move |q: ListQuery, page: u32| {
                            let c = products.clone();
                            async move {
                                let scope = q.scope().ok_or(StoreError::MissingQuery("search term"))?;
                                Ok::<_, StoreError>(c.search_products_page(&scope, page).await?.map(normalize_pack))
                            }
                        }),
                    ),
                    Collection::new(
                        "streams",
                        from_fn(move |q: ListQuery, page: u32| {
                            let c = streams.clone();
                            async move {
                                let scope = q.scope().ok_or(StoreError::MissingQuery("search term"))?;
                                Ok::<_, StoreError>(c.search_streams_page(&scope, page).await?.map(normalize_stream))
                            }
                        }),
                    ),
                ]
            }
        };
        ListLoader::new(collections).bound_to(query.kind()).with_retry(RetryPolicy::from(&self.config.retry))
    }

    /// Fetch and normalize a single product for the detail page.
    pub async fn product_detail(&self, id: &str) -> Result<ListItem, StoreError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(StoreError::MissingQuery("product id"));
        }
        let detail = self.client.model_detail(id).await?;
        Ok(normalize_pack(detail.pack))
    }

    pub async fn sidebar(&self) -> SidebarData {
        let mut rng = StdRng::from_entropy();
        sidebar::load_sidebar(&self.client, &self.config.sidebar, &mut rng).await
    }

    /// Every known tag name, sorted.
    pub async fn tags(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.client.tag_dictionary(&self.config.sidebar.tags_path).await?.flatten())
    }

    pub fn scroll_threshold(&self) -> f64 { self.config.scroll_threshold_px }
}
