//! Incremental list loading.
//!
//! A [`ListLoader`] drives one or more paginated collections for a single
//! listing view. All bookkeeping lives behind a mutex that is only held
//! between suspension points: guard flags are checked and set before any
//! fetch is awaited, so overlapping calls from the same event loop cannot
//! start duplicate fetches. Every query bumps a generation counter and
//! responses tagged with an older generation are dropped on arrival.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::Page;
use crate::client::SearchScope;
use crate::config::RetryConfig;
use crate::error::StoreError;
use crate::scroll::ScrollMetrics;
use crate::source::PageSource;

/// What a listing view is showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListQuery {
    /// Default listing of every pack.
    All,
    /// Stream-only listing.
    Streams,
    Tag(String),
    Search(String),
}

impl ListQuery {
    /// Trim the term; tag and search listings require a non-empty one.
    pub fn validated(self) -> Result<Self, StoreError> {
        match self {
            ListQuery::Tag(t) => match t.trim() {
                "" => Err(StoreError::MissingQuery("tag")),
                t => Ok(ListQuery::Tag(t.to_string())),
            },
            ListQuery::Search(t) => match t.trim() {
                "" => Err(StoreError::MissingQuery("search term")),
                t => Ok(ListQuery::Search(t.to_string())),
            },
            q => Ok(q),
        }
    }

    pub fn scope(&self) -> Option<SearchScope> {
        match self {
            ListQuery::Tag(t) => Some(SearchScope::Tag(t.clone())),
            ListQuery::Search(t) => Some(SearchScope::Term(t.clone())),
            _ => None,
        }
    }

    pub fn title(&self) -> String {
        match self {
            ListQuery::All => "Featured Products".to_string(),
            ListQuery::Streams => "Streamings".to_string(),
            ListQuery::Tag(t) => format!("Tag: {t}"),
            ListQuery::Search(t) => format!("Search Results for: {t}"),
        }
    }
}

/// Which family of listing a query belongs to. A loader's collections are
/// wired for one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    All,
    Streams,
    Tag,
    Search,
}

impl ListKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ListKind::All => "all",
            ListKind::Streams => "streams",
            ListKind::Tag => "tag",
            ListKind::Search => "search",
        }
    }
}

impl ListQuery {
    pub fn kind(&self) -> ListKind {
        match self {
            ListQuery::All => ListKind::All,
            ListQuery::Streams => ListKind::Streams,
            ListQuery::Tag(_) => ListKind::Tag,
            ListQuery::Search(_) => ListKind::Search,
        }
    }
}

impl fmt::Display for ListQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListQuery::All => f.write_str("all"),
            ListQuery::Streams => f.write_str("streams"),
            ListQuery::Tag(t) => write!(f, "tag:{t}"),
            ListQuery::Search(t) => write!(f, "search:{t}"),
        }
    }
}

/// Items the loader can key for rendering.
pub trait Listable {
    fn id(&self) -> &str;
    fn title(&self) -> &str;
}

/// Rendering key. Ids are only unique per collection, so the collection tag
/// and title are part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ItemKey {
    pub collection: String,
    pub id: String,
    pub title: String,
}

impl ItemKey {
    pub fn new(collection: &str, item: &impl Listable) -> Self {
        Self { collection: collection.to_string(), id: item.id().to_string(), title: item.title().to_string() }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.collection, self.id, self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry<T> {
    pub key: ItemKey,
    pub item: T,
}

/// A named collection and where its pages come from. Order of collections
/// in a loader is their display priority.
pub struct Collection<T> {
    tag: String,
    source: Arc<dyn PageSource<T>>,
}

impl<T> Collection<T> {
    pub fn new(tag: impl Into<String>, source: impl PageSource<T> + 'static) -> Self {
        Self { tag: tag.into(), source: Arc::new(source) }
    }

    pub fn shared(tag: impl Into<String>, source: Arc<dyn PageSource<T>>) -> Self {
        Self { tag: tag.into(), source }
    }

    pub fn tag(&self) -> &str { &self.tag }
}

/// Attempts per page fetch. Only transient errors are retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Linear: attempt `n` waits `backoff * n` before the next try.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self { Self { max_attempts: 1, backoff: Duration::ZERO } }
}

impl Default for RetryPolicy {
    fn default() -> Self { Self::none() }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(c: &RetryConfig) -> Self {
        Self { max_attempts: c.max_attempts.max(1), backoff: Duration::from_millis(c.backoff_ms) }
    }
}

/// Paging state of one collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionState {
    pub tag: String,
    pub next_page: u32,
    pub has_more: bool,
    pub pages_loaded: u32,
    pub last_error: Option<String>,
}

impl CollectionState {
    fn new(tag: &str) -> Self {
        Self { tag: tag.to_string(), next_page: 1, has_more: true, pages_loaded: 0, last_error: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { appended: usize },
    /// A guard condition held; nothing was fetched.
    Skipped,
    /// A newer query superseded this one before it finished.
    Stale,
}

/// Point-in-time copy of the loader state, for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct LoaderSnapshot<T> {
    #[serde(skip)]
    pub query: Option<ListQuery>,
    /// Merged in collection priority order, then arrival order.
    pub items: Vec<Entry<T>>,
    pub collections: Vec<CollectionState>,
    pub is_loading_initial: bool,
    pub is_loading_more: bool,
    pub started: bool,
    pub missing_query: Option<String>,
}

impl<T> LoaderSnapshot<T> {
    pub fn has_more(&self) -> bool { self.collections.iter().any(|c| c.has_more) }

    pub fn errors(&self) -> Vec<&str> {
        self.collections.iter().filter_map(|c| c.last_error.as_deref()).collect()
    }
}

struct State<T> {
    generation: u64,
    query: Option<ListQuery>,
    missing_query: Option<String>,
    collections: Vec<CollectionState>,
    items: Vec<Vec<Entry<T>>>,
    is_loading_initial: bool,
    is_loading_more: bool,
    started: bool,
}

impl<T> State<T> {
    fn fresh(tags: &[String]) -> Self {
        Self {
            generation: 0,
            query: None,
            missing_query: None,
            collections: tags.iter().map(|t| CollectionState::new(t)).collect(),
            items: tags.iter().map(|_| Vec::new()).collect(),
            is_loading_initial: false,
            is_loading_more: false,
            started: false,
        }
    }

    /// Discard everything except the generation counter, which moves on.
    fn reset(&mut self, tags: &[String]) {
        let generation = self.generation + 1;
        *self = Self::fresh(tags);
        self.generation = generation;
    }
}

impl<T: Listable> State<T> {
    fn apply(&mut self, idx: usize, requested: u32, result: Result<Page<T>, StoreError>) -> usize {
        let col = &mut self.collections[idx];
        match result {
            Ok(page) => {
                col.pages_loaded += 1;
                col.next_page = col.next_page.max(requested + 1);
                col.has_more = page.has_more();
                col.last_error = None;
                let appended = page.items.len();
                let tag = col.tag.clone();
                debug!(collection = %tag, page = requested, appended, has_more = col.has_more, "page applied");
                self.items[idx].extend(page.items.into_iter().map(|item| Entry { key: ItemKey::new(&tag, &item), item }));
                appended
            }
            Err(e) => {
                warn!(collection = %col.tag, page = requested, error = %e, "page fetch failed; paging stopped for collection");
                col.has_more = false;
                col.last_error = Some(e.user_message());
                0
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Phase {
    Initial,
    More,
}

/// Clears a loading flag when its fetch round ends, including when the
/// awaiting future is dropped mid-fetch. Flags of a newer generation are
/// left alone.
struct LoadingGuard<'a, T> {
    state: &'a Mutex<State<T>>,
    generation: u64,
    phase: Phase,
}

impl<T> Drop for LoadingGuard<'_, T> {
    fn drop(&mut self) {
        let mut st = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if st.generation != self.generation {
            return;
        }
        match self.phase {
            Phase::Initial => st.is_loading_initial = false,
            Phase::More => st.is_loading_more = false,
        }
    }
}

pub struct ListLoader<T> {
    collections: Vec<Collection<T>>,
    tags: Vec<String>,
    kind: Option<ListKind>,
    retry: RetryPolicy,
    state: Mutex<State<T>>,
}

impl<T> ListLoader<T>
where
    T: Listable + Clone + Send + 'static,
{
    pub fn new(collections: Vec<Collection<T>>) -> Self {
        let tags: Vec<String> = collections.iter().map(|c| c.tag.clone()).collect();
        let state = Mutex::new(State::fresh(&tags));
        Self { collections, tags, kind: None, retry: RetryPolicy::none(), state }
    }

    /// Only accept queries of `kind`; others fail with [`StoreError::QueryMismatch`].
    pub fn bound_to(mut self, kind: ListKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn kind(&self) -> Option<ListKind> { self.kind }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn state(&self) -> MutexGuard<'_, State<T>> {
        // State is never left half-updated across a panic point, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reset all paging state and load page 1 of every collection.
    ///
    /// A tag or search query with an empty term fails with
    /// [`StoreError::MissingQuery`] without touching the network. Fetch
    /// failures do not fail the call; they are recorded per collection.
    pub async fn start_query(&self, query: ListQuery) -> Result<LoadOutcome, StoreError> {
        if let Some(expected) = self.kind {
            if query.kind() != expected {
                warn!(expected = expected.as_str(), got = query.kind().as_str(), "query does not match loader");
                return Err(StoreError::QueryMismatch { expected: expected.as_str(), got: query.kind().as_str() });
            }
        }
        let validated = query.validated();
        let (generation, query) = {
            let mut st = self.state();
            st.reset(&self.tags);
            match validated {
                Err(e) => {
                    info!(error = %e, "query rejected before fetch");
                    st.missing_query = Some(e.user_message());
                    return Err(e);
                }
                Ok(q) => {
                    st.query = Some(q.clone());
                    st.started = true;
                    st.is_loading_initial = true;
                    (st.generation, q)
                }
            }
        };
        let _loading = LoadingGuard { state: &self.state, generation, phase: Phase::Initial };
        info!(generation, query = %query, collections = self.collections.len(), "starting query");

        let targets = (0..self.collections.len()).map(|i| (i, 1)).collect();
        match self.fetch_round(generation, &query, targets).await {
            Some(appended) => Ok(LoadOutcome::Loaded { appended }),
            None => Ok(LoadOutcome::Stale),
        }
    }

    /// Fetch the next page of every collection that still has more.
    /// No-op while any load is in flight or when everything is exhausted.
    pub async fn load_next_page(&self) -> LoadOutcome {
        let (generation, query, targets) = {
            let mut st = self.state();
            if st.is_loading_initial || st.is_loading_more {
                return LoadOutcome::Skipped;
            }
            let Some(query) = st.query.clone() else { return LoadOutcome::Skipped };
            let targets: Vec<(usize, u32)> = st
                .collections
                .iter()
                .enumerate()
                .filter(|(_, c)| c.has_more)
                .map(|(i, c)| (i, c.next_page))
                .collect();
            if targets.is_empty() {
                return LoadOutcome::Skipped;
            }
            st.is_loading_more = true;
            (st.generation, query, targets)
        };
        let _loading = LoadingGuard { state: &self.state, generation, phase: Phase::More };
        debug!(generation, pages = ?targets, "loading next page");

        match self.fetch_round(generation, &query, targets).await {
            Some(appended) => LoadOutcome::Loaded { appended },
            None => LoadOutcome::Stale,
        }
    }

    /// Scroll hook for the host view; fires on every scroll event.
    pub async fn on_scroll_proximity(&self, metrics: ScrollMetrics, threshold_px: f64) -> LoadOutcome {
        if !metrics.is_near_bottom(threshold_px) {
            return LoadOutcome::Skipped;
        }
        self.load_next_page().await
    }

    /// Drop all state, e.g. when the view goes away. In-flight responses become stale.
    pub fn clear(&self) { self.state().reset(&self.tags); }

    pub fn snapshot(&self) -> LoaderSnapshot<T> {
        let st = self.state();
        LoaderSnapshot {
            query: st.query.clone(),
            items: st.items.iter().flatten().cloned().collect(),
            collections: st.collections.clone(),
            is_loading_initial: st.is_loading_initial,
            is_loading_more: st.is_loading_more,
            started: st.started,
            missing_query: st.missing_query.clone(),
        }
    }

    pub fn has_more(&self) -> bool { self.state().collections.iter().any(|c| c.has_more) }

    /// Fetch the given `(collection, page)` pairs concurrently and apply each
    /// result as it completes. Returns `None` once the generation is stale.
    async fn fetch_round(&self, generation: u64, query: &ListQuery, targets: Vec<(usize, u32)>) -> Option<usize> {
        let mut pending: FuturesUnordered<_> = targets
            .into_iter()
            .map(|(idx, page)| async move { (idx, page, self.fetch_with_retry(idx, query, page).await) })
            .collect();

        let mut appended = 0;
        while let Some((idx, page, result)) = pending.next().await {
            let mut st = self.state();
            if st.generation != generation {
                debug!(generation, current = st.generation, collection = %self.tags[idx], "discarding stale response");
                return None;
            }
            appended += st.apply(idx, page, result);
        }
        Some(appended)
    }

    async fn fetch_with_retry(&self, idx: usize, query: &ListQuery, page: u32) -> Result<Page<T>, StoreError> {
        let col = &self.collections[idx];
        let mut attempt = 1;
        loop {
            match col.source.fetch_page(query, page).await {
                Ok(p) => return Ok(p),
                Err(e) if attempt < self.retry.max_attempts && e.is_transient() => {
                    warn!(collection = %col.tag, page, attempt, error = %e, "retrying page fetch");
                    tokio::time::sleep(self.retry.backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{ItemKind, ListItem};
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn item(id: &str, title: &str) -> ListItem {
        ListItem {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            image_url: String::new(),
            category: "general".to_string(),
            kind: ItemKind::Standard,
            video_url: None,
            external_link: None,
        }
    }

    fn page(ids: &[&str], current: u32, last: u32, next: bool) -> Result<Page<ListItem>, StoreError> {
        Ok(Page {
            items: ids.iter().map(|id| item(id, &format!("item{id}"))).collect(),
            current_page: current,
            last_page: last,
            has_next_url: next,
        })
    }

    /// Replays canned responses keyed by (query, page). The last queued
    /// response for a key repeats.
    #[derive(Default)]
    struct Scripted {
        responses: Mutex<HashMap<(String, u32), VecDeque<Result<Page<ListItem>, StoreError>>>>,
        delays: HashMap<String, Duration>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn on(self, query: &ListQuery, page: u32, resp: Result<Page<ListItem>, StoreError>) -> Self {
            self.responses.lock().unwrap().entry((query.to_string(), page)).or_default().push_back(resp);
            self
        }

        fn delay(mut self, query: &ListQuery, d: Duration) -> Self {
            self.delays.insert(query.to_string(), d);
            self
        }

        fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
    }

    #[async_trait]
    impl PageSource<ListItem> for Scripted {
        async fn fetch_page(&self, query: &ListQuery, page: u32) -> Result<Page<ListItem>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.delays.get(&query.to_string()) {
                Some(d) => tokio::time::sleep(*d).await,
                None => tokio::task::yield_now().await,
            }
            let mut responses = self.responses.lock().unwrap();
            let queue = responses.get_mut(&(query.to_string(), page));
            match queue {
                Some(q) if q.len() > 1 => q.pop_front().unwrap(),
                Some(q) => q.front().cloned().unwrap(),
                None => Err(StoreError::Http { status: 404, body: format!("no page {page}") }),
            }
        }
    }

    fn loader(sources: Vec<(&str, Arc<Scripted>)>) -> ListLoader<ListItem> {
        ListLoader::new(
            sources
                .into_iter()
                .map(|(tag, s)| Collection::shared(tag, s as Arc<dyn PageSource<ListItem>>))
                .collect(),
        )
    }

    fn ids(snap: &LoaderSnapshot<ListItem>) -> Vec<String> { snap.items.iter().map(|e| e.item.id.clone()).collect() }

    fn near_bottom() -> ScrollMetrics { ScrollMetrics::new(1500.0, 800.0, 2400.0) }

    #[tokio::test(start_paused = true)]
    async fn scroll_near_bottom_loads_the_second_page() {
        let q = ListQuery::All;
        let packs = Arc::new(Scripted::default().on(&q, 1, page(&["1", "2"], 1, 2, true)).on(&q, 2, page(&["3"], 2, 2, false)));
        let l = loader(vec![("packs", packs.clone())]);

        assert_eq!(l.start_query(q).await, Ok(LoadOutcome::Loaded { appended: 2 }));
        let snap = l.snapshot();
        assert_eq!(ids(&snap), vec!["1", "2"]);
        assert!(snap.has_more());
        assert!(!snap.is_loading_initial);

        assert_eq!(l.on_scroll_proximity(near_bottom(), 300.0).await, LoadOutcome::Loaded { appended: 1 });
        let snap = l.snapshot();
        assert_eq!(ids(&snap), vec!["1", "2", "3"]);
        assert!(!snap.has_more());
        assert_eq!(snap.collections[0].next_page, 3);

        // Exhausted: further scroll events do not fetch.
        assert_eq!(l.on_scroll_proximity(near_bottom(), 300.0).await, LoadOutcome::Skipped);
        assert_eq!(packs.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn scroll_far_from_bottom_does_nothing() {
        let q = ListQuery::All;
        let packs = Arc::new(Scripted::default().on(&q, 1, page(&["1"], 1, 2, true)));
        let l = loader(vec![("packs", packs.clone())]);
        l.start_query(q).await.unwrap();

        let far = ScrollMetrics::new(0.0, 800.0, 5000.0);
        assert_eq!(l.on_scroll_proximity(far, 300.0).await, LoadOutcome::Skipped);
        assert_eq!(packs.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn next_page_advances_by_one_per_success() {
        let q = ListQuery::Streams;
        let ppv = Arc::new(
            Scripted::default()
                .on(&q, 1, page(&["a"], 1, 3, true))
                .on(&q, 2, page(&["b"], 2, 3, true))
                .on(&q, 3, page(&["c"], 3, 3, true)),
        );
        let l = loader(vec![("ppv", ppv)]);
        l.start_query(q).await.unwrap();

        let mut seen = vec![l.snapshot().collections[0].next_page];
        while let LoadOutcome::Loaded { .. } = l.load_next_page().await {
            seen.push(l.snapshot().collections[0].next_page);
        }
        assert_eq!(seen, vec![2, 3, 4]);
        // current_page == last_page stops paging even with a next URL.
        assert!(!l.has_more());
    }

    #[tokio::test(start_paused = true)]
    async fn later_page_failure_keeps_loaded_items() {
        let q = ListQuery::Search("jane".into());
        let products = Arc::new(
            Scripted::default()
                .on(&q, 1, page(&["p1", "p2"], 1, 5, true))
                .on(&q, 2, page(&["p3"], 2, 5, true))
                .on(&q, 3, Err(StoreError::Http { status: 500, body: "boom".into() })),
        );
        let streams = Arc::new(
            Scripted::default()
                .on(&q, 1, page(&["s1"], 1, 4, true))
                .on(&q, 2, page(&["s2"], 2, 4, true))
                .on(&q, 3, page(&["s3"], 3, 4, true))
                .on(&q, 4, page(&[], 4, 4, false)),
        );
        let l = loader(vec![("productos", products), ("streams", streams)]);
        l.start_query(q).await.unwrap();
        l.load_next_page().await;
        assert_eq!(l.load_next_page().await, LoadOutcome::Loaded { appended: 1 });

        let snap = l.snapshot();
        assert_eq!(ids(&snap), vec!["p1", "p2", "p3", "s1", "s2", "s3"]);
        assert!(!snap.collections[0].has_more);
        assert!(snap.collections[0].last_error.as_deref().unwrap().contains("500"));
        assert!(snap.collections[1].has_more);
        assert_eq!(snap.collections[1].last_error, None);

        // The healthy collection keeps paging on its own; its success does
        // not clear the sibling's error.
        assert_eq!(l.load_next_page().await, LoadOutcome::Loaded { appended: 0 });
        let snap = l.snapshot();
        assert_eq!(snap.collections[1].next_page, 5);
        assert_eq!(snap.collections[1].last_error, None);
        assert!(snap.collections[0].last_error.as_deref().unwrap().contains("500"));
        assert_eq!(snap.errors().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_next_page_calls_fetch_once() {
        let q = ListQuery::All;
        let packs = Arc::new(
            Scripted::default()
                .on(&q, 1, page(&["1"], 1, 3, true))
                .on(&q, 2, page(&["2"], 2, 3, true))
                .delay(&q, Duration::from_millis(50)),
        );
        let l = loader(vec![("packs", packs.clone())]);
        l.start_query(q).await.unwrap();
        assert_eq!(packs.calls(), 1);

        let (a, b) = tokio::join!(l.load_next_page(), l.load_next_page());
        assert_eq!(a, LoadOutcome::Loaded { appended: 1 });
        assert_eq!(b, LoadOutcome::Skipped);
        assert_eq!(packs.calls(), 2);
        assert_eq!(ids(&l.snapshot()), vec!["1", "2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn next_page_waits_for_initial_load() {
        let q = ListQuery::All;
        let packs = Arc::new(Scripted::default().on(&q, 1, page(&["1"], 1, 3, true)).delay(&q, Duration::from_millis(50)));
        let l = loader(vec![("packs", packs.clone())]);

        let (started, next) = tokio::join!(l.start_query(q), l.load_next_page());
        assert_eq!(started, Ok(LoadOutcome::Loaded { appended: 1 }));
        assert_eq!(next, LoadOutcome::Skipped);
        assert_eq!(packs.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_query_response_is_discarded() {
        let a = ListQuery::Search("a".into());
        let b = ListQuery::Search("b".into());
        let src = Arc::new(
            Scripted::default()
                .on(&a, 1, page(&["a1", "a2"], 1, 1, false))
                .on(&b, 1, page(&["b1"], 1, 1, false))
                .delay(&a, Duration::from_millis(100)),
        );
        let l = loader(vec![("productos", src)]);

        let (ra, rb) = tokio::join!(l.start_query(a), l.start_query(b.clone()));
        assert_eq!(ra, Ok(LoadOutcome::Stale));
        assert_eq!(rb, Ok(LoadOutcome::Loaded { appended: 1 }));

        let snap = l.snapshot();
        assert_eq!(ids(&snap), vec!["b1"]);
        assert_eq!(snap.query, Some(b));
        assert!(!snap.is_loading_initial);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_terms_never_reach_the_network() {
        let src = Arc::new(Scripted::default());
        let l = loader(vec![("productos", src.clone())]);

        assert_eq!(l.start_query(ListQuery::Search("   ".into())).await, Err(StoreError::MissingQuery("search term")));
        assert_eq!(l.start_query(ListQuery::Tag(String::new())).await, Err(StoreError::MissingQuery("tag")));
        let snap = l.snapshot();
        assert_eq!(snap.missing_query.as_deref(), Some("No tag provided."));
        assert!(!snap.started);
        assert_eq!(l.load_next_page().await, LoadOutcome::Skipped);
        assert_eq!(src.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn search_terms_are_trimmed() {
        let q = ListQuery::Search("jane".into());
        let src = Arc::new(Scripted::default().on(&q, 1, page(&["1"], 1, 1, false)));
        let l = loader(vec![("productos", src)]);
        l.start_query(ListQuery::Search("  jane \n".into())).await.unwrap();
        assert_eq!(l.snapshot().query, Some(q));
        assert_eq!(ids(&l.snapshot()), vec!["1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_collection_does_not_block_its_sibling() {
        let q = ListQuery::Tag("cosplay".into());
        let products = Arc::new(Scripted::default().on(&q, 1, Err(StoreError::MalformedResponse("productos: missing `data` array".into()))));
        let streams = Arc::new(Scripted::default().on(&q, 1, page(&["s1"], 1, 2, true)));
        let l = loader(vec![("productos", products.clone()), ("streams", streams)]);
        l.start_query(q).await.unwrap();

        let snap = l.snapshot();
        assert_eq!(ids(&snap), vec!["s1"]);
        assert!(!snap.collections[0].has_more);
        assert_eq!(snap.errors().len(), 1);
        assert!(snap.has_more());

        l.load_next_page().await;
        assert_eq!(products.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_separate_collections_sharing_ids() {
        let q = ListQuery::Search("x".into());
        let products = Arc::new(Scripted::default().on(&q, 1, page(&["1"], 1, 1, false)));
        let streams = Arc::new(Scripted::default().on(&q, 1, page(&["1"], 1, 1, false)));
        let l = loader(vec![("productos", products), ("streams", streams)]);
        l.start_query(q).await.unwrap();

        let snap = l.snapshot();
        assert_eq!(snap.items.len(), 2);
        assert_eq!(snap.items[0].item, snap.items[1].item);
        assert_ne!(snap.items[0].key, snap.items[1].key);
        assert_eq!(snap.items[0].key.to_string(), "productos-1-item1");
    }

    #[tokio::test(start_paused = true)]
    async fn new_query_resets_paging() {
        let a = ListQuery::Tag("a".into());
        let b = ListQuery::Tag("b".into());
        let src = Arc::new(
            Scripted::default()
                .on(&a, 1, page(&["a1"], 1, 3, true))
                .on(&a, 2, page(&["a2"], 2, 3, true))
                .on(&b, 1, page(&["b1"], 1, 2, true)),
        );
        let l = loader(vec![("productos", src)]);
        l.start_query(a).await.unwrap();
        l.load_next_page().await;
        assert_eq!(l.snapshot().collections[0].next_page, 3);

        l.start_query(b).await.unwrap();
        let snap = l.snapshot();
        assert_eq!(snap.collections[0].next_page, 2);
        assert_eq!(ids(&snap), vec!["b1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_retry_when_configured() {
        let q = ListQuery::All;
        let src = Arc::new(
            Scripted::default()
                .on(&q, 1, Err(StoreError::Network("reset".into())))
                .on(&q, 1, page(&["1"], 1, 1, false)),
        );
        let l = loader(vec![("packs", src.clone())])
            .with_retry(RetryPolicy { max_attempts: 3, backoff: Duration::from_millis(10) });
        l.start_query(q).await.unwrap();
        let snap = l.snapshot();
        assert_eq!(ids(&snap), vec!["1"]);
        assert_eq!(src.calls(), 2);
        assert_eq!(snap.collections[0].last_error, None);
        assert!(snap.errors().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn retried_later_page_recovers_without_error() {
        let q = ListQuery::All;
        let src = Arc::new(
            Scripted::default()
                .on(&q, 1, page(&["1"], 1, 3, true))
                .on(&q, 2, Err(StoreError::Http { status: 503, body: "busy".into() }))
                .on(&q, 2, page(&["2"], 2, 3, true)),
        );
        let l = loader(vec![("packs", src.clone())])
            .with_retry(RetryPolicy { max_attempts: 2, backoff: Duration::from_millis(10) });
        l.start_query(q).await.unwrap();

        assert_eq!(l.load_next_page().await, LoadOutcome::Loaded { appended: 1 });
        let snap = l.snapshot();
        assert_eq!(ids(&snap), vec!["1", "2"]);
        assert_eq!(snap.collections[0].last_error, None);
        assert!(snap.collections[0].has_more);
        assert_eq!(src.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_next_page_does_not_block_later_loads() {
        let q = ListQuery::All;
        let src = Arc::new(
            Scripted::default()
                .on(&q, 1, page(&["1"], 1, 3, true))
                .on(&q, 2, page(&["2"], 2, 3, true))
                .delay(&q, Duration::from_millis(50)),
        );
        let l = loader(vec![("packs", src.clone())]);
        l.start_query(q).await.unwrap();

        let timed_out = tokio::time::timeout(Duration::from_millis(10), l.load_next_page()).await;
        assert!(timed_out.is_err());
        let snap = l.snapshot();
        assert!(!snap.is_loading_more);
        assert!(snap.has_more());
        assert_eq!(snap.collections[0].next_page, 2);

        assert_eq!(l.load_next_page().await, LoadOutcome::Loaded { appended: 1 });
        assert_eq!(ids(&l.snapshot()), vec!["1", "2"]);
        assert_eq!(src.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_initial_load_does_not_block_paging() {
        let q = ListQuery::All;
        let src = Arc::new(
            Scripted::default()
                .on(&q, 1, page(&["1"], 1, 2, true))
                .delay(&q, Duration::from_millis(50)),
        );
        let l = loader(vec![("packs", src.clone())]);

        assert!(tokio::time::timeout(Duration::from_millis(10), l.start_query(q)).await.is_err());
        assert!(!l.snapshot().is_loading_initial);

        // Page 1 was never applied, so the next load fetches it.
        assert_eq!(l.load_next_page().await, LoadOutcome::Loaded { appended: 1 });
        assert_eq!(src.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn bound_loader_rejects_other_query_kinds() {
        let src = Arc::new(Scripted::default());
        let l = loader(vec![("packs", src.clone())]).bound_to(ListKind::All);

        assert_eq!(
            l.start_query(ListQuery::Search("jane".into())).await,
            Err(StoreError::QueryMismatch { expected: "all", got: "search" })
        );
        assert!(!l.snapshot().started);
        assert_eq!(src.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_are_not_retried() {
        let q = ListQuery::All;
        let src = Arc::new(Scripted::default().on(&q, 1, Err(StoreError::Http { status: 404, body: String::new() })));
        let l = loader(vec![("packs", src.clone())])
            .with_retry(RetryPolicy { max_attempts: 3, backoff: Duration::from_millis(10) });
        l.start_query(q).await.unwrap();
        assert_eq!(src.calls(), 1);
        let snap = l.snapshot();
        assert!(snap.items.is_empty());
        assert!(!snap.has_more());
        assert_eq!(snap.errors(), vec!["HTTP error! status: 404, message: "]);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_discards_state() {
        let q = ListQuery::All;
        let src = Arc::new(Scripted::default().on(&q, 1, page(&["1"], 1, 2, true)));
        let l = loader(vec![("packs", src)]);
        l.start_query(q).await.unwrap();
        l.clear();
        let snap = l.snapshot();
        assert!(snap.items.is_empty());
        assert!(snap.query.is_none());
        assert_eq!(l.load_next_page().await, LoadOutcome::Skipped);
    }

    #[test]
    fn retry_policy_from_config_never_drops_below_one_attempt() {
        let p = RetryPolicy::from(&RetryConfig { max_attempts: 0, backoff_ms: 250 });
        assert_eq!(p.max_attempts, 1);
        assert_eq!(p.backoff, Duration::from_millis(250));
    }
}
