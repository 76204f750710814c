use std::future::Future;

use async_trait::async_trait;

use crate::api::Page;
use crate::error::StoreError;
use crate::loader::ListQuery;

/// One paginated collection behind a listing. Implementations fetch and
/// normalize a single page; the loader owns all paging state.
#[async_trait]
pub trait PageSource<T>: Send + Sync {
    async fn fetch_page(&self, query: &ListQuery, page: u32) -> Result<Page<T>, StoreError>;
}

/// Adapts an async closure `(query, page) -> Result<Page<T>, StoreError>` into a [`PageSource`].
pub struct FnSource<F>(F);

pub fn from_fn<F>(f: F) -> FnSource<F> { FnSource(f) }

#[async_trait]
impl<T, F, Fut> PageSource<T> for FnSource<F>
where
    T: Send + 'static,
    F: Fn(ListQuery, u32) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Page<T>, StoreError>> + Send + 'static,
{
    async fn fetch_page(&self, query: &ListQuery, page: u32) -> Result<Page<T>, StoreError> {
        (self.0)(query.clone(), page).await
    }
}
