use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

use crate::cache::{FetchKind, QueryCache, QueryKey, QueryOptions, QueryState};
use crate::error::ApiError;
use crate::models::Paginated;

/// Pages of an infinite list in the order they were fetched (ascending page
/// number).
#[derive(Debug)]
pub struct Pages<T> {
    pages: Vec<Arc<Paginated<T>>>,
}

impl<T> Clone for Pages<T> {
    fn clone(&self) -> Self {
        Self {
            pages: self.pages.clone(),
        }
    }
}

impl<T> Pages<T> {
    pub fn pages(&self) -> &[Arc<Paginated<T>>] {
        &self.pages
    }

    /// All results concatenated page by page. Items repeated across pages are
    /// kept.
    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.pages.iter().flat_map(|p| p.results.iter())
    }

    pub fn next_page(&self) -> Option<u32> {
        self.pages.last().and_then(|p| p.next_page())
    }

    pub fn has_next_page(&self) -> bool {
        self.next_page().is_some()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn push(&mut self, page: Paginated<T>) {
        self.pages.push(Arc::new(page));
    }
}

impl<T> QueryState<Pages<T>> {
    pub fn has_next_page(&self) -> bool {
        self.data.as_ref().is_some_and(|d| d.has_next_page())
    }

    pub fn items(&self) -> Vec<&T> {
        self.data
            .as_deref()
            .map(|d| d.items().collect())
            .unwrap_or_default()
    }
}

/// [`QueryCache`] specialised for paginated endpoints: each slot accumulates
/// pages fetched through `fetch_next_page`.
pub struct InfiniteQueryCache<T> {
    inner: QueryCache<Pages<T>>,
}

impl<T> Clone for InfiniteQueryCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> Default for InfiniteQueryCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> InfiniteQueryCache<T> {
    pub fn new() -> Self {
        Self {
            inner: QueryCache::new(),
        }
    }

    /// Load the first page, or serve the accumulated pages. Revalidation
    /// re-fetches as many pages as are currently loaded, from page 1.
    pub async fn query<F, Fut>(&self, key: QueryKey, options: QueryOptions, fetch_page: F) -> QueryState<Pages<T>>
    where
        F: Fn(u32) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Paginated<T>, ApiError>> + Send + 'static,
    {
        self.inner
            .run(key, options, move |previous| {
                let wanted = previous.map(|p| p.page_count()).unwrap_or(0).max(1);
                load_pages(fetch_page, wanted)
            })
            .await
    }

    /// Append the page after the last loaded one. No-op when the list is not
    /// loaded yet, the last page has been reached, or any fetch for the key is
    /// in flight.
    pub async fn fetch_next_page<F, Fut>(&self, key: QueryKey, fetch_page: F) -> QueryState<Pages<T>>
    where
        F: FnOnce(u32) -> Fut,
        Fut: Future<Output = Result<Paginated<T>, ApiError>> + Send + 'static,
    {
        self.inner
            .run_if(key, FetchKind::NextPage, move |state| {
                let loaded = state.data.clone()?;
                let next = loaded.next_page()?;
                let fut = fetch_page(next);
                Some(async move {
                    let page = fut.await?;
                    let mut pages = (*loaded).clone();
                    pages.push(page);
                    Ok::<_, ApiError>(pages)
                })
            })
            .await
    }

    pub fn observe(&self, key: &QueryKey) -> QueryState<Pages<T>> {
        self.inner.observe(key)
    }

    pub fn subscribe(&self, key: &QueryKey) -> watch::Receiver<QueryState<Pages<T>>> {
        self.inner.subscribe(key)
    }

    pub fn invalidate(&self, key: &QueryKey) {
        self.inner.invalidate(key)
    }
}

async fn load_pages<T, F, Fut>(fetch_page: F, wanted: usize) -> Result<Pages<T>, ApiError>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<Paginated<T>, ApiError>>,
{
    let mut pages = Pages { pages: Vec::new() };
    let mut next = Some(1);
    while let Some(page) = next {
        if pages.page_count() >= wanted {
            break;
        }
        let fetched = fetch_page(page).await?;
        next = fetched.next_page();
        pages.push(fetched);
    }
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: u32, total: u32, results: &[&'static str]) -> Paginated<&'static str> {
        Paginated {
            page: n,
            results: results.to_vec(),
            total_pages: total,
            total_results: total * 2,
        }
    }

    #[tokio::test]
    async fn load_pages_follows_next_page_until_wanted() {
        let pages = load_pages(
            |n| async move { Ok::<_, ApiError>(page(n, 3, if n == 1 { &["a", "b"] } else { &["c", "d"] })) },
            2,
        )
        .await
        .unwrap();
        assert_eq!(pages.items().copied().collect::<Vec<_>>(), vec!["a", "b", "c", "d"]);
        assert!(pages.has_next_page());
    }

    #[tokio::test]
    async fn load_pages_stops_at_last_page() {
        let pages = load_pages(|n| async move { Ok::<_, ApiError>(page(n, 1, &["only"])) }, 4)
            .await
            .unwrap();
        assert_eq!(pages.page_count(), 1);
        assert!(!pages.has_next_page());
    }
}
