use std::future::Future;

use futures::future::try_join_all;

use crate::ports::catalog::CatalogError;
use crate::services::sync::backoff::{BackoffPolicy, retry};

/// Shape of a paginated scan.
///
/// Pages are requested in rounds of `round_size` parallel calls. The scan
/// never goes past `max_pages`, even if the remote never returns a short page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page_size: u32,
    pub round_size: u32,
    pub max_pages: u32,
    pub start_page: u32,
}

impl Pagination {
    pub fn new(page_size: u32, round_size: u32, max_pages: u32) -> Self {
        Self {
            page_size,
            round_size,
            max_pages,
            start_page: 0,
        }
    }

    /// Resume the scan at `page` instead of the first page.
    pub fn starting_at(self, page: u32) -> Self {
        Self {
            start_page: page,
            ..self
        }
    }
}

/// Collects every item of a paginated listing.
///
/// `fetch_page(offset, limit)` is called for `round_size` consecutive pages
/// at once. If any call of a round fails, the whole round is replayed with
/// the same offsets after a backoff, so retries never skip or repeat items.
/// The scan stops after a round that yields nothing, or at the first page
/// of a round that comes back short.
pub async fn fetch_all<T, F, Fut>(
    pagination: Pagination,
    policy: BackoffPolicy,
    operation_name: &str,
    fetch_page: F,
) -> Result<Vec<T>, CatalogError>
where
    F: Fn(u32, u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>, CatalogError>>,
{
    let page_size = pagination.page_size;
    let round_size = pagination.round_size.max(1);
    let mut items = Vec::new();
    let mut page = pagination.start_page;

    while page < pagination.max_pages {
        let round_end = page.saturating_add(round_size).min(pagination.max_pages);
        tracing::debug!(
            operation = operation_name,
            from = page * page_size,
            to = round_end * page_size,
            "Fetching page round"
        );

        let pages = retry(policy, operation_name, || {
            try_join_all((page..round_end).map(|p| fetch_page(p * page_size, page_size)))
        })
        .await?;

        let mut round_items = 0;
        let mut reached_end = false;
        for page_items in pages {
            reached_end = page_items.len() < page_size as usize;
            round_items += page_items.len();
            items.extend(page_items);
            if reached_end {
                break;
            }
        }

        if round_items == 0 || reached_end {
            break;
        }
        page = round_end;
    }

    tracing::debug!(
        operation = operation_name,
        items = items.len(),
        "Finished paginated fetch"
    );
    Ok(items)
}
