//! Short-page pagination over forge collection endpoints.
//!
//! Both GitHub and Forgejo accept `per_page`/`page` query parameters. The walk
//! ends at the first page holding fewer than `PER_PAGE` items; no total-count
//! header or cursor is consulted.

use reqwest::Url;
use serde::de::DeserializeOwned;

use super::client::ApiClient;
use crate::errors::ApiError;

/// Items requested per page.
pub const PER_PAGE: usize = 100;

/// Set `per_page` and `page` on a collection URL, replacing any previous values.
pub fn page_url(url: &Url, page: u32) -> Url {
    let mut paged = url.clone();
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "per_page" && k != "page")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    {
        let mut query = paged.query_pairs_mut();
        query.clear();
        for (k, v) in &kept {
            query.append_pair(k, v);
        }
        query
            .append_pair("per_page", &PER_PAGE.to_string())
            .append_pair("page", &page.to_string());
    }
    paged
}

/// Fetch every page of `url` and return all items in API order.
///
/// A final page of exactly `PER_PAGE` items costs one extra, empty fetch.
/// Any error discards what was accumulated so far.
pub async fn fetch_all_pages<T: DeserializeOwned>(
    client: &dyn ApiClient,
    url: &Url,
) -> Result<Vec<T>, ApiError> {
    let mut all_items = Vec::new();
    let mut page = 1u32;

    loop {
        let paged = page_url(url, page);
        tracing::debug!(url = %paged, page, "Fetching page");

        let body = client.get_json(&paged).await?;
        let items: Vec<T> = serde_json::from_value(body).map_err(|source| ApiError::Decode {
            url: paged.to_string(),
            source,
        })?;

        let count = items.len();
        all_items.extend(items);

        if count < PER_PAGE {
            break; // Last page
        }
        page += 1;
    }

    Ok(all_items)
}
