//! Seller listings: scroll scan and multiget.

use crate::error::MercadoLivreError;
use crate::types::{MlItem, MlItemScan, MlMultigetEntry};

use super::{MercadoLivreClient, MAX_PAGES};

const SCAN_PAGE_SIZE: u32 = 100;
const MULTIGET_BATCH: usize = 20;

impl MercadoLivreClient {
    /// All listing ids of a seller via `search_type=scan` scroll pagination.
    ///
    /// # Errors
    ///
    /// Returns [`MercadoLivreError::PaginationLimit`] past [`MAX_PAGES`], or
    /// any error from a page request.
    pub async fn scan_item_ids(&self, seller_id: &str) -> Result<Vec<String>, MercadoLivreError> {
        let path = format!("/users/{seller_id}/items/search");
        let mut ids = Vec::new();
        let mut scroll_id: Option<String> = None;
        let mut page_count = 0usize;

        loop {
            page_count += 1;
            if page_count > MAX_PAGES {
                return Err(MercadoLivreError::PaginationLimit {
                    max_pages: MAX_PAGES,
                    context: path,
                });
            }

            let mut query = vec![
                ("search_type", "scan".to_owned()),
                ("limit", SCAN_PAGE_SIZE.to_string()),
            ];
            if let Some(scroll) = &scroll_id {
                query.push(("scroll_id", scroll.clone()));
            }

            let body = self.get_json(&path, &query, false).await?;
            let page: MlItemScan =
                serde_json::from_value(body).map_err(|e| MercadoLivreError::Deserialize {
                    context: path.clone(),
                    source: e,
                })?;

            if page.results.is_empty() {
                break;
            }
            ids.extend(page.results);

            match page.scroll_id {
                Some(next) if !next.is_empty() => scroll_id = Some(next),
                _ => break,
            }
        }

        Ok(ids)
    }

    /// Fetches listings by id in batches of 20.
    ///
    /// Entries the multiget reports with a non-200 `code` are logged and
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns any error from a batch request or an unreadable batch body.
    pub async fn get_items(&self, ids: &[String]) -> Result<Vec<MlItem>, MercadoLivreError> {
        let mut items = Vec::with_capacity(ids.len());

        for batch in ids.chunks(MULTIGET_BATCH) {
            let query = [("ids", batch.join(","))];
            let body = self.get_json("/items", &query, false).await?;
            let entries: Vec<MlMultigetEntry> =
                serde_json::from_value(body).map_err(|e| MercadoLivreError::Deserialize {
                    context: "items multiget".to_owned(),
                    source: e,
                })?;

            for entry in entries {
                if entry.code != 200 {
                    tracing::warn!(code = entry.code, body = %entry.body, "skipping listing from multiget");
                    continue;
                }
                match serde_json::from_value::<MlItem>(entry.body) {
                    Ok(item) => items.push(item),
                    Err(e) => tracing::warn!(error = %e, "skipping unreadable listing"),
                }
            }
        }

        Ok(items)
    }
}
