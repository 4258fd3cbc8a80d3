//! Exhaustive listing over page-numbered endpoints.

use serde::de::DeserializeOwned;

use super::client::IntraClient;
use super::error::HttpError;
use super::types::Filters;
use crate::sync::{ProgressCallback, SyncProgress, emit};

/// How an endpoint names its paging parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageStyle {
    /// `page=N&per_page=S`
    #[default]
    Numbered,
    /// `page[number]=N&page[size]=S`
    Bracketed,
}

impl PageStyle {
    fn params(self, page: u32, page_size: u32) -> [(String, String); 2] {
        match self {
            PageStyle::Numbered => [
                ("page".to_string(), page.to_string()),
                ("per_page".to_string(), page_size.to_string()),
            ],
            PageStyle::Bracketed => [
                ("page[number]".to_string(), page.to_string()),
                ("page[size]".to_string(), page_size.to_string()),
            ],
        }
    }
}

/// Fetch every record of `path`, one page at a time starting at page 1.
///
/// Stops on the first empty page; there is no page cap, so an upstream that
/// never returns an empty page keeps this looping. Records are returned in
/// upstream order.
pub async fn list_all<T: DeserializeOwned>(
    client: &IntraClient,
    path: &str,
    filters: &Filters,
    page_size: u32,
    style: PageStyle,
    on_progress: Option<&ProgressCallback>,
) -> Result<Vec<T>, HttpError> {
    let mut records: Vec<T> = Vec::new();
    let mut page: u32 = 1;

    loop {
        let mut query = filters.as_params().to_vec();
        query.extend(style.params(page, page_size));

        let batch: Vec<T> = client.get_json(path, &query).await?;
        let count = batch.len();

        emit(
            on_progress,
            SyncProgress::FetchedPage {
                endpoint: path.to_string(),
                page,
                count,
                total_so_far: records.len() + count,
            },
        );

        if batch.is_empty() {
            break;
        }
        records.extend(batch);
        page += 1;
    }

    tracing::debug!(
        endpoint = path,
        pages = page,
        records = records.len(),
        "listing complete"
    );
    Ok(records)
}
