use anyhow::{Context, Result};
use tracing::debug;

use crate::helium::activity::ActivityRecord;
use crate::helium::HeliumApi;

/// Fetches the bounded time-window of a hotspot's activity feed.
///
/// Pages are requested newest-first. Records older than `since` (epoch
/// seconds) are filtered out; paging stops as soon as a page had records
/// filtered (the boundary was crossed inside it) or the source reports no
/// further pages. An empty feed yields an empty vec, not an error.
pub async fn fetch_window<A: HeliumApi>(
    api: &A,
    hotspot_id: &str,
    since: u64,
) -> Result<Vec<ActivityRecord>> {
    let mut activities = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = api
            .fetch_activity_page(hotspot_id, cursor.as_deref())
            .await
            .with_context(|| format!("fetching activity page {pages} for {hotspot_id}"))?;
        pages += 1;

        let page_len = page.records.len();
        let has_more = page.has_more();
        let mut kept = 0usize;
        for record in page.records {
            if record.time() >= since {
                activities.push(record);
                kept += 1;
            }
        }

        // Stop once the window boundary was crossed inside this page, or
        // the feed is exhausted.
        if kept < page_len || !has_more {
            break;
        }

        cursor = page.cursor;
    }

    debug!(
        hotspot = hotspot_id,
        pages,
        records = activities.len(),
        "fetched activity window"
    );

    Ok(activities)
}
