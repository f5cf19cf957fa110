/// Popular content view over the watch history
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{StoreResult, WatchHistoryStore};
use crate::models::PopularContent;

pub const POPULAR_WINDOW_DAYS: i64 = 7;
pub const POPULAR_DEFAULT_LIMIT: i64 = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopularView {
    pub items: Vec<PopularContent>,
    pub window_days: i64,
    pub generated_at: DateTime<Utc>,
}

pub async fn popular(store: &dyn WatchHistoryStore, limit: i64) -> StoreResult<PopularView> {
    let now = Utc::now();
    let items = store
        .most_watched(now - Duration::days(POPULAR_WINDOW_DAYS), limit.clamp(1, 100))
        .await?;

    Ok(PopularView {
        items,
        window_days: POPULAR_WINDOW_DAYS,
        generated_at: now,
    })
}
