use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tenderhub_types::UserId;

/// Browse filters for the demand listing. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemandQuery {
    /// Posted at or after this instant.
    pub posted_from: Option<DateTime<Utc>>,
    /// Posted at or before this instant.
    pub posted_to: Option<DateTime<Utc>>,
    pub client: Option<UserId>,
    /// Client's average received rating is at least this. Unrated clients are excluded.
    pub min_client_rating: Option<f64>,
    /// Free text; matches when it shares a tag word with the demand.
    pub tags: Option<String>,
    /// Lowest bid is at least this. Demands without bids always pass.
    pub min_bid: Option<f64>,
    /// Bidding deadline still ahead and not completed.
    pub active_only: bool,
}

impl DemandQuery {
    pub fn tag_text(&self) -> Option<&str> {
        self.tags.as_deref().filter(|t| !t.trim().is_empty())
    }
}
