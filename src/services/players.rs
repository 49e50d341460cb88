use std::collections::BTreeSet;
use std::time::Duration;

use serde_json::Value;

use super::ResourceService;
use crate::db::Query;
use crate::error::ApiError;
use crate::models::players::{KIND, TEAM_NAMES_KEY};
use crate::models::Player;

const TEAM_NAMES_TTL: Duration = Duration::from_secs(600);

impl ResourceService<Player> {
    /// Sorted distinct team names across all players.
    pub async fn team_names(&self) -> Result<Vec<String>, ApiError> {
        self.cache
            .remember(TEAM_NAMES_KEY, TEAM_NAMES_TTL, || async {
                let rows = self.store.query(&Query::kind(KIND)).await?;
                let names: BTreeSet<String> = rows
                    .into_iter()
                    .filter_map(|(_, mut document)| match document.remove("Team") {
                        Some(Value::String(team)) if !team.trim().is_empty() => Some(team),
                        _ => None,
                    })
                    .collect();
                Ok::<_, ApiError>(names.into_iter().collect())
            })
            .await
    }
}
