//! One-off maintenance jobs run from the command line against the
//! configured backends.
//!
//! These talk to the stores directly. A running server keeps serving its
//! cached lists until they expire.

use serde_json::Value;

use crate::db::{EntityStore, Query, StoreError};
use crate::models::players::KIND;
use crate::storage::BlobStore;

/// Set `Team` to `value` on every player that has none. Returns how many
/// players were changed.
pub async fn backfill_player_team(store: &dyn EntityStore, value: &str) -> Result<usize, StoreError> {
    let players = store.query(&Query::kind(KIND)).await?;
    let mut updated = 0;

    for (id, mut document) in players {
        let has_team = matches!(document.get("Team"), Some(Value::String(team)) if !team.trim().is_empty());
        if has_team {
            continue;
        }
        document.insert("Team".into(), Value::String(value.to_string()));
        store.put(KIND, Some(&id), document).await?;
        tracing::info!("player {} team set to {}", id, value);
        updated += 1;
    }

    Ok(updated)
}

/// Delete every player together with its image. Image deletion is
/// best-effort. Returns how many players were deleted.
pub async fn purge_players(store: &dyn EntityStore, blobs: &dyn BlobStore) -> Result<usize, StoreError> {
    let players = store.query(&Query::kind(KIND)).await?;
    let mut deleted = 0;

    for (id, document) in players {
        if let Some(Value::String(path)) = document.get("imagePath") {
            if let Err(e) = blobs.delete(path).await {
                tracing::warn!("could not delete image {} of player {}: {}", path, id, e);
            }
        }
        store.delete(KIND, &id).await?;
        tracing::info!("player {} deleted", id);
        deleted += 1;
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use serde_json::json;

    use super::*;
    use crate::db::{Document, MemoryStore};
    use crate::storage::LocalBlobStore;

    fn document(value: Value) -> Document {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn backfill_only_touches_players_without_team() {
        let store = MemoryStore::new();
        let with_team = store
            .put(KIND, None, document(json!({"Name": "A", "Team": "Jogoo Club"})))
            .await
            .unwrap();
        let without = store.put(KIND, None, document(json!({"Name": "B"}))).await.unwrap();
        let blank = store
            .put(KIND, None, document(json!({"Name": "C", "Team": ""})))
            .await
            .unwrap();

        assert_eq!(backfill_player_team(&store, "Unknown").await.unwrap(), 2);

        let team = |doc: Option<Document>| doc.and_then(|d| d.get("Team").cloned());
        assert_eq!(team(store.get(KIND, &with_team).await.unwrap()), Some(json!("Jogoo Club")));
        assert_eq!(team(store.get(KIND, &without).await.unwrap()), Some(json!("Unknown")));
        assert_eq!(team(store.get(KIND, &blank).await.unwrap()), Some(json!("Unknown")));

        let b = store.get(KIND, &without).await.unwrap().unwrap();
        assert_eq!(b["Name"], json!("B"));
        assert_eq!(backfill_player_team(&store, "Unknown").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn purge_removes_players_and_images() {
        let media = tempfile::tempdir().unwrap();
        let blobs = LocalBlobStore::new(media.path(), "http://localhost/media");
        let store = MemoryStore::new();

        let blob = blobs
            .upload("players", "png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();
        store
            .put(KIND, None, document(json!({"Name": "A", "imagePath": blob.path.clone()})))
            .await
            .unwrap();
        store.put(KIND, None, document(json!({"Name": "B"}))).await.unwrap();
        store.put("Events", None, document(json!({"Name": "Opener"}))).await.unwrap();

        assert_eq!(purge_players(&store, &blobs).await.unwrap(), 2);
        assert_eq!(store.len(KIND), 0);
        assert_eq!(store.len("Events"), 1);
        assert!(!blobs.exists(&blob.path).await.unwrap());
    }
}
