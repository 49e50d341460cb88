use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Media, PlayerStatus, Position, Team, Timestamp};
use crate::db::{Direction, EntityId, Filter};
use crate::services::{list_cache_key, KeyStrategy, MediaPolicy, Resource};
use crate::validation::{FieldKind, FieldRule, ImageRule};

pub const KIND: &str = "players";

/// Cache key of the distinct team-name list.
pub const TEAM_NAMES_KEY: &str = "players:teams";

/// Stored player document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Position")]
    pub position: Position,
    #[serde(rename = "Height")]
    pub height: String,
    #[serde(rename = "Age", default)]
    pub age: i64,
    #[serde(rename = "Status")]
    pub status: PlayerStatus,
    #[serde(rename = "Team", default, skip_serializing_if = "Option::is_none")]
    pub team: Option<Team>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<Timestamp>,
    #[serde(flatten)]
    pub media: Media,
}

#[derive(Debug, Deserialize)]
pub struct NewPlayer {
    pub name: String,
    pub position: Position,
    pub height: String,
    pub age: i64,
    pub status: PlayerStatus,
    #[serde(default)]
    pub team: Option<Team>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlayerPatch {
    pub name: Option<String>,
    pub position: Option<Position>,
    pub height: Option<String>,
    pub age: Option<i64>,
    pub status: Option<PlayerStatus>,
    pub team: Option<Team>,
}

/// Public shape of a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: EntityId,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Position")]
    pub position: Position,
    #[serde(rename = "Height")]
    pub height: String,
    #[serde(rename = "Age")]
    pub age: i64,
    #[serde(rename = "Status")]
    pub status: PlayerStatus,
    #[serde(rename = "Team")]
    pub team: Option<Team>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<Timestamp>,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
}

const RULES: &[FieldRule] = &[
    FieldRule::required("name", FieldKind::Text { max: 255 }),
    FieldRule::required("position", FieldKind::OneOf(Position::NAMES)),
    FieldRule::required("height", FieldKind::Text { max: 255 }),
    FieldRule::required("age", FieldKind::Integer { min: 0 }),
    FieldRule::required("status", FieldKind::OneOf(PlayerStatus::NAMES)),
    FieldRule::nullable("team", FieldKind::OneOf(Team::NAMES)),
];

/// Filter selecting the players of one team.
pub fn team_filter(team: &str) -> Filter {
    Filter::eq("Team", team)
}

impl Resource for Player {
    const KIND: &'static str = KIND;
    const LABEL: &'static str = "Player";
    const KEY: KeyStrategy = KeyStrategy::Generated;
    const RULES: &'static [FieldRule] = RULES;
    const ORDER_BY: (&'static str, Direction) = ("createdAt", Direction::Descending);
    const MEDIA: Option<MediaPolicy> = Some(MediaPolicy {
        prefix: "players",
        rule: ImageRule::STANDARD,
    });

    type Create = NewPlayer;
    type Patch = PlayerPatch;
    type View = PlayerView;

    fn create(input: NewPlayer, now: DateTime<Utc>) -> Self {
        Self {
            name: input.name,
            position: input.position,
            height: input.height,
            age: input.age,
            status: input.status,
            team: input.team,
            created_at: Some(Timestamp::from(now)),
            media: Media::default(),
        }
    }

    fn apply(&mut self, patch: PlayerPatch, _now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(height) = patch.height {
            self.height = height;
        }
        if let Some(age) = patch.age {
            self.age = age;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(team) = patch.team {
            self.team = Some(team);
        }
    }

    fn view(&self, id: &EntityId) -> PlayerView {
        PlayerView {
            id: id.clone(),
            name: self.name.clone(),
            position: self.position,
            height: self.height.clone(),
            age: self.age,
            status: self.status,
            team: self.team,
            created_at: self.created_at,
            image_url: self.media.url.clone(),
        }
    }

    fn media(&self) -> Option<&Media> {
        Some(&self.media)
    }

    fn media_mut(&mut self) -> Option<&mut Media> {
        Some(&mut self.media)
    }

    fn cache_keys(&self) -> Vec<String> {
        let mut keys = vec![TEAM_NAMES_KEY.to_string()];
        if let Some(team) = self.team {
            keys.push(list_cache_key(KIND, Some(&team_filter(team.as_str()))));
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::TimeZone;
    use serde_json::json;

    fn player() -> Player {
        let now = Utc.with_ymd_and_hms(2025, 4, 2, 8, 0, 0).unwrap();
        Player::create(
            NewPlayer {
                name: "J. Doe".into(),
                position: Position::Center,
                height: "6'10\"".into(),
                age: 24,
                status: PlayerStatus::Active,
                team: Some(Team::JogooClub),
            },
            now,
        )
    }

    #[test]
    fn document_uses_stored_field_names() {
        let document = db::encode(&player()).unwrap();
        assert_eq!(document["Name"], json!("J. Doe"));
        assert_eq!(document["Position"], json!("Center"));
        assert_eq!(document["Team"], json!("Jogoo Club"));
        assert_eq!(document["createdAt"], json!("2025-04-02T08:00:00.000000Z"));
        assert!(!document.contains_key("imagePath"));
    }

    #[test]
    fn patch_keeps_unspecified_fields() {
        let mut record = player();
        record.apply(
            PlayerPatch {
                age: Some(25),
                ..PlayerPatch::default()
            },
            Utc::now(),
        );
        assert_eq!(record.age, 25);
        assert_eq!(record.name, "J. Doe");
        assert_eq!(record.team, Some(Team::JogooClub));
    }

    #[test]
    fn legacy_documents_without_team_decode() {
        let document = json!({
            "Name": "Old", "Position": "Point Guard", "Height": "6'1\"",
            "Age": 30, "Status": "Inactive", "imagePath": "players/a.png"
        });
        let record: Player = db::decode(document.as_object().unwrap().clone()).unwrap();
        assert_eq!(record.team, None);
        assert_eq!(record.created_at, None);
        assert_eq!(record.media.path.as_deref(), Some("players/a.png"));
    }

    #[test]
    fn cache_keys_cover_team_list() {
        let keys = player().cache_keys();
        assert!(keys.contains(&TEAM_NAMES_KEY.to_string()));
        assert!(keys.contains(&"players:list:Team=Jogoo Club".to_string()));
    }
}
