use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{datetime_string, Conference, Team};
use crate::db::{Direction, EntityId};
use crate::services::{KeyStrategy, Resource};
use crate::validation::{FieldKind, FieldRule};

/// League table row, keyed by team name.
///
/// The document doubles as the public view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    pub team: Team,
    pub conference: Conference,
    #[serde(default)]
    pub games_played: i64,
    #[serde(default)]
    pub won: i64,
    #[serde(default)]
    pub lost: i64,
    #[serde(default)]
    pub points: i64,
    #[serde(rename = "created_at", default)]
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStanding {
    pub team: Team,
    pub conference: Conference,
    pub games_played: i64,
    pub won: i64,
    pub lost: i64,
    pub points: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandingPatch {
    pub games_played: Option<i64>,
    pub won: Option<i64>,
    pub lost: Option<i64>,
    pub points: Option<i64>,
}

const COUNT: FieldKind = FieldKind::Integer { min: 0 };

const RULES: &[FieldRule] = &[
    FieldRule::required("team", FieldKind::OneOf(Team::NAMES)),
    FieldRule::required("conference", FieldKind::OneOf(Conference::NAMES)),
    FieldRule::required("gamesPlayed", COUNT),
    FieldRule::required("won", COUNT),
    FieldRule::required("lost", COUNT),
    FieldRule::required("points", COUNT),
];

impl Resource for Standing {
    const KIND: &'static str = "standings";
    const LABEL: &'static str = "Team";
    const KEY: KeyStrategy = KeyStrategy::Natural;
    const RULES: &'static [FieldRule] = RULES;
    const IMMUTABLE: &'static [&'static str] = &["team", "conference"];
    const ORDER_BY: (&'static str, Direction) = ("points", Direction::Descending);

    type Create = NewStanding;
    type Patch = StandingPatch;
    type View = Standing;

    fn create(input: NewStanding, now: DateTime<Utc>) -> Self {
        Self {
            team: input.team,
            conference: input.conference,
            games_played: input.games_played,
            won: input.won,
            lost: input.lost,
            points: input.points,
            created_at: datetime_string(now),
        }
    }

    fn apply(&mut self, patch: StandingPatch, _now: DateTime<Utc>) {
        if let Some(games_played) = patch.games_played {
            self.games_played = games_played;
        }
        if let Some(won) = patch.won {
            self.won = won;
        }
        if let Some(lost) = patch.lost {
            self.lost = lost;
        }
        if let Some(points) = patch.points {
            self.points = points;
        }
    }

    fn view(&self, _id: &EntityId) -> Standing {
        self.clone()
    }

    fn natural_id(&self) -> Option<EntityId> {
        Some(EntityId::Name(self.team.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn standing() -> Standing {
        Standing::create(
            NewStanding {
                team: Team::JogooClub,
                conference: Conference::Kimilili,
                games_played: 5,
                won: 3,
                lost: 2,
                points: 6,
            },
            Utc::now(),
        )
    }

    #[test]
    fn keyed_by_team_name() {
        assert_eq!(standing().natural_id(), Some(EntityId::Name("Jogoo Club".into())));
    }

    #[test]
    fn points_only_patch() {
        let mut record = standing();
        record.apply(
            StandingPatch {
                points: Some(10),
                ..StandingPatch::default()
            },
            Utc::now(),
        );
        assert_eq!((record.games_played, record.won, record.lost, record.points), (5, 3, 2, 10));
    }

    #[test]
    fn document_field_names() {
        let json = serde_json::to_value(standing()).unwrap();
        assert_eq!(json["team"], json!("Jogoo Club"));
        assert_eq!(json["gamesPlayed"], json!(5));
        assert!(json["created_at"].as_str().unwrap().len() == 19);
    }
}
