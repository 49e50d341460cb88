use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{datetime_string, Team};
use crate::db::{Direction, EntityId};
use crate::services::{KeyStrategy, Resource};
use crate::validation::{FieldKind, FieldRule};

/// Result of a played match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchScore {
    #[serde(rename = "teamA")]
    pub team_a: Team,
    #[serde(rename = "teamAscores", default)]
    pub team_a_score: i64,
    #[serde(rename = "teamB")]
    pub team_b: Team,
    #[serde(rename = "teamBscores", default)]
    pub team_b_score: i64,
    #[serde(default)]
    pub match_date: String,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct NewMatchScore {
    #[serde(rename = "teamA")]
    pub team_a: Team,
    #[serde(rename = "teamAscores")]
    pub team_a_score: i64,
    #[serde(rename = "teamB")]
    pub team_b: Team,
    #[serde(rename = "teamBscores")]
    pub team_b_score: i64,
    #[serde(default)]
    pub match_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MatchScorePatch {
    #[serde(rename = "teamA")]
    pub team_a: Option<Team>,
    #[serde(rename = "teamAscores")]
    pub team_a_score: Option<i64>,
    #[serde(rename = "teamB")]
    pub team_b: Option<Team>,
    #[serde(rename = "teamBscores")]
    pub team_b_score: Option<i64>,
    pub match_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchScoreView {
    pub id: EntityId,
    #[serde(flatten)]
    pub score: MatchScore,
}

const RULES: &[FieldRule] = &[
    FieldRule::required("teamA", FieldKind::OneOf(Team::NAMES)),
    FieldRule::required("teamAscores", FieldKind::Integer { min: 0 }),
    FieldRule::required("teamB", FieldKind::OneOf(Team::NAMES)),
    FieldRule::required("teamBscores", FieldKind::Integer { min: 0 }),
    FieldRule::nullable("match_date", FieldKind::Date),
];

impl Resource for MatchScore {
    const KIND: &'static str = "recentScores";
    const LABEL: &'static str = "Match score";
    const KEY: KeyStrategy = KeyStrategy::Generated;
    const RULES: &'static [FieldRule] = RULES;
    const ORDER_BY: (&'static str, Direction) = ("created_at", Direction::Descending);

    type Create = NewMatchScore;
    type Patch = MatchScorePatch;
    type View = MatchScoreView;

    fn create(input: NewMatchScore, now: DateTime<Utc>) -> Self {
        Self {
            team_a: input.team_a,
            team_a_score: input.team_a_score,
            team_b: input.team_b,
            team_b_score: input.team_b_score,
            match_date: input
                .match_date
                .unwrap_or_else(|| now.format("%Y-%m-%d").to_string()),
            created_at: datetime_string(now),
        }
    }

    fn apply(&mut self, patch: MatchScorePatch, _now: DateTime<Utc>) {
        if let Some(team) = patch.team_a {
            self.team_a = team;
        }
        if let Some(score) = patch.team_a_score {
            self.team_a_score = score;
        }
        if let Some(team) = patch.team_b {
            self.team_b = team;
        }
        if let Some(score) = patch.team_b_score {
            self.team_b_score = score;
        }
        if let Some(date) = patch.match_date {
            self.match_date = date;
        }
    }

    fn view(&self, id: &EntityId) -> MatchScoreView {
        MatchScoreView {
            id: id.clone(),
            score: self.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn input(match_date: Option<&str>) -> NewMatchScore {
        NewMatchScore {
            team_a: Team::JogooClub,
            team_a_score: 71,
            team_b: Team::FskTigers,
            team_b_score: 64,
            match_date: match_date.map(str::to_string),
        }
    }

    #[test]
    fn match_date_defaults_to_today() {
        let now = Utc.with_ymd_and_hms(2025, 6, 14, 19, 30, 0).unwrap();
        let score = MatchScore::create(input(None), now);
        assert_eq!(score.match_date, "2025-06-14");
        assert_eq!(score.created_at, "2025-06-14 19:30:00");

        let score = MatchScore::create(input(Some("2025-06-01")), now);
        assert_eq!(score.match_date, "2025-06-01");
    }

    #[test]
    fn view_flattens_fields_next_to_id() {
        let now = Utc.with_ymd_and_hms(2025, 6, 14, 19, 30, 0).unwrap();
        let view = MatchScore::create(input(None), now).view(&EntityId::Numeric(9));
        assert_eq!(
            serde_json::to_value(view).unwrap(),
            json!({
                "id": 9,
                "teamA": "Jogoo Club",
                "teamAscores": 71,
                "teamB": "FSK Tigers",
                "teamBscores": 64,
                "match_date": "2025-06-14",
                "created_at": "2025-06-14 19:30:00"
            })
        );
    }

    #[test]
    fn null_date_in_patch_keeps_stored_date() {
        let now = Utc::now();
        let mut score = MatchScore::create(input(Some("2025-06-01")), now);
        let patch: MatchScorePatch =
            serde_json::from_value(json!({"teamBscores": 70, "match_date": null})).unwrap();
        score.apply(patch, now);
        assert_eq!(score.team_b_score, 70);
        assert_eq!(score.match_date, "2025-06-01");
    }
}
