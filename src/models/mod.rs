use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::storage::StoredBlob;

pub mod events;
pub mod players;
pub mod scores;
pub mod standings;

pub use events::Event;
pub use players::Player;
pub use scores::MatchScore;
pub use standings::Standing;

/// Playing position on the roster form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    Center,
    #[serde(rename = "Power Forward")]
    PowerForward,
    #[serde(rename = "Small Forward")]
    SmallForward,
    #[serde(rename = "Point Guard")]
    PointGuard,
    #[serde(rename = "Shooting Guard")]
    ShootingGuard,
}

impl Position {
    pub const NAMES: &'static [&'static str] = &[
        "Center",
        "Power Forward",
        "Small Forward",
        "Point Guard",
        "Shooting Guard",
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerStatus {
    Active,
    Inactive,
    Injury,
    Pending,
}

impl PlayerStatus {
    pub const NAMES: &'static [&'static str] = &["Active", "Inactive", "Injury", "Pending"];
}

/// League clubs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Team {
    #[serde(rename = "Bungoma Poly")]
    BungomaPoly,
    #[serde(rename = "Cheptais Hunters")]
    CheptaisHunters,
    #[serde(rename = "Chetambe Bulls")]
    ChetambeBulls,
    #[serde(rename = "Team Seven")]
    TeamSeven,
    #[serde(rename = "Jogoo Club")]
    JogooClub,
    #[serde(rename = "FSK Tigers")]
    FskTigers,
    #[serde(rename = "Kisiwa Rockets")]
    KisiwaRockets,
    #[serde(rename = "Malaba Hawks")]
    MalabaHawks,
    /// Placeholder written by the team backfill; never accepted as input.
    Unknown,
}

impl Team {
    /// Values clients may submit.
    pub const NAMES: &'static [&'static str] = &[
        "Bungoma Poly",
        "Cheptais Hunters",
        "Chetambe Bulls",
        "Team Seven",
        "Jogoo Club",
        "FSK Tigers",
        "Kisiwa Rockets",
        "Malaba Hawks",
    ];

    pub const UNASSIGNED: &'static str = "Unknown";

    pub fn as_str(self) -> &'static str {
        match self {
            Team::BungomaPoly => "Bungoma Poly",
            Team::CheptaisHunters => "Cheptais Hunters",
            Team::ChetambeBulls => "Chetambe Bulls",
            Team::TeamSeven => "Team Seven",
            Team::JogooClub => "Jogoo Club",
            Team::FskTigers => "FSK Tigers",
            Team::KisiwaRockets => "Kisiwa Rockets",
            Team::MalabaHawks => "Malaba Hawks",
            Team::Unknown => Self::UNASSIGNED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Conference {
    Kimilili,
    Bungoma,
}

impl Conference {
    pub const NAMES: &'static [&'static str] = &["Kimilili", "Bungoma"];
}

/// UTC instant stored with fixed microsecond precision, so that string
/// order in the store matches chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self::from(Utc::now())
    }

    /// `self`, or one microsecond past `previous` if the clock has not
    /// moved beyond it.
    pub fn after(self, previous: Timestamp) -> Self {
        if self > previous {
            self
        } else {
            Self(previous.0 + Duration::microseconds(1))
        }
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        // Drop sub-microsecond precision so a round trip is lossless.
        let micros = value.timestamp_micros();
        Self(DateTime::from_timestamp_micros(micros).unwrap_or(value))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%S%.6fZ"))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(Self::from(parsed.with_timezone(&Utc)));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S")
            .map(|naive| Self::from(naive.and_utc()))
            .map_err(serde::de::Error::custom)
    }
}

/// `YYYY-MM-DD HH:MM:SS` in UTC, the `created_at` format of standings and
/// match scores.
pub fn datetime_string(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Image reference kept on a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    #[serde(rename = "imagePath", default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(rename = "imageUrl", default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Media {
    pub fn attach(&mut self, blob: StoredBlob) {
        self.path = Some(blob.path);
        self.url = Some(blob.url);
    }
}
