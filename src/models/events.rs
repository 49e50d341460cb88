use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Media, Timestamp};
use crate::db::{Direction, EntityId};
use crate::services::{KeyStrategy, MediaPolicy, Resource};
use crate::validation::{FieldKind, FieldRule, ImageRule};

/// Stored event document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Description", default)]
    pub description: String,
    #[serde(rename = "Location", default)]
    pub location: String,
    #[serde(rename = "Date", default)]
    pub date: String,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<Timestamp>,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<Timestamp>,
    #[serde(flatten)]
    pub media: Media,
}

#[derive(Debug, Deserialize)]
pub struct NewEvent {
    pub name: String,
    pub description: String,
    pub location: String,
    pub date: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    pub id: EntityId,
    pub name: String,
    pub description: String,
    pub location: String,
    pub date: String,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
    pub image_url: Option<String>,
}

const TEXT: FieldKind = FieldKind::Text { max: 255 };

const RULES: &[FieldRule] = &[
    FieldRule::required("name", TEXT),
    FieldRule::required("description", TEXT),
    FieldRule::required("location", TEXT),
    FieldRule::required("date", TEXT),
];

impl Resource for Event {
    const KIND: &'static str = "Events";
    const LABEL: &'static str = "Event";
    const KEY: KeyStrategy = KeyStrategy::Generated;
    const RULES: &'static [FieldRule] = RULES;
    const ORDER_BY: (&'static str, Direction) = ("updatedAt", Direction::Descending);
    const MEDIA: Option<MediaPolicy> = Some(MediaPolicy {
        prefix: "events",
        rule: ImageRule::STANDARD,
    });

    type Create = NewEvent;
    type Patch = EventPatch;
    type View = EventView;

    fn create(input: NewEvent, now: DateTime<Utc>) -> Self {
        let now = Timestamp::from(now);
        Self {
            name: input.name,
            description: input.description,
            location: input.location,
            date: input.date,
            created_at: Some(now),
            updated_at: Some(now),
            media: Media::default(),
        }
    }

    fn apply(&mut self, patch: EventPatch, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(location) = patch.location {
            self.location = location;
        }
        if let Some(date) = patch.date {
            self.date = date;
        }

        let now = Timestamp::from(now);
        self.updated_at = Some(match self.updated_at {
            Some(previous) => now.after(previous),
            None => now,
        });
    }

    fn view(&self, id: &EntityId) -> EventView {
        EventView {
            id: id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
            date: self.date.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            image_url: self.media.url.clone(),
        }
    }

    fn media(&self) -> Option<&Media> {
        Some(&self.media)
    }

    fn media_mut(&mut self) -> Option<&mut Media> {
        Some(&mut self.media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(at: DateTime<Utc>) -> Event {
        Event::create(
            NewEvent {
                name: "Season opener".into(),
                description: "Jogoo Club vs FSK Tigers".into(),
                location: "Kimilili".into(),
                date: "2025-05-01".into(),
            },
            at,
        )
    }

    #[test]
    fn create_sets_both_timestamps() {
        let at = Utc.with_ymd_and_hms(2025, 4, 2, 8, 0, 0).unwrap();
        let record = event(at);
        assert_eq!(record.created_at, record.updated_at);
        assert_eq!(record.created_at.map(|t| t.as_datetime()), Some(at));
    }

    #[test]
    fn updated_at_advances_even_with_stale_clock() {
        let at = Utc.with_ymd_and_hms(2025, 4, 2, 8, 0, 0).unwrap();
        let mut record = event(at);
        let before = record.updated_at.unwrap();

        record.apply(EventPatch::default(), at);
        let after = record.updated_at.unwrap();
        assert!(after > before);
        assert_eq!(record.created_at.unwrap().as_datetime(), at);
    }

    #[test]
    fn patch_changes_only_given_fields() {
        let mut record = event(Utc::now());
        record.apply(
            EventPatch {
                location: Some("Bungoma".into()),
                ..EventPatch::default()
            },
            Utc::now(),
        );
        assert_eq!(record.location, "Bungoma");
        assert_eq!(record.name, "Season opener");
    }

    #[test]
    fn view_uses_lowercase_keys() {
        let record = event(Utc::now());
        let json = serde_json::to_value(record.view(&EntityId::Numeric(3))).unwrap();
        assert_eq!(json["id"], serde_json::json!(3));
        assert!(json.get("updatedAt").is_some());
        assert!(json.get("imageUrl").unwrap().is_null());
    }
}
