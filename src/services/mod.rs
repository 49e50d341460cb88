//! Resource services: validate, transform, persist, respond.
//!
//! Every resource kind runs the same five pipelines. What differs (kind
//! name, constraint table, sort key, media prefix, view shape) is declared
//! through [`Resource`]; [`ResourceService`] owns the pipelines.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::cache::Cache;
use crate::db::{self, Direction, EntityId, EntityStore, Filter, Query};
use crate::error::ApiError;
use crate::models::Media;
use crate::storage::{BlobStore, Upload};
use crate::validation::{self, FieldErrors, FieldRule, ImageRule, Mode};

pub mod gallery;
pub mod players;

pub use gallery::GalleryService;

/// How entity ids are assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// The store allocates a numeric id.
    Generated,
    /// The record names itself (see [`Resource::natural_id`]).
    Natural,
}

impl KeyStrategy {
    /// Interpret a path segment; `None` means no such entity can exist.
    pub fn parse(self, raw: &str) -> Option<EntityId> {
        match self {
            KeyStrategy::Generated => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|id| *id > 0)
                .map(EntityId::Numeric),
            KeyStrategy::Natural if raw.is_empty() => None,
            KeyStrategy::Natural => Some(EntityId::Name(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MediaPolicy {
    pub prefix: &'static str,
    pub rule: ImageRule,
}

/// One resource kind, described as a typed record.
///
/// The record's serde representation is its stored document.
pub trait Resource: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: &'static str;
    /// Used in response messages ("Player not found").
    const LABEL: &'static str;
    const KEY: KeyStrategy;
    const RULES: &'static [FieldRule];
    /// Fields ignored on update.
    const IMMUTABLE: &'static [&'static str] = &[];
    const ORDER_BY: (&'static str, Direction);
    const LIST_TTL: Duration = Duration::from_secs(60);
    const MEDIA: Option<MediaPolicy> = None;

    type Create: DeserializeOwned;
    type Patch: DeserializeOwned;
    type View: Serialize + DeserializeOwned + Send + Sync;

    fn create(input: Self::Create, now: DateTime<Utc>) -> Self;

    /// Merge the provided fields over the stored ones.
    fn apply(&mut self, patch: Self::Patch, now: DateTime<Utc>);

    fn view(&self, id: &EntityId) -> Self::View;

    fn natural_id(&self) -> Option<EntityId> {
        None
    }

    fn media(&self) -> Option<&Media> {
        None
    }

    fn media_mut(&mut self) -> Option<&mut Media> {
        None
    }

    /// Cache keys, besides the plain list, that depend on this record.
    fn cache_keys(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Parsed request body: plain fields plus an optional media file.
#[derive(Debug, Default)]
pub struct Submission {
    pub fields: Map<String, Value>,
    pub image: Option<Upload>,
}

impl Submission {
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            image: None,
        }
    }
}

/// Cache key of a (possibly filtered) list of `kind`.
pub fn list_cache_key(kind: &str, filter: Option<&Filter>) -> String {
    match filter {
        None => format!("{kind}:list"),
        Some(filter) => {
            let value = match &filter.value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{kind}:list:{}={}", filter.field, value)
        }
    }
}

pub struct ResourceService<R> {
    store: Arc<dyn EntityStore>,
    blobs: Arc<dyn BlobStore>,
    cache: Cache,
    _resource: PhantomData<fn() -> R>,
}

impl<R> Clone for ResourceService<R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            blobs: Arc::clone(&self.blobs),
            cache: self.cache.clone(),
            _resource: PhantomData,
        }
    }
}

impl<R: Resource> ResourceService<R> {
    pub fn new(store: Arc<dyn EntityStore>, blobs: Arc<dyn BlobStore>, cache: Cache) -> Self {
        Self {
            store,
            blobs,
            cache,
            _resource: PhantomData,
        }
    }

    pub async fn create(&self, submission: Submission) -> Result<R::View, ApiError> {
        let Submission { mut fields, image } = submission;
        let image = self.validate(R::RULES, &mut fields, image, Mode::Create)?;
        let input: R::Create = serde_json::from_value(Value::Object(fields))
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        let mut record = R::create(input, Utc::now());
        if let Some(image) = image {
            self.attach(&mut record, image).await?;
        }

        let document = db::encode(&record)?;
        let id = self
            .store
            .put(R::KIND, record.natural_id().as_ref(), document)
            .await?;
        self.invalidate(record.cache_keys()).await;

        tracing::info!("{} {} stored", R::KIND, id);
        Ok(record.view(&id))
    }

    pub async fn list(&self, filter: Option<Filter>) -> Result<Vec<R::View>, ApiError> {
        let key = list_cache_key(R::KIND, filter.as_ref());
        self.cache
            .remember(&key, R::LIST_TTL, || async {
                let (field, direction) = R::ORDER_BY;
                let mut query = Query::kind(R::KIND).order(field, direction);
                if let Some(filter) = &filter {
                    query = query.filter(filter.clone());
                }

                let rows = self.store.query(&query).await?;
                let views = rows
                    .into_iter()
                    .filter_map(|(id, document)| match db::decode::<R>(document) {
                        Ok(record) => Some(record.view(&id)),
                        Err(e) => {
                            tracing::warn!("skipping {} {} in list: {}", R::KIND, id, e);
                            None
                        }
                    })
                    .collect();
                Ok::<_, ApiError>(views)
            })
            .await
    }

    pub async fn read(&self, raw_id: &str) -> Result<R::View, ApiError> {
        let (id, record) = self.find(raw_id).await?;
        Ok(record.view(&id))
    }

    pub async fn update(&self, raw_id: &str, submission: Submission) -> Result<R::View, ApiError> {
        let (id, mut record) = self.find(raw_id).await?;

        let Submission { mut fields, image } = submission;
        let rules: Vec<FieldRule> = R::RULES
            .iter()
            .filter(|rule| !R::IMMUTABLE.contains(&rule.name))
            .copied()
            .collect();
        let image = self.validate(&rules, &mut fields, image, Mode::Update)?;
        let patch: R::Patch = serde_json::from_value(Value::Object(fields))
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        let mut stale_keys = record.cache_keys();
        record.apply(patch, Utc::now());

        if let Some(image) = image {
            if let Some(old) = record.media().and_then(|media| media.path.clone()) {
                self.discard_blob(&old).await;
            }
            self.attach(&mut record, image).await?;
        }

        let document = db::encode(&record)?;
        self.store.put(R::KIND, Some(&id), document).await?;

        stale_keys.extend(record.cache_keys());
        self.invalidate(stale_keys).await;

        tracing::info!("{} {} updated", R::KIND, id);
        Ok(record.view(&id))
    }

    pub async fn destroy(&self, raw_id: &str) -> Result<(), ApiError> {
        let (id, record) = self.find(raw_id).await?;

        if let Some(path) = record.media().and_then(|media| media.path.as_deref()) {
            self.discard_blob(path).await;
        }
        self.store.delete(R::KIND, &id).await?;
        self.invalidate(record.cache_keys()).await;

        tracing::info!("{} {} deleted", R::KIND, id);
        Ok(())
    }

    async fn find(&self, raw_id: &str) -> Result<(EntityId, R), ApiError> {
        let id = R::KEY.parse(raw_id).ok_or(ApiError::NotFound(R::LABEL))?;
        let document = self
            .store
            .get(R::KIND, &id)
            .await?
            .ok_or(ApiError::NotFound(R::LABEL))?;
        Ok((id, db::decode(document)?))
    }

    /// Check fields and media together so the client sees every problem.
    /// Returns the upload only if this kind takes media.
    fn validate(
        &self,
        rules: &[FieldRule],
        fields: &mut Map<String, Value>,
        image: Option<Upload>,
        mode: Mode,
    ) -> Result<Option<Upload>, FieldErrors> {
        let mut errors = validation::validate(rules, fields, mode).err().unwrap_or_default();
        let image = R::MEDIA.and_then(|policy| image.map(|upload| (policy, upload)));
        if let Some((policy, upload)) = &image {
            validation::validate_image("image", &policy.rule, upload, &mut errors);
        }
        errors.into_result()?;
        Ok(image.map(|(_, upload)| upload))
    }

    async fn attach(&self, record: &mut R, image: Upload) -> Result<(), ApiError> {
        let (Some(policy), Some(media)) = (R::MEDIA, record.media_mut()) else {
            return Ok(());
        };
        let blob = self
            .blobs
            .upload(policy.prefix, &image.extension(), image.content, &image.content_type)
            .await?;
        tracing::info!("{} image uploaded to {}", R::KIND, blob.path);
        media.attach(blob);
        Ok(())
    }

    /// Best-effort removal; failures are logged and swallowed.
    async fn discard_blob(&self, path: &str) {
        match self.blobs.exists(path).await {
            Ok(false) => {}
            Ok(true) => match self.blobs.delete(path).await {
                Ok(()) => tracing::info!("deleted image {}", path),
                Err(e) => tracing::warn!("could not delete image {}: {}", path, e),
            },
            Err(e) => tracing::warn!("could not check image {}: {}", path, e),
        }
    }

    async fn invalidate(&self, keys: Vec<String>) {
        self.cache.forget(&list_cache_key(R::KIND, None)).await;
        for key in keys {
            self.cache.forget(&key).await;
        }
    }
}
