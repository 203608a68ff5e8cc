use std::collections::{HashMap, HashSet};

use anyhow::Result;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::models::File;
use crate::render::{self, MarkupRenderer};
use crate::schema::files;

/// Process-local copy of a file row plus memoized derived values. The caches
/// live and die with the entry; overwriting `source` drops all of them.
#[derive(Debug, Clone)]
pub struct FileData {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub abstract_text: Option<String>,
    pub keywords: Option<String>,
    pub status: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub last_edited_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    rendered_html: Option<(String, String)>,
    sections: Option<Vec<(String, String)>>,
    extracted_title: Option<String>,
}

impl FileData {
    pub fn from_row(row: &File) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            title: row.title.clone(),
            abstract_text: row.abstract_text.clone(),
            keywords: row.keywords.clone(),
            status: row.status.clone(),
            source: row.source.clone(),
            created_at: row.created_at,
            last_edited_at: row.last_edited_at,
            deleted_at: row.deleted_at,
            rendered_html: None,
            sections: None,
            extracted_title: None,
        }
    }

    /// Drops every derived value. Coarse on purpose: source edits invalidate
    /// the whole render, not individual sections.
    pub fn clear_cache(&mut self) {
        self.rendered_html = None;
        self.sections = None;
        self.extracted_title = None;
    }
}

pub struct CreateFileParams {
    pub owner_id: Uuid,
    pub title: String,
    pub abstract_text: Option<String>,
    pub keywords: Option<String>,
    pub status: String,
    pub source: String,
}

struct Inner {
    files: HashMap<Uuid, FileData>,
    by_owner: HashMap<Uuid, HashSet<Uuid>>,
}

/// In-memory mirror of the files table. All access is serialized behind one
/// lock; synchronization with the database happens only on explicit calls.
pub struct FileStore {
    inner: Mutex<Inner>,
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                files: HashMap::new(),
                by_owner: HashMap::new(),
            }),
        }
    }

    pub async fn create_file(&self, params: CreateFileParams) -> FileData {
        let now = Utc::now();
        let data = FileData {
            id: Uuid::new_v4(),
            owner_id: params.owner_id,
            title: params.title,
            abstract_text: params.abstract_text,
            keywords: params.keywords,
            status: params.status,
            source: params.source,
            created_at: now,
            last_edited_at: now,
            deleted_at: None,
            rendered_html: None,
            sections: None,
            extracted_title: None,
        };

        let mut inner = self.inner.lock().await;
        inner
            .by_owner
            .entry(data.owner_id)
            .or_default()
            .insert(data.id);
        inner.files.insert(data.id, data.clone());
        data
    }

    pub async fn get_file(&self, id: Uuid) -> Option<FileData> {
        let inner = self.inner.lock().await;
        inner
            .files
            .get(&id)
            .filter(|data| data.deleted_at.is_none())
            .cloned()
    }

    pub async fn list_files(&self, owner_id: Uuid) -> Vec<FileData> {
        let inner = self.inner.lock().await;
        let Some(ids) = inner.by_owner.get(&owner_id) else {
            return Vec::new();
        };
        let mut result: Vec<FileData> = ids
            .iter()
            .filter_map(|id| inner.files.get(id))
            .filter(|data| data.deleted_at.is_none())
            .cloned()
            .collect();
        result.sort_by(|a, b| b.last_edited_at.cmp(&a.last_edited_at));
        result
    }

    /// Overwrites the source and invalidates every cached derived value.
    pub async fn update_source(&self, id: Uuid, source: String) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(data) = inner
            .files
            .get_mut(&id)
            .filter(|data| data.deleted_at.is_none())
        else {
            return false;
        };
        data.source = source;
        data.last_edited_at = Utc::now();
        data.clear_cache();
        true
    }

    /// Soft delete: the entry stays in the map, reads filter it out.
    pub async fn delete_file(&self, id: Uuid) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(data) = inner
            .files
            .get_mut(&id)
            .filter(|data| data.deleted_at.is_none())
        else {
            return false;
        };
        data.deleted_at = Some(Utc::now());
        true
    }

    /// Copies source/owner/status under the lock, then releases it before
    /// delegating to `create_file`, which takes the lock itself.
    pub async fn duplicate_file(&self, id: Uuid) -> Option<FileData> {
        let params = {
            let inner = self.inner.lock().await;
            let data = inner
                .files
                .get(&id)
                .filter(|data| data.deleted_at.is_none())?;
            CreateFileParams {
                owner_id: data.owner_id,
                title: format!("{} (copy)", data.title),
                abstract_text: data.abstract_text.clone(),
                keywords: data.keywords.clone(),
                status: data.status.clone(),
                source: data.source.clone(),
            }
        };

        Some(self.create_file(params).await)
    }

    /// Rendered HTML, memoized per file. The cache key records the handrails
    /// flag and whether an asset resolver was supplied, so a render with
    /// resolved assets is never served for a request without them.
    pub async fn rendered_html(
        &self,
        id: Uuid,
        renderer: &dyn MarkupRenderer,
        handrails: bool,
        assets: Option<&HashMap<String, String>>,
    ) -> Result<Option<String>> {
        let cache_key = format!("handrails={handrails};resolver={}", assets.is_some());

        let mut inner = self.inner.lock().await;
        let Some(data) = inner
            .files
            .get_mut(&id)
            .filter(|data| data.deleted_at.is_none())
        else {
            return Ok(None);
        };

        if let Some((key, html)) = data.rendered_html.as_ref() {
            if *key == cache_key {
                return Ok(Some(html.clone()));
            }
        }

        let html = renderer.render(&data.source, handrails, assets).await?;
        data.rendered_html = Some((cache_key, html.clone()));
        Ok(Some(html))
    }

    /// Per-section HTML. Section bodies come from the source split; the whole
    /// section map is computed and cached on first access.
    pub async fn section_html(
        &self,
        id: Uuid,
        section: &str,
        renderer: &dyn MarkupRenderer,
    ) -> Result<Option<String>> {
        let mut inner = self.inner.lock().await;
        let Some(data) = inner
            .files
            .get_mut(&id)
            .filter(|data| data.deleted_at.is_none())
        else {
            return Ok(None);
        };

        if data.sections.is_none() {
            let mut rendered = Vec::new();
            for (name, body) in render::split_sections(&data.source) {
                let wrapped = format!("{}{}{}", render::RSM_PREFIX, body, render::RSM_SUFFIX);
                let html = renderer.render(&wrapped, false, None).await?;
                rendered.push((name, html));
            }
            data.sections = Some(rendered);
        }

        Ok(data
            .sections
            .as_ref()
            .and_then(|sections| {
                sections
                    .iter()
                    .find(|(name, _)| name == section)
                    .map(|(_, html)| html.clone())
            }))
    }

    /// Title extracted from the source, memoized; falls back to the stored
    /// title when the source yields nothing.
    pub async fn display_title(&self, id: Uuid) -> Option<String> {
        let mut inner = self.inner.lock().await;
        let data = inner
            .files
            .get_mut(&id)
            .filter(|data| data.deleted_at.is_none())?;

        if data.extracted_title.is_none() {
            data.extracted_title = render::extract_title(&data.source);
        }
        Some(
            data.extracted_title
                .clone()
                .unwrap_or_else(|| data.title.clone()),
        )
    }

    /// Mirrors a freshly written database row into the map, replacing any
    /// stale entry. Used by write paths that persist first.
    pub async fn upsert_row(&self, row: &File) {
        let mut inner = self.inner.lock().await;
        let source_changed = inner
            .files
            .get(&row.id)
            .map(|existing| existing.source != row.source)
            .unwrap_or(true);

        let mut data = FileData::from_row(row);
        if !source_changed {
            if let Some(existing) = inner.files.get(&row.id) {
                data.rendered_html = existing.rendered_html.clone();
                data.sections = existing.sections.clone();
                data.extracted_title = existing.extracted_title.clone();
            }
        }

        inner.by_owner.entry(row.owner_id).or_default().insert(row.id);
        inner.files.insert(row.id, data);
    }

    /// Wipes the mirror and rebuilds it from a full table scan. All caches
    /// are lost; a crash mid-rebuild leaves the mirror empty, not partial.
    pub async fn sync_from_database(&self, conn: &mut PgConnection) -> Result<usize> {
        let rows: Vec<File> = files::table.load(conn)?;

        let mut inner = self.inner.lock().await;
        inner.files.clear();
        inner.by_owner.clear();
        for row in &rows {
            inner.by_owner.entry(row.owner_id).or_default().insert(row.id);
            inner.files.insert(row.id, FileData::from_row(row));
        }
        info!(count = rows.len(), "file mirror rebuilt from database");
        Ok(rows.len())
    }

    /// Upserts every in-memory entry back into the files table. Publication
    /// fields are deliberately untouched: they are owned by the database
    /// write path, never by the mirror.
    pub async fn sync_to_database(&self, conn: &mut PgConnection) -> Result<usize> {
        let inner = self.inner.lock().await;
        let mut written = 0usize;
        for data in inner.files.values() {
            diesel::insert_into(files::table)
                .values((
                    files::id.eq(data.id),
                    files::owner_id.eq(data.owner_id),
                    files::title.eq(&data.title),
                    files::abstract_text.eq(&data.abstract_text),
                    files::keywords.eq(&data.keywords),
                    files::status.eq(&data.status),
                    files::source.eq(&data.source),
                    files::version.eq(1),
                    files::created_at.eq(data.created_at),
                    files::last_edited_at.eq(data.last_edited_at),
                    files::deleted_at.eq(data.deleted_at),
                ))
                .on_conflict(files::id)
                .do_update()
                .set((
                    files::title.eq(&data.title),
                    files::abstract_text.eq(&data.abstract_text),
                    files::keywords.eq(&data.keywords),
                    files::status.eq(&data.status),
                    files::source.eq(&data.source),
                    files::last_edited_at.eq(data.last_edited_at),
                    files::deleted_at.eq(data.deleted_at),
                ))
                .execute(conn)?;
            written += 1;
        }
        info!(count = written, "file mirror flushed to database");
        Ok(written)
    }
}
