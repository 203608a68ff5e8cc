use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rand::distributions::Alphanumeric;
use rand::Rng;
use thiserror::Error;
use uuid::Uuid;

use crate::schema::*;

pub const PUBLIC_UUID_LENGTH: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Draft,
    UnderReview,
    Published,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Draft => "draft",
            FileStatus::UnderReview => "under_review",
            FileStatus::Published => "published",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(FileStatus::Draft),
            "under_review" => Some(FileStatus::UnderReview),
            "published" => Some(FileStatus::Published),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("only draft files can be published")]
    NotDraft,
    #[error("cannot publish a file with empty source")]
    EmptySource,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub initials: Option<String>,
    pub affiliation: Option<String>,
    pub email_verified: bool,
    pub verification_token_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub initials: Option<String>,
    pub affiliation: Option<String>,
    pub verification_token_hash: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = files)]
#[diesel(belongs_to(User, foreign_key = owner_id))]
pub struct File {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub abstract_text: Option<String>,
    pub keywords: Option<String>,
    pub status: String,
    pub source: String,
    pub published_at: Option<DateTime<Utc>>,
    pub public_uuid: Option<String>,
    pub permalink_slug: Option<String>,
    pub version: i32,
    pub prev_version_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub last_edited_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl File {
    pub fn file_status(&self) -> FileStatus {
        FileStatus::parse(&self.status).unwrap_or(FileStatus::Draft)
    }

    pub fn is_published(&self) -> bool {
        self.file_status() == FileStatus::Published
    }

    /// A file is publishable exactly when it is a draft with non-empty source.
    pub fn can_publish(&self) -> bool {
        self.file_status() == FileStatus::Draft && !self.source.trim().is_empty()
    }

    /// Transition draft -> published, stamping `published_at` and assigning a
    /// fresh `public_uuid`. The uuid is assigned exactly once; a second call
    /// fails because the file is no longer a draft.
    pub fn publish(&mut self) -> Result<(), PublishError> {
        match self.file_status() {
            FileStatus::Draft => {}
            _ => return Err(PublishError::NotDraft),
        }
        if self.source.trim().is_empty() {
            return Err(PublishError::EmptySource);
        }

        self.status = FileStatus::Published.as_str().to_string();
        self.published_at = Some(Utc::now());
        self.public_uuid = Some(generate_public_uuid());
        Ok(())
    }
}

/// Short alphanumeric identifier used in public preprint URLs. Uniqueness is
/// enforced by the database; callers retry with a fresh value on collision.
pub fn generate_public_uuid() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PUBLIC_UUID_LENGTH)
        .map(char::from)
        .collect()
}

#[derive(Debug, Insertable)]
#[diesel(table_name = files)]
pub struct NewFile {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub abstract_text: Option<String>,
    pub keywords: Option<String>,
    pub status: String,
    pub source: String,
    pub version: i32,
    pub prev_version_id: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = tags)]
#[diesel(belongs_to(User))]
pub struct Tag {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = tags)]
pub struct NewTag {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub color: Option<String>,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Queryable, Associations)]
#[diesel(table_name = file_tags)]
#[diesel(belongs_to(File))]
#[diesel(belongs_to(Tag))]
#[diesel(primary_key(file_id, tag_id))]
pub struct FileTag {
    pub file_id: Uuid,
    pub tag_id: Uuid,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = file_tags)]
pub struct NewFileTag {
    pub file_id: Uuid,
    pub tag_id: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = file_assets)]
#[diesel(belongs_to(File))]
pub struct FileAsset {
    pub id: Uuid,
    pub file_id: Uuid,
    pub owner_id: Uuid,
    pub filename: String,
    pub mime_type: String,
    pub content: String,
    pub uploaded_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = file_assets)]
pub struct NewFileAsset {
    pub id: Uuid,
    pub file_id: Uuid,
    pub owner_id: Uuid,
    pub filename: String,
    pub mime_type: String,
    pub content: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = file_settings)]
pub struct FileSettings {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_id: Uuid,
    pub background: String,
    pub font_size: String,
    pub font_family: String,
    pub line_height: String,
    pub margin_width: String,
    pub columns: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = file_settings)]
pub struct NewFileSettings {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_id: Uuid,
    pub background: String,
    pub font_size: String,
    pub font_family: String,
    pub line_height: String,
    pub margin_width: String,
    #[diesel(column_name = columns_)]
    pub columns: i32,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = user_settings)]
pub struct UserSettings {
    pub id: Uuid,
    pub user_id: Uuid,
    pub background: String,
    pub font_size: String,
    pub font_family: String,
    pub line_height: String,
    pub margin_width: String,
    pub columns: i32,
    pub email_notifications: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = user_settings)]
pub struct NewUserSettings {
    pub id: Uuid,
    pub user_id: Uuid,
    pub background: String,
    pub font_size: String,
    pub font_family: String,
    pub line_height: String,
    pub margin_width: String,
    #[diesel(column_name = columns_)]
    pub columns: i32,
    pub email_notifications: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = annotations)]
#[diesel(belongs_to(File))]
pub struct Annotation {
    pub id: Uuid,
    pub file_id: Uuid,
    pub owner_id: Uuid,
    pub kind: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = annotations)]
pub struct NewAnnotation {
    pub id: Uuid,
    pub file_id: Uuid,
    pub owner_id: Uuid,
    pub kind: String,
    pub position: i32,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = annotation_messages)]
#[diesel(belongs_to(Annotation))]
pub struct AnnotationMessage {
    pub id: Uuid,
    pub annotation_id: Uuid,
    pub owner_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = annotation_messages)]
pub struct NewAnnotationMessage {
    pub id: Uuid,
    pub annotation_id: Uuid,
    pub owner_id: Uuid,
    pub content: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = signups)]
pub struct Signup {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub institution: Option<String>,
    pub research_area: Option<String>,
    pub interest_level: Option<String>,
    pub status: String,
    pub unsubscribe_token_hash: String,
    pub source: String,
    pub consent: bool,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = signups)]
pub struct NewSignup {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub institution: Option<String>,
    pub research_area: Option<String>,
    pub interest_level: Option<String>,
    pub status: String,
    pub unsubscribe_token_hash: String,
    pub source: String,
    pub consent: bool,
}
