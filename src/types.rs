use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models;

/// Level stored on a grant
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessLevel {
    Redacted,
    Original,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Redacted => "REDACTED",
            AccessLevel::Original => "ORIGINAL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "REDACTED" => Some(AccessLevel::Redacted),
            "ORIGINAL" => Some(AccessLevel::Original),
            _ => None,
        }
    }
}

/// What a user may do with a document, derived from the persisted rows
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Owner,
    GrantedOriginal,
    GrantedRedacted,
    Denied,
}

impl Access {
    pub fn can_open(&self) -> bool {
        !matches!(self, Access::Denied)
    }

    pub fn can_fetch_original(&self) -> bool {
        matches!(self, Access::Owner | Access::GrantedOriginal)
    }
}

/// Redaction levels understood by the redaction service. Higher levels
/// redact more kinds of personal data.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(try_from = "u8", into = "u8")]
pub struct Severity(u8);

impl Severity {
    pub const LEVELS: [u8; 6] = [0, 20, 40, 60, 80, 100];

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Severity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if Self::LEVELS.contains(&value) {
            Ok(Severity(value))
        } else {
            Err(format!(
                "Severity must be one of {:?}, got {}",
                Self::LEVELS,
                value
            ))
        }
    }
}

impl From<Severity> for u8 {
    fn from(severity: Severity) -> u8 {
        severity.0
    }
}

/// Authenticated caller, attached to each request by the auth middleware
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub is_admin: bool,
}

impl From<models::User> for Session {
    fn from(user: models::User) -> Self {
        Self {
            user_id: user.id,
            email: user.email,
            name: user.name,
            is_admin: user.is_admin,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub is_admin: bool,
}

impl From<models::User> for UserInfo {
    fn from(user: models::User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            is_admin: user.is_admin,
        }
    }
}

/// Document as shown to clients. Reconstruction material never leaves
/// the server.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub redacted: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&models::Document> for DocumentInfo {
    fn from(doc: &models::Document) -> Self {
        Self {
            id: doc.id,
            owner_id: doc.owner_id,
            file_name: doc.file_name.clone(),
            content_type: doc.content_type.clone(),
            redacted: doc.decryption_key.is_some(),
            created_at: doc.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SharedDocumentInfo {
    pub document: DocumentInfo,
    pub owner_email: String,
    pub owner_name: Option<String>,
    pub access: AccessLevel,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GrantInfo {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub access: AccessLevel,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    Created,
    /// Existing grant for the same pair was replaced
    Updated,
}
