use diesel::prelude::*;

use crate::schema;
use crate::types::AccessLevel;

#[derive(serde::Serialize, Selectable, Queryable, Clone, Debug)]
#[diesel(table_name = schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: uuid::Uuid,
    pub email: String,
    pub name: Option<String>,
    pub is_admin: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = schema::users)]
pub struct NewUser<'a> {
    pub id: uuid::Uuid,
    pub email: &'a str,
    pub name: Option<&'a str>,
}

#[derive(Selectable, Queryable, Clone, Debug)]
#[diesel(table_name = schema::documents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Document {
    pub id: uuid::Uuid,
    pub owner_id: uuid::Uuid,
    pub file_name: String,
    pub storage_key: String,
    pub content_type: String,
    pub decryption_key: Option<String>,
    pub encrypted_metadata: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Insertable, Clone, Debug)]
#[diesel(table_name = schema::documents)]
pub struct NewDocument {
    pub id: uuid::Uuid,
    pub owner_id: uuid::Uuid,
    pub file_name: String,
    pub storage_key: String,
    pub content_type: String,
    pub decryption_key: Option<String>,
    pub encrypted_metadata: Option<String>,
}

#[derive(Selectable, Queryable, Clone, Debug)]
#[diesel(table_name = schema::shared_documents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SharedDocument {
    pub document_id: uuid::Uuid,
    pub user_id: uuid::Uuid,
    pub access: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl SharedDocument {
    /// None when the column holds something other than a known level
    pub fn level(&self) -> Option<AccessLevel> {
        AccessLevel::parse(&self.access)
    }
}

#[derive(Insertable)]
#[diesel(table_name = schema::shared_documents)]
pub struct NewSharedDocument<'a> {
    pub document_id: uuid::Uuid,
    pub user_id: uuid::Uuid,
    pub access: &'a str,
}
