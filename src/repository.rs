use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::DocshareError;
use crate::models::{Document, NewDocument, SharedDocument, User};
use crate::types::{AccessLevel, GrantOutcome};

/// Persistence of users, documents and grants.
///
/// Every permission decision reads through this trait at the moment it is
/// made, so implementations must not cache grants.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Creates the user on first sign-in, refreshes the display name after.
    async fn upsert_user(
        &self,
        email: &str,
        name: Option<&str>,
    ) -> Result<User, DocshareError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, DocshareError>;

    async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<User>, DocshareError>;

    async fn set_admin(
        &self,
        email: &str,
        is_admin: bool,
    ) -> Result<Option<User>, DocshareError>;

    async fn insert_document(
        &self,
        doc: NewDocument,
    ) -> Result<Document, DocshareError>;

    async fn find_document(
        &self,
        id: Uuid,
    ) -> Result<Option<Document>, DocshareError>;

    /// Newest first
    async fn owned_documents(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<Document>, DocshareError>;

    /// Grants held by the user with the document and its owner, newest
    /// document first
    async fn shared_with(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(SharedDocument, Document, User)>, DocshareError>;

    async fn find_grant(
        &self,
        document_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<SharedDocument>, DocshareError>;

    /// Creates the grant or replaces the level of the existing one
    async fn upsert_grant(
        &self,
        document_id: Uuid,
        user_id: Uuid,
        access: AccessLevel,
    ) -> Result<GrantOutcome, DocshareError>;

    /// Returns false when there was no grant to delete
    async fn delete_grant(
        &self,
        document_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, DocshareError>;

    /// Grants on a document with their grantees
    async fn grants_for(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<(SharedDocument, User)>, DocshareError>;
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    documents: HashMap<Uuid, Document>,
    grants: HashMap<(Uuid, Uuid), SharedDocument>,
}

/// Repository kept in process memory, used when no database is configured
/// and in tests.
#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn upsert_user(
        &self,
        email: &str,
        name: Option<&str>,
    ) -> Result<User, DocshareError> {
        let mut state = self.state.lock().await;
        if let Some(user) = state.users.values_mut().find(|u| u.email == email)
        {
            user.name = name.map(str::to_string);
            return Ok(user.clone());
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.map(str::to_string),
            is_admin: false,
            created_at: Utc::now(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, DocshareError> {
        let state = self.state.lock().await;
        Ok(state.users.get(&id).cloned())
    }

    async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<User>, DocshareError> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn set_admin(
        &self,
        email: &str,
        is_admin: bool,
    ) -> Result<Option<User>, DocshareError> {
        let mut state = self.state.lock().await;
        let user = state.users.values_mut().find(|u| u.email == email);
        Ok(user.map(|user| {
            user.is_admin = is_admin;
            user.clone()
        }))
    }

    async fn insert_document(
        &self,
        doc: NewDocument,
    ) -> Result<Document, DocshareError> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&doc.owner_id) {
            return Err(DocshareError::internal("Document owner does not exist"));
        }
        if state.documents.values().any(|d| d.storage_key == doc.storage_key) {
            return Err(DocshareError::internal("Duplicate storage key"));
        }
        let document = Document {
            id: doc.id,
            owner_id: doc.owner_id,
            file_name: doc.file_name,
            storage_key: doc.storage_key,
            content_type: doc.content_type,
            decryption_key: doc.decryption_key,
            encrypted_metadata: doc.encrypted_metadata,
            created_at: Utc::now(),
        };
        state.documents.insert(document.id, document.clone());
        Ok(document)
    }

    async fn find_document(
        &self,
        id: Uuid,
    ) -> Result<Option<Document>, DocshareError> {
        let state = self.state.lock().await;
        Ok(state.documents.get(&id).cloned())
    }

    async fn owned_documents(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<Document>, DocshareError> {
        let state = self.state.lock().await;
        let mut docs: Vec<Document> = state
            .documents
            .values()
            .filter(|d| d.owner_id == owner_id)
            .cloned()
            .collect();
        docs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(docs)
    }

    async fn shared_with(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(SharedDocument, Document, User)>, DocshareError> {
        let state = self.state.lock().await;
        let mut shared = Vec::new();
        for grant in state.grants.values().filter(|g| g.user_id == user_id) {
            let Some(doc) = state.documents.get(&grant.document_id) else {
                continue;
            };
            let Some(owner) = state.users.get(&doc.owner_id) else {
                continue;
            };
            shared.push((grant.clone(), doc.clone(), owner.clone()));
        }
        shared.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at));
        Ok(shared)
    }

    async fn find_grant(
        &self,
        document_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<SharedDocument>, DocshareError> {
        let state = self.state.lock().await;
        Ok(state.grants.get(&(document_id, user_id)).cloned())
    }

    async fn upsert_grant(
        &self,
        document_id: Uuid,
        user_id: Uuid,
        access: AccessLevel,
    ) -> Result<GrantOutcome, DocshareError> {
        let mut state = self.state.lock().await;
        if !state.documents.contains_key(&document_id)
            || !state.users.contains_key(&user_id)
        {
            return Err(DocshareError::internal(
                "Grant references a missing row",
            ));
        }
        let now = Utc::now();
        match state.grants.get_mut(&(document_id, user_id)) {
            Some(grant) => {
                grant.access = access.as_str().to_string();
                grant.updated_at = now;
                Ok(GrantOutcome::Updated)
            }
            None => {
                let grant = SharedDocument {
                    document_id,
                    user_id,
                    access: access.as_str().to_string(),
                    created_at: now,
                    updated_at: now,
                };
                state.grants.insert((document_id, user_id), grant);
                Ok(GrantOutcome::Created)
            }
        }
    }

    async fn delete_grant(
        &self,
        document_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, DocshareError> {
        let mut state = self.state.lock().await;
        Ok(state.grants.remove(&(document_id, user_id)).is_some())
    }

    async fn grants_for(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<(SharedDocument, User)>, DocshareError> {
        let state = self.state.lock().await;
        let mut grants: Vec<(SharedDocument, User)> = state
            .grants
            .values()
            .filter(|g| g.document_id == document_id)
            .filter_map(|g| {
                state.users.get(&g.user_id).map(|u| (g.clone(), u.clone()))
            })
            .collect();
        grants.sort_by(|a, b| a.1.email.cmp(&b.1.email));
        Ok(grants)
    }
}
