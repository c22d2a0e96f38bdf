use std::sync::Arc;

use log::{info, trace, warn};
use uuid::Uuid;

use crate::error::DocshareError;
use crate::models::{Document, SharedDocument};
use crate::objects::ObjectStore;
use crate::protocol::ErrorCode;
use crate::redaction::RedactionService;
use crate::repository::Repository;
use crate::types::{Access, AccessLevel, GrantInfo, GrantOutcome, Session};

// Access model: the owner of a document has full rights and is the only one
// who may change its grants. Every other user is limited to the level of
// their grant, re-read from the repository on each request.

/// Derives what `user_id` may do with `document` from its grant row
pub fn resolve_access(
    document: &Document,
    user_id: Uuid,
    grant: Option<&SharedDocument>,
) -> Access {
    if document.owner_id == user_id {
        return Access::Owner;
    }
    let Some(grant) = grant else {
        return Access::Denied;
    };
    if grant.document_id != document.id || grant.user_id != user_id {
        return Access::Denied;
    }
    match grant.level() {
        Some(AccessLevel::Original) => Access::GrantedOriginal,
        Some(AccessLevel::Redacted) => Access::GrantedRedacted,
        None => {
            warn!(
                "sharing: unknown access level {:?} on {}/{}",
                grant.access, grant.document_id, grant.user_id
            );
            Access::Denied
        }
    }
}

/// File name offered for a reconstructed document
pub fn restored_file_name(file_name: &str) -> String {
    let name = file_name.strip_prefix("redacted_").unwrap_or(file_name);
    format!("restored_{}", name)
}

pub struct OriginalFile {
    pub data: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

pub struct SharingApi {
    repo: Arc<dyn Repository>,
    objects: Arc<dyn ObjectStore>,
    redaction: Arc<dyn RedactionService>,
}

impl SharingApi {
    pub fn new(
        repo: Arc<dyn Repository>,
        objects: Arc<dyn ObjectStore>,
        redaction: Arc<dyn RedactionService>,
    ) -> Self {
        Self {
            repo,
            objects,
            redaction,
        }
    }

    async fn get_document(&self, id: Uuid) -> Result<Document, DocshareError> {
        match self.repo.find_document(id).await? {
            Some(doc) => Ok(doc),
            None => Err(DocshareError::not_found("Document not found")),
        }
    }

    async fn get_owned_document(
        &self,
        session: &Session,
        id: Uuid,
    ) -> Result<Document, DocshareError> {
        let doc = self.get_document(id).await?;
        if doc.owner_id != session.user_id {
            return Err(DocshareError::forbidden(
                "Only the owner can manage sharing of this document",
            ));
        }
        Ok(doc)
    }

    /// Loads the document and the caller's access to it. Unknown documents
    /// are `NotFound`.
    pub async fn document_access(
        &self,
        document_id: Uuid,
        user_id: Uuid,
    ) -> Result<(Document, Access), DocshareError> {
        let doc = self.get_document(document_id).await?;
        let access = if doc.owner_id == user_id {
            Access::Owner
        } else {
            let grant = self.repo.find_grant(document_id, user_id).await?;
            resolve_access(&doc, user_id, grant.as_ref())
        };
        Ok((doc, access))
    }

    /// Access of `user_id` to the document, `Denied` if it does not exist
    pub async fn check_access(
        &self,
        document_id: Uuid,
        user_id: Uuid,
    ) -> Result<Access, DocshareError> {
        match self.document_access(document_id, user_id).await {
            Ok((_, access)) => Ok(access),
            Err(err) if err.code == ErrorCode::NotFound => {
                Ok(Access::Denied)
            }
            Err(err) => Err(err),
        }
    }

    /// Creates or replaces the grant of `email` on the caller's document
    pub async fn grant(
        &self,
        session: &Session,
        document_id: Uuid,
        email: &str,
        level: AccessLevel,
    ) -> Result<GrantOutcome, DocshareError> {
        let doc = self.get_owned_document(session, document_id).await?;
        let email = email.trim().to_lowercase();
        let Some(grantee) = self.repo.find_user_by_email(&email).await? else {
            return Err(DocshareError::not_found(
                "User with that email does not exist",
            ));
        };
        if grantee.id == doc.owner_id {
            return Err(DocshareError::invalid_grant(
                "You cannot share a document with yourself",
            ));
        }
        let outcome = self.repo.upsert_grant(doc.id, grantee.id, level).await?;
        info!(
            "sharing: {} {:?} {} to {} ({:?})",
            session.email,
            outcome,
            doc.id,
            grantee.email,
            level
        );
        Ok(outcome)
    }

    pub async fn revoke(
        &self,
        session: &Session,
        document_id: Uuid,
        email: &str,
    ) -> Result<(), DocshareError> {
        let doc = self.get_owned_document(session, document_id).await?;
        let email = email.trim().to_lowercase();
        let Some(grantee) = self.repo.find_user_by_email(&email).await? else {
            return Err(DocshareError::not_found("Grant not found"));
        };
        if !self.repo.delete_grant(doc.id, grantee.id).await? {
            return Err(DocshareError::not_found("Grant not found"));
        }
        info!("sharing: {} revoked {} from {}", session.email, doc.id, email);
        Ok(())
    }

    pub async fn list_grants(
        &self,
        session: &Session,
        document_id: Uuid,
    ) -> Result<Vec<GrantInfo>, DocshareError> {
        let doc = self.get_owned_document(session, document_id).await?;
        let grants = self.repo.grants_for(doc.id).await?;
        Ok(grants
            .into_iter()
            .filter_map(|(grant, user)| {
                Some(GrantInfo {
                    access: grant.level()?,
                    user_id: user.id,
                    email: user.email,
                    name: user.name,
                    created_at: grant.created_at,
                    updated_at: grant.updated_at,
                })
            })
            .collect())
    }

    /// Reconstructs the original document for an owner or an `ORIGINAL`
    /// grantee.
    pub async fn fetch_original(
        &self,
        document_id: Uuid,
        user_id: Uuid,
    ) -> Result<OriginalFile, DocshareError> {
        let (doc, access) = self.document_access(document_id, user_id).await?;
        if !access.can_fetch_original() {
            return Err(DocshareError::forbidden(
                "You do not have permission to download the original",
            ));
        }
        trace!("sharing: fetching original {} for {}", doc.id, user_id);
        let object = self.objects.get(&doc.storage_key).await?;

        let (Some(key), Some(metadata)) =
            (&doc.decryption_key, &doc.encrypted_metadata)
        else {
            // Stored without redaction, the object is the original
            return Ok(OriginalFile {
                data: object.data,
                file_name: doc.file_name.clone(),
                content_type: object.content_type,
            });
        };

        let restored = self
            .redaction
            .unredact(
                &doc.file_name,
                &doc.content_type,
                object.data,
                key,
                metadata,
            )
            .await?;
        Ok(OriginalFile {
            data: restored.data,
            file_name: restored_file_name(&doc.file_name),
            content_type: restored
                .content_type
                .unwrap_or_else(|| doc.content_type.clone()),
        })
    }
}
