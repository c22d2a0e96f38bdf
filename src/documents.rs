use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use uuid::Uuid;

use crate::error::DocshareError;
use crate::models::{Document, NewDocument};
use crate::objects::{document_key, ObjectStore};
use crate::protocol::DashboardResponse;
use crate::redaction::RedactionService;
use crate::repository::Repository;
use crate::sharing::SharingApi;
use crate::types::{DocumentInfo, Session, Severity, SharedDocumentInfo};

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// File received from an upload form
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Upload {
    pub fn validate(&self) -> Result<(), DocshareError> {
        if self.data.is_empty() {
            return Err(DocshareError::bad_request("File is required"));
        }
        if self.file_name.trim().is_empty() {
            return Err(DocshareError::bad_request("File name is required"));
        }
        if self.content_type != PDF_CONTENT_TYPE {
            return Err(DocshareError::bad_request(
                "Only PDF files are allowed",
            ));
        }
        Ok(())
    }
}

pub struct DocumentsApi {
    repo: Arc<dyn Repository>,
    objects: Arc<dyn ObjectStore>,
    redaction: Arc<dyn RedactionService>,
    sharing: Arc<SharingApi>,
    presign_ttl: Duration,
}

impl DocumentsApi {
    pub fn new(
        repo: Arc<dyn Repository>,
        objects: Arc<dyn ObjectStore>,
        redaction: Arc<dyn RedactionService>,
        sharing: Arc<SharingApi>,
        presign_ttl: Duration,
    ) -> Self {
        Self {
            repo,
            objects,
            redaction,
            sharing,
            presign_ttl,
        }
    }

    /// Stores the upload, redacted first when a severity is given. The
    /// object is removed again if the document row cannot be created.
    pub async fn upload(
        &self,
        session: &Session,
        upload: Upload,
        severity: Option<Severity>,
    ) -> Result<Document, DocshareError> {
        upload.validate()?;
        let Upload {
            file_name,
            content_type,
            data,
        } = upload;

        let (data, content_type, decryption_key, encrypted_metadata) =
            match severity {
                Some(severity) => {
                    let redacted = self
                        .redaction
                        .redact(&file_name, &content_type, data, severity)
                        .await?;
                    (
                        redacted.data,
                        redacted.content_type,
                        Some(redacted.decryption_key),
                        Some(redacted.encrypted_metadata),
                    )
                }
                None => (data, content_type, None, None),
            };

        let key = document_key(session.user_id, &file_name);
        let size = data.len();
        self.objects.put(&key, data, &content_type).await?;

        let new_doc = NewDocument {
            id: Uuid::new_v4(),
            owner_id: session.user_id,
            file_name,
            storage_key: key.clone(),
            content_type,
            decryption_key,
            encrypted_metadata,
        };
        let doc = match self.repo.insert_document(new_doc).await {
            Ok(doc) => doc,
            Err(err) => {
                if let Err(cleanup) = self.objects.delete(&key).await {
                    error!("documents: orphaned object {}: {}", key, cleanup);
                }
                return Err(err);
            }
        };
        info!(
            "documents: {} uploaded {} ({} bytes, redacted: {})",
            session.email,
            doc.id,
            size,
            doc.decryption_key.is_some()
        );
        Ok(doc)
    }

    pub async fn dashboard(
        &self,
        session: &Session,
    ) -> Result<DashboardResponse, DocshareError> {
        let owned = self
            .repo
            .owned_documents(session.user_id)
            .await?
            .iter()
            .map(DocumentInfo::from)
            .collect();
        let shared = self
            .repo
            .shared_with(session.user_id)
            .await?
            .into_iter()
            .filter_map(|(grant, doc, owner)| {
                Some(SharedDocumentInfo {
                    access: grant.level()?,
                    document: DocumentInfo::from(&doc),
                    owner_email: owner.email,
                    owner_name: owner.name,
                })
            })
            .collect();
        Ok(DashboardResponse { owned, shared })
    }

    /// Presigned url for the stored object, for any user with access
    pub async fn open(
        &self,
        session: &Session,
        document_id: Uuid,
    ) -> Result<(String, Duration), DocshareError> {
        let (doc, access) = self
            .sharing
            .document_access(document_id, session.user_id)
            .await?;
        if !access.can_open() {
            return Err(DocshareError::forbidden(
                "You do not have access to this document",
            ));
        }
        let url = self.objects.presign(&doc.storage_key, self.presign_ttl)?;
        Ok((url, self.presign_ttl))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{MemoryObjectStore, UrlSigner};
    use crate::protocol::ErrorCode;
    use crate::repository::MemoryRepository;
    use crate::sharing::tests::{DownRedaction, FakeRedaction, REDACTED_PREFIX};
    use crate::types::AccessLevel;

    struct Fixture {
        repo: Arc<MemoryRepository>,
        objects: Arc<MemoryObjectStore>,
        sharing: Arc<SharingApi>,
        documents: DocumentsApi,
        owner: Session,
        guest: Session,
    }

    async fn fixture_with(redaction: Arc<dyn RedactionService>) -> Fixture {
        let repo = Arc::new(MemoryRepository::new());
        let objects = Arc::new(MemoryObjectStore::new(UrlSigner::new(
            "secret",
            "http://localhost:3000",
        )));
        let sharing = Arc::new(SharingApi::new(
            repo.clone(),
            objects.clone(),
            redaction.clone(),
        ));
        let documents = DocumentsApi::new(
            repo.clone(),
            objects.clone(),
            redaction,
            sharing.clone(),
            Duration::from_secs(60),
        );
        let owner = Session::from(
            repo.upsert_user("owner@example.com", None).await.unwrap(),
        );
        let guest = Session::from(
            repo.upsert_user("guest@example.com", None).await.unwrap(),
        );
        Fixture {
            repo,
            objects,
            sharing,
            documents,
            owner,
            guest,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(Arc::new(FakeRedaction)).await
    }

    fn pdf(name: &str) -> Upload {
        Upload {
            file_name: name.to_string(),
            content_type: PDF_CONTENT_TYPE.to_string(),
            data: b"%PDF-1.7 secret".to_vec(),
        }
    }

    fn severity() -> Option<Severity> {
        Some(Severity::try_from(60).unwrap())
    }

    #[tokio::test]
    async fn upload_rejects_invalid_files() {
        let f = fixture().await;
        let mut empty = pdf("a.pdf");
        empty.data.clear();
        let mut text = pdf("a.txt");
        text.content_type = "text/plain".to_string();
        let unnamed = pdf(" ");

        for upload in [empty, text, unnamed] {
            let err = f
                .documents
                .upload(&f.owner, upload, None)
                .await
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::BadRequest);
        }
        assert!(f.repo.owned_documents(f.owner.user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn plain_upload_stores_original_bytes() {
        let f = fixture().await;
        let doc = f
            .documents
            .upload(&f.owner, pdf("my report.pdf"), None)
            .await
            .unwrap();
        assert_eq!(doc.file_name, "my report.pdf");
        assert!(doc
            .storage_key
            .starts_with(&format!("{}/", f.owner.user_id)));
        assert!(doc.storage_key.ends_with("-my_report.pdf"));
        assert!(doc.decryption_key.is_none());

        let object = f.objects.get(&doc.storage_key).await.unwrap();
        assert_eq!(object.data, b"%PDF-1.7 secret");
    }

    #[tokio::test]
    async fn redacted_upload_keeps_reconstruction_material() {
        let f = fixture().await;
        let doc = f
            .documents
            .upload(&f.owner, pdf("report.pdf"), severity())
            .await
            .unwrap();
        assert_eq!(doc.decryption_key.as_deref(), Some("key-60"));
        assert!(doc.encrypted_metadata.is_some());

        let object = f.objects.get(&doc.storage_key).await.unwrap();
        assert!(object.data.starts_with(REDACTED_PREFIX));
    }

    #[tokio::test]
    async fn redaction_failure_stores_nothing() {
        let f = fixture_with(Arc::new(DownRedaction)).await;
        let err = f
            .documents
            .upload(&f.owner, pdf("report.pdf"), severity())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UpstreamError);
        assert!(f.repo.owned_documents(f.owner.user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dashboard_lists_owned_and_shared() {
        let f = fixture().await;
        let first = f
            .documents
            .upload(&f.owner, pdf("first.pdf"), None)
            .await
            .unwrap();
        let second = f
            .documents
            .upload(&f.owner, pdf("second.pdf"), severity())
            .await
            .unwrap();
        f.sharing
            .grant(&f.owner, second.id, "guest@example.com", AccessLevel::Redacted)
            .await
            .unwrap();

        let owner_view = f.documents.dashboard(&f.owner).await.unwrap();
        let owned: Vec<Uuid> = owner_view.owned.iter().map(|d| d.id).collect();
        assert_eq!(owned.len(), 2);
        assert!(owned.contains(&first.id) && owned.contains(&second.id));
        assert!(owner_view.shared.is_empty());

        let guest_view = f.documents.dashboard(&f.guest).await.unwrap();
        assert!(guest_view.owned.is_empty());
        assert_eq!(guest_view.shared.len(), 1);
        let shared = &guest_view.shared[0];
        assert_eq!(shared.document.id, second.id);
        assert!(shared.document.redacted);
        assert_eq!(shared.owner_email, "owner@example.com");
        assert_eq!(shared.access, AccessLevel::Redacted);
    }

    #[tokio::test]
    async fn dashboard_lists_newest_first() {
        let f = fixture().await;
        let mut uploaded = Vec::new();
        for i in 0..4 {
            let doc = f
                .documents
                .upload(&f.owner, pdf(&format!("doc-{}.pdf", i)), None)
                .await
                .unwrap();
            f.sharing
                .grant(&f.owner, doc.id, "guest@example.com", AccessLevel::Original)
                .await
                .unwrap();
            uploaded.push(doc.id);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        uploaded.reverse();

        let owner_view = f.documents.dashboard(&f.owner).await.unwrap();
        let owned: Vec<Uuid> = owner_view.owned.iter().map(|d| d.id).collect();
        assert_eq!(owned, uploaded);

        let guest_view = f.documents.dashboard(&f.guest).await.unwrap();
        let shared: Vec<Uuid> =
            guest_view.shared.iter().map(|s| s.document.id).collect();
        assert_eq!(shared, uploaded);
    }

    #[tokio::test]
    async fn open_requires_some_access() {
        let f = fixture().await;
        let doc = f
            .documents
            .upload(&f.owner, pdf("report.pdf"), severity())
            .await
            .unwrap();

        let (url, ttl) = f.documents.open(&f.owner, doc.id).await.unwrap();
        assert!(url.contains(&doc.storage_key));
        assert_eq!(ttl, Duration::from_secs(60));

        let err = f.documents.open(&f.guest, doc.id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);

        f.sharing
            .grant(&f.owner, doc.id, "guest@example.com", AccessLevel::Redacted)
            .await
            .unwrap();
        assert!(f.documents.open(&f.guest, doc.id).await.is_ok());

        let err = f
            .documents
            .open(&f.guest, Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
