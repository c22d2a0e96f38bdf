use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use base64::prelude::*;
use log::{info, trace, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{bearer_token, Authenticator, HttpIdentityProvider, IdentityProvider};
use crate::db;
use crate::documents::{DocumentsApi, Upload};
use crate::error::{internal_error, DocshareError};
use crate::objects::{
    FsObjectStore, MemoryObjectStore, ObjectStore, ObjectStoreConfig, UrlSigner,
};
use crate::postgres::PgRepository;
use crate::protocol::*;
use crate::redaction::{HttpRedactionService, RedactionConfig, RedactionService};
use crate::repository::{MemoryRepository, Repository};
use crate::sharing::SharingApi;
use crate::types::{DocumentInfo, GrantOutcome, Session, Severity};
use crate::users::UsersApi;

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u32 {
    3000
}
fn default_presign_ttl_secs() -> u64 {
    60
}
fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}
fn default_objects() -> ObjectStoreConfig {
    ObjectStoreConfig::Fs {
        root: PathBuf::from("objects"),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocshareConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u32,
    /// Base url clients use to reach this server, for presigned urls
    pub public_url: Option<String>,
    pub api_token: String,
    pub auth_url: String,
    pub signing_key: String,
    #[serde(default = "default_presign_ttl_secs")]
    pub presign_ttl_secs: u64,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Without a database everything is kept in memory
    pub db: Option<db::DbConfig>,
    #[serde(default = "default_objects")]
    pub objects: ObjectStoreConfig,
    pub redaction: RedactionConfig,
}

impl DocshareConfig {
    pub fn validate(&self) -> Result<(), DocshareError> {
        if self.api_token.trim().is_empty() {
            return Err(DocshareError::bad_request(
                "Config \"apiToken\" must not be empty",
            ));
        }
        if self.signing_key.trim().is_empty() {
            return Err(DocshareError::bad_request(
                "Config \"signingKey\" must not be empty",
            ));
        }
        Ok(())
    }

    fn public_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.clone(),
            None => format!("http://localhost:{}", self.port),
        }
    }
}

/// External collaborators of the server, constructed once and shared by
/// all requests.
pub struct Backends {
    pub repo: Arc<dyn Repository>,
    pub objects: Arc<dyn ObjectStore>,
    pub redaction: Arc<dyn RedactionService>,
    pub identity: Arc<dyn IdentityProvider>,
    pub signer: UrlSigner,
}

impl Backends {
    pub async fn from_config(config: &DocshareConfig) -> Result<Self, DocshareError> {
        let repo: Arc<dyn Repository> = match &config.db {
            Some(db_config) => {
                let pool = db::create_pool(db_config)?;
                db::run_migrations(&pool).await?;
                Arc::new(PgRepository::new(pool))
            }
            None => {
                warn!("docshare: no database configured, data is kept in memory");
                Arc::new(MemoryRepository::new())
            }
        };
        let signer = UrlSigner::new(&config.signing_key, &config.public_url());
        let objects: Arc<dyn ObjectStore> = match &config.objects {
            ObjectStoreConfig::Fs { root } => {
                tokio::fs::create_dir_all(root).await.map_err(internal_error)?;
                Arc::new(FsObjectStore::new(root.clone(), signer.clone()))
            }
            ObjectStoreConfig::Memory => {
                Arc::new(MemoryObjectStore::new(signer.clone()))
            }
        };
        let redaction: Arc<dyn RedactionService> =
            Arc::new(HttpRedactionService::new(&config.redaction)?);
        let identity: Arc<dyn IdentityProvider> =
            Arc::new(HttpIdentityProvider::new(config.auth_url.clone())?);
        Ok(Self {
            repo,
            objects,
            redaction,
            identity,
            signer,
        })
    }
}

#[derive(Clone)]
pub struct Docshare {
    host: String,
    port: u32,
    api_token: String,
    max_upload_bytes: usize,
    auth: Authenticator,
    users: Arc<UsersApi>,
    sharing: Arc<SharingApi>,
    documents: Arc<DocumentsApi>,
    objects: Arc<dyn ObjectStore>,
    signer: UrlSigner,
}

impl Docshare {
    pub async fn new(config: DocshareConfig) -> Result<Self, DocshareError> {
        config.validate()?;
        let backends = Backends::from_config(&config).await?;
        Ok(Self::with_backends(&config, backends))
    }

    pub fn with_backends(config: &DocshareConfig, backends: Backends) -> Self {
        let Backends {
            repo,
            objects,
            redaction,
            identity,
            signer,
        } = backends;
        let users = Arc::new(UsersApi::new(repo.clone()));
        let sharing = Arc::new(SharingApi::new(
            repo.clone(),
            objects.clone(),
            redaction.clone(),
        ));
        let documents = Arc::new(DocumentsApi::new(
            repo,
            objects.clone(),
            redaction,
            sharing.clone(),
            Duration::from_secs(config.presign_ttl_secs),
        ));
        Self {
            host: config.host.clone(),
            port: config.port,
            api_token: config.api_token.clone(),
            max_upload_bytes: config.max_upload_bytes,
            auth: Authenticator::new(identity, users.clone()),
            users,
            sharing,
            documents,
            objects,
            signer,
        }
    }

    pub fn app(&self) -> Router {
        let api_router = Router::new()
            .route("/me", get(me))
            .route("/documents", get(dashboard).post(upload_document))
            .route("/documents/:id/access", get(document_access))
            .route("/documents/:id/url", get(presigned_url))
            .route("/documents/:id/view", get(view_document))
            .route("/documents/:id/original", post(fetch_original))
            .route(
                "/documents/:id/grants",
                get(list_grants).post(share_document).delete(revoke_grant),
            )
            .layer(DefaultBodyLimit::max(self.max_upload_bytes))
            .layer(middleware::from_fn_with_state(
                self.clone(),
                require_session,
            ));

        let admin_router = Router::new()
            .route("/admin/get_user", post(get_user))
            .route("/admin/set_admin", post(set_admin))
            .layer(middleware::from_fn_with_state(
                self.clone(),
                check_api_token,
            ));

        Router::new()
            .route("/", get(root))
            .route("/objects/*key", get(get_object))
            .merge(api_router)
            .merge(admin_router)
            .with_state(self.clone())
    }

    pub async fn run(&self) -> Result<(), DocshareError> {
        let app = self.app();
        let host = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&host)
            .await
            .map_err(internal_error)?;
        info!("docshare: listening on {}", host);
        axum::serve(listener, app).await.map_err(internal_error)
    }
}

async fn root() -> &'static str {
    "Docshare api"
}

// Auth middleware

async fn require_session(
    State(state): State<Docshare>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(req.headers()).map(str::to_string) else {
        return docshare_err_response(DocshareError::auth_failed(
            "Authentication required",
        ));
    };
    match state.auth.authenticate(&token).await {
        Ok(session) => {
            req.extensions_mut().insert(session);
            next.run(req).await
        }
        Err(err) => {
            warn!("docshare: rejected session: {}", err);
            docshare_err_response(err)
        }
    }
}

async fn check_api_token(
    State(state): State<Docshare>,
    req: Request,
    next: Next,
) -> Response {
    let header = req
        .headers()
        .get("x-docshare-api-token")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty());
    if header.is_some() && Some(state.api_token.as_str()) == header {
        next.run(req).await
    } else {
        docshare_err_response(DocshareError::auth_failed(
            "Invalid authorization token",
        ))
    }
}

// Api response helpers

#[derive(Serialize)]
struct DocshareErrorBody {
    error: DocshareError,
}

fn error_status(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
        ErrorCode::AuthFailed => StatusCode::UNAUTHORIZED,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::InvalidGrant => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::UpstreamError => StatusCode::BAD_GATEWAY,
        ErrorCode::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn docshare_err_response(error: DocshareError) -> Response {
    let status = error_status(error.code);
    let body = Json(DocshareErrorBody { error });
    (status, body).into_response()
}

fn docshare_response<T>(result: Result<T, DocshareError>) -> Response
where
    T: Serialize,
{
    match result {
        Ok(res) => Json(res).into_response(),
        Err(err) => docshare_err_response(err),
    }
}

// User handlers

async fn me(
    State(state): State<Docshare>,
    Extension(session): Extension<Session>,
) -> Response {
    let res = state.users.me(&session).await;
    docshare_response(res)
}

async fn get_user(
    State(state): State<Docshare>,
    Json(payload): Json<EmailRequest>,
) -> Response {
    let res = state.users.get_user(&payload.email).await;
    docshare_response(res)
}

async fn set_admin(
    State(state): State<Docshare>,
    Json(payload): Json<SetAdminRequest>,
) -> Response {
    let res = state.users.set_admin(&payload.email, payload.is_admin).await;
    docshare_response(res)
}

// Document handlers

async fn dashboard(
    State(state): State<Docshare>,
    Extension(session): Extension<Session>,
) -> Response {
    let res = state.documents.dashboard(&session).await;
    docshare_response(res)
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> DocshareError {
    DocshareError::bad_request(&err.to_string())
}

/// Reads the `file` field and the optional `severity` field of an upload
/// form. An empty severity means no redaction.
async fn read_upload_form(
    mut multipart: Multipart,
) -> Result<(Upload, Option<Severity>), DocshareError> {
    let mut upload = None;
    let mut severity = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type =
                    field.content_type().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(multipart_error)?.to_vec();
                upload = Some(Upload {
                    file_name,
                    content_type,
                    data,
                });
            }
            Some("severity") => {
                let text = field.text().await.map_err(multipart_error)?;
                let text = text.trim();
                if !text.is_empty() {
                    let value: u8 = text
                        .parse()
                        .map_err(|_| DocshareError::bad_request("Invalid severity"))?;
                    let value = Severity::try_from(value)
                        .map_err(|msg| DocshareError::bad_request(&msg))?;
                    severity = Some(value);
                }
            }
            _ => {}
        }
    }
    let Some(upload) = upload else {
        return Err(DocshareError::bad_request("File is required"));
    };
    Ok((upload, severity))
}

async fn upload_document(
    State(state): State<Docshare>,
    Extension(session): Extension<Session>,
    multipart: Multipart,
) -> Response {
    let res = match read_upload_form(multipart).await {
        Ok((upload, severity)) => {
            state.documents.upload(&session, upload, severity).await
        }
        Err(err) => Err(err),
    };
    docshare_response(res.map(|doc| UploadResponse {
        document: DocumentInfo::from(&doc),
        message: "Document uploaded successfully.".to_string(),
    }))
}

async fn document_access(
    State(state): State<Docshare>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> Response {
    let res = state.sharing.check_access(id, session.user_id).await;
    docshare_response(res.map(|access| AccessResponse {
        document_id: id,
        access,
    }))
}

async fn presigned_url(
    State(state): State<Docshare>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> Response {
    let res = state.documents.open(&session, id).await;
    docshare_response(res.map(|(url, ttl)| PresignedUrlResponse {
        url,
        expires_in: ttl.as_secs(),
    }))
}

async fn view_document(
    State(state): State<Docshare>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> Response {
    match state.documents.open(&session, id).await {
        Ok((url, _)) => Redirect::to(&url).into_response(),
        Err(err) => docshare_err_response(err),
    }
}

async fn fetch_original(
    State(state): State<Docshare>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> Response {
    let res = state.sharing.fetch_original(id, session.user_id).await;
    docshare_response(res.map(|file| OriginalFileResponse {
        file_name: file.file_name,
        content_type: file.content_type,
        data: BASE64_STANDARD.encode(&file.data),
    }))
}

// Sharing handlers

async fn list_grants(
    State(state): State<Docshare>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> Response {
    let res = state.sharing.list_grants(&session, id).await;
    docshare_response(res.map(|grants| GrantsResponse { grants }))
}

async fn share_document(
    State(state): State<Docshare>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ShareRequest>,
) -> Response {
    let ShareRequest { email, access } = payload;
    let res = state.sharing.grant(&session, id, &email, access).await;
    docshare_response(res.map(|outcome| {
        let message = match outcome {
            GrantOutcome::Created => format!("Document shared with {}.", email),
            GrantOutcome::Updated => {
                format!("Access for {} changed to {}.", email, access.as_str())
            }
        };
        ShareResponse {
            document_id: id,
            email: email.clone(),
            access,
            created: outcome == GrantOutcome::Created,
            message,
        }
    }))
}

async fn revoke_grant(
    State(state): State<Docshare>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RevokeRequest>,
) -> Response {
    match state.sharing.revoke(&session, id, &payload.email).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => docshare_err_response(err),
    }
}

// Presigned object download

#[derive(Deserialize)]
struct ObjectQuery {
    expires: i64,
    signature: String,
}

async fn get_object(
    State(state): State<Docshare>,
    Path(key): Path<String>,
    Query(query): Query<ObjectQuery>,
) -> Response {
    let now = chrono::Utc::now().timestamp();
    if let Err(err) = state.signer.verify(&key, query.expires, &query.signature, now) {
        return docshare_err_response(err);
    }
    trace!("docshare: serving object {}", key);
    match state.objects.get(&key).await {
        Ok(object) => (
            [
                (header::CONTENT_TYPE, object.content_type),
                (header::CONTENT_DISPOSITION, "inline".to_string()),
            ],
            object.data,
        )
            .into_response(),
        Err(err) => docshare_err_response(err),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use reqwest::multipart::{Form, Part};

    use super::*;
    use crate::auth::tests::StaticIdentityProvider;
    use crate::sharing::tests::FakeRedaction;
    use crate::types::{AccessLevel, UserInfo};

    const API_TOKEN: &str = "admin-token";

    struct TestServer {
        url: String,
        client: reqwest::Client,
    }

    impl TestServer {
        async fn start() -> Self {
            Self::start_with_api_token(API_TOKEN).await
        }

        async fn start_with_api_token(api_token: &str) -> Self {
            let listener =
                tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let url = format!("http://{}", addr);

            let config: DocshareConfig = serde_json::from_value(serde_json::json!({
                "port": addr.port(),
                "publicUrl": url,
                "apiToken": api_token,
                "authUrl": "http://auth.invalid/session",
                "signingKey": "signing-secret",
                "objects": {"kind": "memory"},
                "redaction": {"url": "http://redaction.invalid"},
            }))
            .unwrap();
            let signer = UrlSigner::new(&config.signing_key, &url);
            let backends = Backends {
                repo: Arc::new(MemoryRepository::new()),
                objects: Arc::new(MemoryObjectStore::new(signer.clone())),
                redaction: Arc::new(FakeRedaction),
                identity: Arc::new(StaticIdentityProvider::new(&[
                    ("owner-token", "owner@example.com"),
                    ("guest-token", "guest@example.com"),
                ])),
                signer,
            };
            let app = Docshare::with_backends(&config, backends).app();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            Self {
                url,
                client: reqwest::Client::new(),
            }
        }

        fn get(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
            self.client
                .get(format!("{}{}", self.url, path))
                .bearer_auth(token)
        }

        fn post(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
            self.client
                .post(format!("{}{}", self.url, path))
                .bearer_auth(token)
        }

        async fn upload(
            &self,
            token: &str,
            name: &str,
            content_type: &str,
            severity: Option<&str>,
        ) -> reqwest::Response {
            let part = Part::bytes(b"%PDF-1.7 report body".to_vec())
                .file_name(name.to_string())
                .mime_str(content_type)
                .unwrap();
            let mut form = Form::new().part("file", part);
            if let Some(severity) = severity {
                form = form.text("severity", severity.to_string());
            }
            self.post("/documents", token)
                .multipart(form)
                .send()
                .await
                .unwrap()
        }

        async fn share(
            &self,
            token: &str,
            id: Uuid,
            email: &str,
            access: AccessLevel,
        ) -> reqwest::Response {
            self.post(&format!("/documents/{}/grants", id), token)
                .json(&ShareRequest {
                    email: email.to_string(),
                    access,
                })
                .send()
                .await
                .unwrap()
        }
    }

    async fn error_code(res: reqwest::Response) -> String {
        let body: serde_json::Value = res.json().await.unwrap();
        body["error"]["code"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn requests_without_session_are_rejected() {
        let server = TestServer::start().await;
        let res = server
            .client
            .get(format!("{}/documents", server.url))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(res).await, "auth_failed");

        let res = server.get("/documents", "bogus").send().await.unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::UNAUTHORIZED);

        let res = server.get("/", "bogus").send().await.unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::OK);
    }

    #[tokio::test]
    async fn upload_validates_content_type() {
        let server = TestServer::start().await;
        let res = server
            .upload("owner-token", "notes.txt", "text/plain", None)
            .await;
        assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);

        let res = server
            .upload("owner-token", "report.pdf", "application/pdf", Some("33"))
            .await;
        assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn redacted_share_then_upgrade_to_original() {
        let server = TestServer::start().await;
        // Both users sign in once so that the guest can be found by email
        let res = server.get("/me", "guest-token").send().await.unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::OK);

        let res = server
            .upload("owner-token", "report.pdf", "application/pdf", Some("40"))
            .await;
        assert_eq!(res.status(), reqwest::StatusCode::OK);
        let uploaded: UploadResponse = res.json().await.unwrap();
        let id = uploaded.document.id;
        assert!(uploaded.document.redacted);

        let res = server
            .share("owner-token", id, "guest@example.com", AccessLevel::Redacted)
            .await;
        assert_eq!(res.status(), reqwest::StatusCode::OK);
        let shared: ShareResponse = res.json().await.unwrap();
        assert!(shared.created);

        // The guest can open the stored, redacted object
        let res = server
            .get(&format!("/documents/{}/view", id), "guest-token")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::OK);
        let body = res.bytes().await.unwrap();
        assert!(body.starts_with(b"REDACTED:"));

        let res = server
            .get(&format!("/documents/{}/access", id), "guest-token")
            .send()
            .await
            .unwrap();
        let access: serde_json::Value = res.json().await.unwrap();
        assert_eq!(access["access"], "GrantedRedacted");

        let res = server
            .post(&format!("/documents/{}/original", id), "guest-token")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::FORBIDDEN);
        assert_eq!(error_code(res).await, "forbidden");

        let res = server
            .share("owner-token", id, "guest@example.com", AccessLevel::Original)
            .await;
        let shared: ShareResponse = res.json().await.unwrap();
        assert!(!shared.created);

        let res = server
            .post(&format!("/documents/{}/original", id), "guest-token")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::OK);
        let original: OriginalFileResponse = res.json().await.unwrap();
        assert_eq!(original.file_name, "restored_report.pdf");
        assert_eq!(
            BASE64_STANDARD.decode(original.data).unwrap(),
            b"%PDF-1.7 report body"
        );

        let res = server
            .get(&format!("/documents/{}/grants", id), "owner-token")
            .send()
            .await
            .unwrap();
        let grants: GrantsResponse = res.json().await.unwrap();
        assert_eq!(grants.grants.len(), 1);
        assert_eq!(grants.grants[0].access, AccessLevel::Original);
    }

    #[tokio::test]
    async fn share_errors_map_to_statuses() {
        let server = TestServer::start().await;
        let res = server
            .upload("owner-token", "report.pdf", "application/pdf", None)
            .await;
        let uploaded: UploadResponse = res.json().await.unwrap();
        let id = uploaded.document.id;

        let res = server
            .share("owner-token", id, "owner@example.com", AccessLevel::Original)
            .await;
        assert_eq!(res.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error_code(res).await, "invalid_grant");

        let res = server
            .share("owner-token", id, "nobody@example.com", AccessLevel::Original)
            .await;
        assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);

        let res = server.get("/me", "guest-token").send().await.unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::OK);
        let res = server
            .share("guest-token", id, "owner@example.com", AccessLevel::Original)
            .await;
        assert_eq!(res.status(), reqwest::StatusCode::FORBIDDEN);

        let res = server
            .client
            .delete(format!("{}/documents/{}/grants", server.url, id))
            .bearer_auth("owner-token")
            .json(&RevokeRequest {
                email: "guest@example.com".to_string(),
            })
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn presigned_urls_reject_tampering() {
        let server = TestServer::start().await;
        let res = server
            .upload("owner-token", "report.pdf", "application/pdf", None)
            .await;
        let uploaded: UploadResponse = res.json().await.unwrap();

        let res = server
            .get(&format!("/documents/{}/url", uploaded.document.id), "owner-token")
            .send()
            .await
            .unwrap();
        let presigned: PresignedUrlResponse = res.json().await.unwrap();
        assert_eq!(presigned.expires_in, 60);

        let res = server.client.get(presigned.url.as_str()).send().await.unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::OK);
        assert_eq!(res.headers()["content-type"], "application/pdf");

        let tampered = presigned.url.replace("signature=", "signature=00");
        let res = server.client.get(tampered.as_str()).send().await.unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_api_requires_token() {
        let server = TestServer::start().await;
        server.get("/me", "guest-token").send().await.unwrap();

        let body = HashMap::from([("email", "guest@example.com")]);
        let res = server
            .client
            .post(format!("{}/admin/get_user", server.url))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::UNAUTHORIZED);

        let res = server
            .client
            .post(format!("{}/admin/set_admin", server.url))
            .header("x-docshare-api-token", API_TOKEN)
            .json(&SetAdminRequest {
                email: "guest@example.com".to_string(),
                is_admin: true,
            })
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::OK);
        let user: UserInfo = res.json().await.unwrap();
        assert!(user.is_admin);
    }

    #[tokio::test]
    async fn empty_api_token_is_refused() {
        let config: DocshareConfig = serde_json::from_value(serde_json::json!({
            "apiToken": " ",
            "authUrl": "http://auth.invalid/session",
            "signingKey": "signing-secret",
            "objects": {"kind": "memory"},
            "redaction": {"url": "http://redaction.invalid"},
        }))
        .unwrap();
        let err = config.validate().unwrap_err();
        assert_eq!(err.code, ErrorCode::BadRequest);
        let Err(err) = Docshare::new(config).await else {
            panic!("server started with an empty api token");
        };
        assert_eq!(err.code, ErrorCode::BadRequest);

        let server = TestServer::start_with_api_token("").await;
        let body = HashMap::from([("email", "guest@example.com")]);
        let res = server
            .client
            .post(format!("{}/admin/get_user", server.url))
            .header("x-docshare-api-token", "")
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::UNAUTHORIZED);
    }
}
