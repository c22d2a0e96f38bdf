use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Access, AccessLevel, DocumentInfo, GrantInfo, SharedDocumentInfo};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    #[serde(rename = "bad_request")]
    BadRequest,
    #[serde(rename = "auth_failed")]
    AuthFailed,
    #[serde(rename = "not_found")]
    NotFound,
    #[serde(rename = "forbidden")]
    Forbidden,
    #[serde(rename = "invalid_grant")]
    InvalidGrant,
    #[serde(rename = "upstream_error")]
    UpstreamError,
    #[serde(rename = "internal_server_error")]
    InternalServerError,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub owned: Vec<DocumentInfo>,
    pub shared: Vec<SharedDocumentInfo>,
}

#[derive(Serialize, Deserialize)]
pub struct ShareRequest {
    pub email: String,
    pub access: AccessLevel,
}

#[derive(Serialize, Deserialize)]
pub struct RevokeRequest {
    pub email: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareResponse {
    pub document_id: Uuid,
    pub email: String,
    pub access: AccessLevel,
    /// False when an existing grant was replaced
    pub created: bool,
    pub message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessResponse {
    pub document_id: Uuid,
    pub access: Access,
}

#[derive(Serialize, Deserialize)]
pub struct GrantsResponse {
    pub grants: Vec<GrantInfo>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrlResponse {
    pub url: String,
    pub expires_in: u64,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalFileResponse {
    pub file_name: String,
    pub content_type: String,
    /// Standard base64 of the file bytes
    pub data: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub document: DocumentInfo,
    pub message: String,
}

#[derive(Serialize, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAdminRequest {
    pub email: String,
    pub is_admin: bool,
}
