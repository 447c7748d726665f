//! HTTP client for interactive saves.
//!
//! No request timeout is set here: a slow interactive save is retried by the
//! editor's normal error handling, unlike the page-close path in
//! [`crate::transport`].

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::models::{
    ConflictPayload, ConflictRecord, CreateDocumentInput, Document, DocumentResponse,
    ResolutionInput, Revision, UpdateRequest,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },
}

/// Reply to an interactive save
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateResponse {
    Saved(Document),
    Conflict(ConflictPayload),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct HistoryBody {
    revisions: Vec<Revision>,
}

#[derive(Debug, Clone)]
pub struct DocumentClient {
    client: reqwest::Client,
    base_url: String,
}

impl DocumentClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            // Ensure base URL doesn't have trailing slash
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn create(
        &self,
        title: &str,
        description: Option<&str>,
    ) -> Result<Document, ClientError> {
        let url = format!("{}/document", self.base_url);
        let input = CreateDocumentInput {
            title: title.to_string(),
            description: description.map(str::to_string),
        };
        let resp = self.client.post(&url).json(&input).send().await?;
        let body: DocumentResponse = read_json(resp).await?;
        Ok(body.document)
    }

    pub async fn fetch(&self, id: &str) -> Result<Document, ClientError> {
        let url = format!("{}/document/{}", self.base_url, id);
        let resp = self.client.get(&url).send().await?;
        let body: DocumentResponse = read_json(resp).await?;
        Ok(body.document)
    }

    pub async fn history(&self, id: &str) -> Result<Vec<Revision>, ClientError> {
        let url = format!("{}/document/{}/history", self.base_url, id);
        let resp = self.client.get(&url).send().await?;
        let body: HistoryBody = read_json(resp).await?;
        Ok(body.revisions)
    }

    /// Versioned save. A 409 is a normal outcome, not an error.
    pub async fn update(&self, req: &UpdateRequest) -> Result<UpdateResponse, ClientError> {
        let url = format!("{}/document/update", self.base_url);
        let resp = self.client.post(&url).json(req).send().await?;

        if resp.status() == StatusCode::CONFLICT {
            let payload: ConflictPayload = resp.json().await?;
            return Ok(UpdateResponse::Conflict(payload));
        }
        let body: DocumentResponse = read_json(resp).await?;
        Ok(UpdateResponse::Saved(body.document))
    }

    pub async fn conflicts(
        &self,
        document_id: Option<&str>,
    ) -> Result<Vec<ConflictRecord>, ClientError> {
        let url = format!("{}/conflicts", self.base_url);
        let mut request = self.client.get(&url);
        if let Some(id) = document_id {
            request = request.query(&[("documentId", id)]);
        }
        let resp = request.send().await?;
        read_json(resp).await
    }

    pub async fn resolve_conflict(
        &self,
        conflict_id: &str,
        resolution: &ResolutionInput,
    ) -> Result<ConflictRecord, ClientError> {
        let url = format!("{}/conflicts/{}/resolve", self.base_url, conflict_id);
        let resp = self.client.post(&url).json(resolution).send().await?;
        read_json(resp).await
    }
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }

    let message = match resp.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    };
    if status == StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound(message));
    }
    Err(ClientError::Server {
        status: status.as_u16(),
        message,
    })
}
