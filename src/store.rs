//! Client for the remote document store
//!
//! Documents are addressed by `(project_id, file_id)`. Every call takes
//! the caller's `Session`; the HTTP client sends its access token as a
//! bearer token.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client as HttpClient, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::session::Session;
use crate::template::TemplateConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// A document as stored remotely
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Body of a document save
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveDocument {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Body of a project creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Initialization config resolved from the template registry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateConfig>,
}

#[derive(Deserialize)]
struct ProjectsEnvelope {
    projects: Vec<Project>,
}

#[derive(Deserialize)]
struct ProjectEnvelope {
    project: Project,
}

#[derive(Deserialize)]
struct DocumentEnvelope {
    document: StoredDocument,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: String,
}

/// Remote storage for projects and their documents
pub trait DocumentStore {
    fn list_projects(&self, session: &Session) -> impl Future<Output = Result<Vec<Project>>> + Send;

    fn create_project(
        &self,
        session: &Session,
        project: &NewProject,
    ) -> impl Future<Output = Result<Project>> + Send;

    fn delete_project(
        &self,
        session: &Session,
        project_id: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    fn fetch_document(
        &self,
        session: &Session,
        project_id: &str,
        file_id: &str,
    ) -> impl Future<Output = Result<StoredDocument>> + Send;

    /// Write document content; the store answers with the saved document
    fn save_document(
        &self,
        session: &Session,
        project_id: &str,
        file_id: &str,
        save: &SaveDocument,
    ) -> impl Future<Output = Result<StoredDocument>> + Send;
}

/// HTTP client for the document store API
pub struct DocumentStoreClient {
    http: HttpClient,
    api_url: String,
}

impl DocumentStoreClient {
    pub fn new(api_url: &str) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn document_url(&self, project_id: &str, file_id: &str) -> String {
        format!("{}/projects/{}/files/{}", self.api_url, project_id, file_id)
    }

    async fn send(&self, request: RequestBuilder, session: &Session) -> Result<Response> {
        let response = request.bearer_auth(&session.access_token).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|e| e.error)
            .unwrap_or(body);
        Err(Error::Status {
            status: status.as_u16(),
            message,
        })
    }
}

impl DocumentStore for DocumentStoreClient {
    async fn list_projects(&self, session: &Session) -> Result<Vec<Project>> {
        let url = format!("{}/projects", self.api_url);
        let response = self.send(self.http.get(&url), session).await?;
        let envelope: ProjectsEnvelope = response.json().await?;
        debug!(count = envelope.projects.len(), "listed projects");
        Ok(envelope.projects)
    }

    async fn create_project(&self, session: &Session, project: &NewProject) -> Result<Project> {
        let url = format!("{}/projects", self.api_url);
        let response = self.send(self.http.post(&url).json(project), session).await?;
        let envelope: ProjectEnvelope = response.json().await?;
        info!(id = %envelope.project.id, name = %envelope.project.name, "created project");
        Ok(envelope.project)
    }

    async fn delete_project(&self, session: &Session, project_id: &str) -> Result<()> {
        let url = format!("{}/projects/{}", self.api_url, project_id);
        self.send(self.http.delete(&url), session).await?;
        info!(id = project_id, "deleted project");
        Ok(())
    }

    async fn fetch_document(
        &self,
        session: &Session,
        project_id: &str,
        file_id: &str,
    ) -> Result<StoredDocument> {
        let url = self.document_url(project_id, file_id);
        let response = self.send(self.http.get(&url), session).await?;
        let envelope: DocumentEnvelope = response.json().await?;
        Ok(envelope.document)
    }

    async fn save_document(
        &self,
        session: &Session,
        project_id: &str,
        file_id: &str,
        save: &SaveDocument,
    ) -> Result<StoredDocument> {
        let url = self.document_url(project_id, file_id);
        let response = self.send(self.http.put(&url).json(save), session).await?;
        let envelope: DocumentEnvelope = response.json().await?;
        info!(project_id, file_id, bytes = save.content.len(), "saved document");
        Ok(envelope.document)
    }
}
