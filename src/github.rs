//! Repository provisioning against the GitHub REST API.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::config::GithubConfig;
use crate::crypto;
use crate::models::{CreateRepository, RepositoryInfo, RepositoryVisibility};

const API_VERSION: &str = "2022-11-28";

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("GitHub repository creation failed: {0}")]
    TemplateCreationFailed(String),
    #[error("Repository {owner}/{repo} not ready after {attempts} attempts")]
    RepositoryNotReady {
        owner: String,
        repo: String,
        attempts: u32,
    },
    /// Secrets named in `uploaded` were stored before the failure and are not rolled back.
    #[error("Failed to set secret {name}: {reason}")]
    SecretUploadFailed {
        name: String,
        uploaded: Vec<String>,
        reason: String,
    },
    #[error("Repository {owner}/{repo} not found")]
    RepositoryNotFound { owner: String, repo: String },
    #[error("Failed to trigger workflow {workflow_id}: {reason}")]
    WorkflowTriggerFailed { workflow_id: String, reason: String },
    #[error("GitHub API error: {0}")]
    Upstream(String),
}

#[derive(Debug)]
struct ApiFailure {
    status: Option<StatusCode>,
    message: String,
}

impl std::fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status.as_u16(), self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl ApiFailure {
    fn is_not_found(&self) -> bool {
        self.status == Some(StatusCode::NOT_FOUND)
    }
}

#[derive(Debug, Deserialize)]
struct RepoPublicKey {
    key_id: String,
    key: String,
}

pub struct Provisioner {
    http: Client,
    config: GithubConfig,
}

impl Provisioner {
    pub fn new(config: GithubConfig) -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent("nodesite")
                .build()
                .expect("Failed to build reqwest client"),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.bearer_auth(&self.config.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    /// Generate a repository from the configured template, wait until it is
    /// readable, then upload any secrets.
    pub async fn create_from_template(
        &self,
        options: CreateRepository,
    ) -> Result<RepositoryInfo, ProvisionError> {
        let description = options
            .description
            .clone()
            .unwrap_or_else(|| format!("Website generated from Notion - {}", options.name));

        let req = self
            .http
            .post(self.url(&format!(
                "/repos/{}/{}/generate",
                self.config.template_owner, self.config.template_repo
            )))
            .json(&json!({
                "name": options.name,
                "description": description,
                "private": options.private,
                "include_all_branches": false,
            }));

        let repo: RepositoryInfo = match execute(self.authed(req)).await {
            Ok(resp) => resp
                .json()
                .await
                .map_err(|e| ProvisionError::TemplateCreationFailed(e.to_string()))?,
            Err(e) => return Err(ProvisionError::TemplateCreationFailed(e.to_string())),
        };

        tracing::info!("Repository {} created from template", repo.full_name);

        self.wait_for_repository(&repo.owner.login, &repo.name).await?;

        if let Some(vars) = options.environment_variables.as_ref().filter(|v| !v.is_empty()) {
            self.set_environment_variables(&repo.owner.login, &repo.name, vars)
                .await?;
        }

        Ok(repo)
    }

    /// Poll until the repository is readable. Attempt `n` waits `n` times the base delay.
    async fn wait_for_repository(&self, owner: &str, repo: &str) -> Result<(), ProvisionError> {
        let attempts = self.config.poll_attempts.max(1);
        for attempt in 1..=attempts {
            match self.fetch_repository(owner, repo).await {
                Ok(_) => return Ok(()),
                Err(e) => {
                    tracing::debug!("Repository {owner}/{repo} not ready (attempt {attempt}): {e}");
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.poll_delay * attempt).await;
            }
        }
        Err(ProvisionError::RepositoryNotReady {
            owner: owner.to_string(),
            repo: repo.to_string(),
            attempts,
        })
    }

    /// Seal and upload each variable as a repository secret. Stops at the first
    /// failure; secrets already written stay in place.
    pub async fn set_environment_variables(
        &self,
        owner: &str,
        repo: &str,
        variables: &BTreeMap<String, String>,
    ) -> Result<usize, ProvisionError> {
        let Some(first) = variables.keys().next() else {
            return Ok(0);
        };

        let req = self.http.get(self.url(&format!(
            "/repos/{owner}/{repo}/actions/secrets/public-key"
        )));
        let public_key: RepoPublicKey = match execute(self.authed(req)).await {
            Ok(resp) => resp.json().await.map_err(|e| ProvisionError::SecretUploadFailed {
                name: first.clone(),
                uploaded: Vec::new(),
                reason: format!("Invalid public key response: {e}"),
            })?,
            Err(e) => {
                return Err(ProvisionError::SecretUploadFailed {
                    name: first.clone(),
                    uploaded: Vec::new(),
                    reason: format!("Failed to fetch public key: {e}"),
                });
            }
        };

        let mut uploaded = Vec::with_capacity(variables.len());
        for (name, value) in variables {
            let encrypted = crypto::seal_secret(value, &public_key.key).map_err(|reason| {
                ProvisionError::SecretUploadFailed {
                    name: name.clone(),
                    uploaded: uploaded.clone(),
                    reason,
                }
            })?;

            let req = self
                .http
                .put(self.url(&format!("/repos/{owner}/{repo}/actions/secrets/{name}")))
                .json(&json!({
                    "encrypted_value": encrypted,
                    "key_id": public_key.key_id,
                }));
            if let Err(e) = execute(self.authed(req)).await {
                return Err(ProvisionError::SecretUploadFailed {
                    name: name.clone(),
                    uploaded,
                    reason: e.to_string(),
                });
            }
            uploaded.push(name.clone());
        }

        tracing::info!("Set {} secrets for {owner}/{repo}", uploaded.len());
        Ok(uploaded.len())
    }

    async fn fetch_repository(&self, owner: &str, repo: &str) -> Result<RepositoryInfo, ApiFailure> {
        let req = self.http.get(self.url(&format!("/repos/{owner}/{repo}")));
        let resp = execute(self.authed(req)).await?;
        resp.json().await.map_err(|e| ApiFailure {
            status: None,
            message: e.to_string(),
        })
    }

    pub async fn get_repository(&self, owner: &str, repo: &str) -> Result<RepositoryInfo, ProvisionError> {
        self.fetch_repository(owner, repo).await.map_err(|e| {
            if e.is_not_found() {
                ProvisionError::RepositoryNotFound {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                }
            } else {
                ProvisionError::Upstream(format!("Failed to get repository: {e}"))
            }
        })
    }

    pub async fn delete_repository(&self, owner: &str, repo: &str) -> Result<(), ProvisionError> {
        let req = self.http.delete(self.url(&format!("/repos/{owner}/{repo}")));
        execute(self.authed(req)).await.map_err(|e| {
            if e.is_not_found() {
                ProvisionError::RepositoryNotFound {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                }
            } else {
                ProvisionError::Upstream(format!("Failed to delete repository: {e}"))
            }
        })?;
        tracing::info!("Repository {owner}/{repo} deleted");
        Ok(())
    }

    /// Newest first, one page of up to 100.
    pub async fn list_repositories(
        &self,
        visibility: RepositoryVisibility,
    ) -> Result<Vec<RepositoryInfo>, ProvisionError> {
        let req = self.http.get(self.url("/user/repos")).query(&[
            ("type", visibility.as_str()),
            ("sort", "created"),
            ("direction", "desc"),
            ("per_page", "100"),
        ]);
        let resp = execute(self.authed(req))
            .await
            .map_err(|e| ProvisionError::Upstream(format!("Failed to list repositories: {e}")))?;
        resp.json()
            .await
            .map_err(|e| ProvisionError::Upstream(format!("Failed to list repositories: {e}")))
    }

    pub async fn trigger_workflow(
        &self,
        owner: &str,
        repo: &str,
        workflow_id: &str,
    ) -> Result<(), ProvisionError> {
        let req = self
            .http
            .post(self.url(&format!(
                "/repos/{owner}/{repo}/actions/workflows/{workflow_id}/dispatches"
            )))
            .json(&json!({ "ref": self.config.workflow_ref }));
        execute(self.authed(req))
            .await
            .map_err(|e| ProvisionError::WorkflowTriggerFailed {
                workflow_id: workflow_id.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

async fn execute(req: RequestBuilder) -> Result<Response, ApiFailure> {
    let resp = req.send().await.map_err(|e| ApiFailure {
        status: e.status(),
        message: e.to_string(),
    })?;

    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown status").to_string());

    Err(ApiFailure {
        status: Some(status),
        message,
    })
}
