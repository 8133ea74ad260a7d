//! OAuth onboarding and the project state machine.
//!
//! A project is created at the OAuth callback in `template_copied`, moves to
//! `databases_extracted` once the duplicated template has been inspected, and
//! is then handed to the build orchestrator. `error` is reachable from every
//! state and always carries a message.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::NotionConfig;
use crate::crypto::TokenCipher;
use crate::db::ProjectStore;
use crate::models::{Project, ProjectStatus, ProjectUpdate, TokenResponse, TransitionPolicy};
use crate::notion::{DatabaseSummary, NotionClient, NotionError};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("OAuth token exchange failed: {0}")]
    TokenExchangeFailed(String),
    #[error("Project {0} not found")]
    NotFound(String),
    #[error("No template ID found")]
    MissingTemplate,
    #[error("Database extraction failed for {project_id}: {message}")]
    ExtractionFailed { project_id: String, message: String },
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: ProjectStatus,
        to: ProjectStatus,
    },
    #[error("A deployed project requires a site URL")]
    MissingSiteUrl,
    #[error("Project not ready for website building (status: {status})")]
    NotReady { status: ProjectStatus },
    #[error("Missing required database IDs")]
    MissingDatabaseIds,
    #[error("Credential error: {0}")]
    Credential(String),
}

pub struct ProjectLifecycle {
    notion: NotionClient,
    oauth: NotionConfig,
    projects: Arc<dyn ProjectStore>,
    cipher: TokenCipher,
    policy: TransitionPolicy,
}

impl ProjectLifecycle {
    pub fn new(
        notion: NotionClient,
        oauth: NotionConfig,
        projects: Arc<dyn ProjectStore>,
        encryption_key: String,
        policy: TransitionPolicy,
    ) -> Self {
        Self {
            notion,
            oauth,
            projects,
            cipher: TokenCipher::new(&encryption_key),
            policy,
        }
    }

    pub fn authorization_url(&self, state: Option<&str>) -> String {
        let mut params = form_urlencoded::Serializer::new(String::new());
        params
            .append_pair("client_id", &self.oauth.client_id)
            .append_pair("redirect_uri", &self.oauth.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("owner", "user");
        if let Some(state) = state {
            params.append_pair("state", state);
        }
        format!("{}/v1/oauth/authorize?{}", self.notion.api_base(), params.finish())
    }

    pub async fn exchange_code_for_token(&self, code: &str) -> Result<TokenResponse, LifecycleError> {
        self.notion
            .exchange_code(
                &self.oauth.client_id,
                &self.oauth.client_secret,
                code,
                &self.oauth.redirect_uri,
            )
            .await
            .map_err(|e| match e {
                NotionError::Api { message, .. } => LifecycleError::TokenExchangeFailed(message),
                other => LifecycleError::TokenExchangeFailed(other.to_string()),
            })
    }

    /// Store a new project for the token's owner. With a duplicated template
    /// the databases are extracted immediately; an extraction failure leaves
    /// the project stored in `error` and is returned.
    pub async fn create_user_project(&self, token: TokenResponse) -> Result<Project, LifecycleError> {
        let access_token = self
            .cipher
            .seal(&token.access_token)
            .map_err(LifecycleError::Credential)?;

        let now = Utc::now();
        let project = Project {
            id: format!("project_{}", Uuid::now_v7().simple()),
            user_id: token.user_id().to_string(),
            access_token,
            template_id: token.duplicated_template_id.clone().filter(|t| !t.is_empty()),
            workspace_id: token.workspace_id.clone(),
            workspace_name: token.workspace_name.clone(),
            category_db_id: None,
            content_db_id: None,
            status: ProjectStatus::TemplateCopied,
            created_at: now,
            updated_at: now,
            site_url: None,
            repo_url: None,
            error: None,
        };
        self.projects.put(project.clone());

        tracing::info!(
            project_id = %project.id,
            workspace_id = %project.workspace_id,
            template = project.template_id.is_some(),
            "Project created"
        );

        if project.template_id.is_none() {
            return Ok(project);
        }
        self.extract_databases_from_template(&project.id).await
    }

    pub async fn extract_databases_from_template(&self, project_id: &str) -> Result<Project, LifecycleError> {
        let project = self
            .projects
            .get(project_id)
            .ok_or_else(|| LifecycleError::NotFound(project_id.to_string()))?;
        let template_id = project.template_id.clone().ok_or(LifecycleError::MissingTemplate)?;

        self.projects.update(project_id, &mut |p| {
            p.set_status(ProjectStatus::DatabasesExtracted)
        });

        let located = match self.access_token(&project) {
            Ok(token) => self
                .locate_databases(&token, &template_id)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match located {
            Ok((category_db_id, content_db_id)) => {
                let updated = self
                    .projects
                    .update(project_id, &mut |p| {
                        p.category_db_id = category_db_id.clone();
                        p.content_db_id = content_db_id.clone();
                        p.updated_at = Utc::now();
                    })
                    .ok_or_else(|| LifecycleError::NotFound(project_id.to_string()))?;
                tracing::info!(
                    project_id,
                    category_db_id = ?updated.category_db_id,
                    content_db_id = ?updated.content_db_id,
                    "Database extraction completed"
                );
                Ok(updated)
            }
            Err(message) => {
                tracing::error!(project_id, "Database extraction failed: {message}");
                self.projects.update(project_id, &mut |p| p.fail(message.clone()));
                Err(LifecycleError::ExtractionFailed {
                    project_id: project_id.to_string(),
                    message,
                })
            }
        }
    }

    /// Match the template's inline databases first. Unless both roles are
    /// found there, the workspace search alone decides both ids.
    async fn locate_databases(
        &self,
        token: &str,
        template_id: &str,
    ) -> Result<(Option<String>, Option<String>), NotionError> {
        let children = self.notion.child_databases(token, template_id).await?;
        tracing::debug!("Found {} inline databases", children.len());

        let (category, content) = classify_databases(&children);
        if category.is_some() && content.is_some() {
            return Ok((category, content));
        }

        // The template page itself must still be reachable before searching.
        self.notion.retrieve_page(token, template_id).await?;
        let workspace = self.notion.search_databases(token).await?;
        tracing::debug!("Found {} workspace databases", workspace.len());

        Ok(classify_databases(&workspace))
    }

    pub fn get_user_project(&self, project_id: &str) -> Option<Project> {
        self.projects.get(project_id)
    }

    pub fn get_all_projects(&self) -> Vec<Project> {
        self.projects.list()
    }

    /// Set `status` and merge the provided fields. Under the forward-only
    /// policy, backwards moves and deployments without a site URL are rejected.
    pub fn update_project_status(
        &self,
        project_id: &str,
        status: ProjectStatus,
        update: ProjectUpdate,
    ) -> Result<Project, LifecycleError> {
        let policy = self.policy;
        let mut update = Some(update);
        let mut outcome = Ok(());

        let project = self
            .projects
            .update(project_id, &mut |p| {
                let Some(update) = update.take() else { return };
                if policy == TransitionPolicy::ForwardOnly {
                    if !p.status.can_advance_to(status) {
                        outcome = Err(LifecycleError::InvalidTransition {
                            from: p.status,
                            to: status,
                        });
                        return;
                    }
                    let site_url = update.site_url.as_ref().or(p.site_url.as_ref());
                    if status == ProjectStatus::Deployed && site_url.is_none_or(|u| u.is_empty()) {
                        outcome = Err(LifecycleError::MissingSiteUrl);
                        return;
                    }
                }

                p.apply(update);
                if status == ProjectStatus::Error {
                    let message = p.error.take().unwrap_or_default();
                    p.fail(message);
                } else {
                    p.set_status(status);
                }
            })
            .ok_or_else(|| LifecycleError::NotFound(project_id.to_string()))?;

        outcome?;
        tracing::info!(project_id, status = %project.status, "Project status updated");
        Ok(project)
    }

    /// Move a project from `databases_extracted` to `website_building` in one step.
    pub fn begin_build(&self, project_id: &str) -> Result<Project, LifecycleError> {
        let mut outcome = Ok(());
        let project = self
            .projects
            .update(project_id, &mut |p| {
                if p.status != ProjectStatus::DatabasesExtracted {
                    outcome = Err(LifecycleError::NotReady { status: p.status });
                    return;
                }
                if p.category_db_id.is_none() || p.content_db_id.is_none() {
                    outcome = Err(LifecycleError::MissingDatabaseIds);
                    return;
                }
                p.set_status(ProjectStatus::WebsiteBuilding);
            })
            .ok_or_else(|| LifecycleError::NotFound(project_id.to_string()))?;

        outcome?;
        Ok(project)
    }

    /// Move a project to `error` with `message`, merging `update`. A project
    /// already in `error` keeps its earlier message.
    pub fn record_failure(
        &self,
        project_id: &str,
        message: &str,
        update: ProjectUpdate,
    ) -> Result<Project, LifecycleError> {
        let mut update = Some(update);
        let project = self
            .projects
            .update(project_id, &mut |p| {
                let Some(update) = update.take() else { return };
                let already_failed = p.status == ProjectStatus::Error;
                p.apply(ProjectUpdate { error: None, ..update });
                if already_failed {
                    p.updated_at = Utc::now();
                } else {
                    p.fail(message);
                }
            })
            .ok_or_else(|| LifecycleError::NotFound(project_id.to_string()))?;

        tracing::warn!(project_id, error = ?project.error, "Project marked as failed");
        Ok(project)
    }

    pub fn access_token(&self, project: &Project) -> Result<String, LifecycleError> {
        self.cipher
            .open(&project.access_token)
            .map_err(LifecycleError::Credential)
    }

    /// Advisory check that the tenant's own token can read both databases.
    pub async fn test_database_access(&self, project: &Project) -> bool {
        let token = match self.access_token(project) {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(project_id = %project.id, "Database access test failed: {e}");
                return false;
            }
        };

        for database_id in [&project.category_db_id, &project.content_db_id]
            .into_iter()
            .flatten()
        {
            if let Err(e) = self.notion.retrieve_database(&token, database_id).await {
                tracing::warn!(project_id = %project.id, "Database access test failed: {e}");
                return false;
            }
        }
        true
    }
}

/// First title containing "category"/"navigation", and first containing "content"/"post".
fn classify_databases(databases: &[DatabaseSummary]) -> (Option<String>, Option<String>) {
    let find = |needles: [&str; 2]| {
        databases
            .iter()
            .find(|db| {
                let title = db.title.to_lowercase();
                needles.iter().any(|n| title.contains(n))
            })
            .map(|db| db.id.clone())
    };
    (find(["category", "navigation"]), find(["content", "post"]))
}
