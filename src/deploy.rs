use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::config::DeployConfig;
use crate::github::{ProvisionError, Provisioner};
use crate::lifecycle::{LifecycleError, ProjectLifecycle};
use crate::models::{CreateRepository, Project, ProjectStatus, ProjectUpdate, RepositoryInfo};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Provision(#[from] ProvisionError),
}

#[derive(Debug, Clone)]
pub struct BuildStarted {
    pub project_id: String,
    pub repository: RepositoryInfo,
}

/// Repository name derived from the project id: lowercase, anything outside
/// `[a-z0-9]` replaced by `-`.
pub fn repository_name(project_id: &str) -> String {
    let slug: String = project_id
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '-' })
        .collect();
    format!("nodesite-{slug}")
}

pub struct BuildOrchestrator {
    lifecycle: Arc<ProjectLifecycle>,
    provisioner: Arc<Provisioner>,
    deploy: DeployConfig,
}

impl BuildOrchestrator {
    pub fn new(
        lifecycle: Arc<ProjectLifecycle>,
        provisioner: Arc<Provisioner>,
        deploy: DeployConfig,
    ) -> Self {
        Self {
            lifecycle,
            provisioner,
            deploy,
        }
    }

    /// Create the project's repository and schedule its deployment. Any
    /// failure after the project entered `website_building` moves it to `error`,
    /// keeping the repository URL once the repository exists.
    pub async fn start_build(&self, project_id: &str) -> Result<BuildStarted, BuildError> {
        let project = self.lifecycle.begin_build(project_id)?;

        let repository = match self.provision(&project).await {
            Ok(repository) => repository,
            Err(e) => {
                tracing::error!(project_id, "Build failed: {e}");
                record_failure(&self.lifecycle, project_id, &e.to_string(), ProjectUpdate::default());
                return Err(e);
            }
        };

        tracing::info!(project_id, "Repository created: {}", repository.html_url);

        let recorded = self.lifecycle.update_project_status(
            project_id,
            ProjectStatus::WebsiteBuilding,
            ProjectUpdate {
                repo_url: Some(repository.html_url.clone()),
                ..Default::default()
            },
        );
        if let Err(e) = recorded {
            tracing::error!(project_id, "Build could not proceed: {e}");
            record_failure(
                &self.lifecycle,
                project_id,
                &e.to_string(),
                ProjectUpdate {
                    repo_url: Some(repository.html_url.clone()),
                    ..Default::default()
                },
            );
            return Err(e.into());
        }

        self.schedule_deployment(project_id.to_string(), &repository);

        Ok(BuildStarted {
            project_id: project_id.to_string(),
            repository,
        })
    }

    async fn provision(&self, project: &Project) -> Result<RepositoryInfo, BuildError> {
        let (Some(category_db_id), Some(content_db_id)) =
            (project.category_db_id.clone(), project.content_db_id.clone())
        else {
            return Err(LifecycleError::MissingDatabaseIds.into());
        };
        let access_token = self.lifecycle.access_token(project)?;

        let environment_variables = BTreeMap::from([
            ("NOTION_API_KEY".to_string(), access_token),
            ("NOTION_CATEGORY_DB_ID".to_string(), category_db_id),
            ("NOTION_CONTENT_DB_ID".to_string(), content_db_id),
            ("USER_ID".to_string(), project.user_id.clone()),
        ]);

        let repository = self
            .provisioner
            .create_from_template(CreateRepository {
                name: repository_name(&project.id),
                description: Some(format!(
                    "Website generated from Notion workspace: {}",
                    project.workspace_name
                )),
                private: false,
                environment_variables: Some(environment_variables),
            })
            .await?;
        Ok(repository)
    }

    /// Stand-in for the hosting provider: after a fixed delay the site is
    /// reported live at `https://{repo}.{domain}`.
    fn schedule_deployment(&self, project_id: String, repository: &RepositoryInfo) {
        let lifecycle = self.lifecycle.clone();
        let delay = self.deploy.delay;
        let site_url = format!("https://{}.{}", repository.name, self.deploy.domain);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let deployed = lifecycle.update_project_status(
                &project_id,
                ProjectStatus::Deployed,
                ProjectUpdate {
                    site_url: Some(site_url.clone()),
                    ..Default::default()
                },
            );
            match deployed {
                Ok(_) => tracing::info!(project_id = %project_id, "Website deployed: {site_url}"),
                Err(e) => {
                    tracing::error!(project_id = %project_id, "Deployment failed: {e}");
                    record_failure(
                        &lifecycle,
                        &project_id,
                        "Deployment failed",
                        ProjectUpdate::default(),
                    );
                }
            }
        });
    }
}

fn record_failure(lifecycle: &ProjectLifecycle, project_id: &str, message: &str, update: ProjectUpdate) {
    if let Err(e) = lifecycle.record_failure(project_id, message, update) {
        tracing::error!(project_id, "Failed to record build failure: {e}");
    }
}
