use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    TemplateCopied,
    DatabasesExtracted,
    WebsiteBuilding,
    Deployed,
    Error,
}

impl ProjectStatus {
    /// Position in the forward order. `Error` sits outside it.
    fn rank(self) -> Option<u8> {
        match self {
            ProjectStatus::TemplateCopied => Some(0),
            ProjectStatus::DatabasesExtracted => Some(1),
            ProjectStatus::WebsiteBuilding => Some(2),
            ProjectStatus::Deployed => Some(3),
            ProjectStatus::Error => None,
        }
    }

    /// Whether moving from `self` to `next` respects the forward-only order.
    /// `Error` is reachable from anywhere and left by nothing.
    pub fn can_advance_to(self, next: ProjectStatus) -> bool {
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(from), Some(to)) => to >= from,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::TemplateCopied => "template_copied",
            ProjectStatus::DatabasesExtracted => "databases_extracted",
            ProjectStatus::WebsiteBuilding => "website_building",
            ProjectStatus::Deployed => "deployed",
            ProjectStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How `update_project_status` treats requested transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    /// Any status may replace any other (admin correction).
    #[default]
    Overwrite,
    /// Reject backwards moves, leaving `error`, and `deployed` without a site URL.
    ForwardOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub user_id: String,
    /// Tenant access token, AES-GCM sealed with the service key.
    #[serde(skip)]
    pub access_token: Vec<u8>,
    pub template_id: Option<String>,
    pub workspace_id: String,
    pub workspace_name: String,
    pub category_db_id: Option<String>,
    pub content_db_id: Option<String>,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub site_url: Option<String>,
    pub repo_url: Option<String>,
    pub error: Option<String>,
}

impl Project {
    pub fn set_status(&mut self, status: ProjectStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.error = Some(if message.is_empty() {
            "Unknown error".to_string()
        } else {
            message
        });
        self.set_status(ProjectStatus::Error);
    }

    /// Shallow merge: only fields present in `update` are replaced.
    pub fn apply(&mut self, update: ProjectUpdate) {
        if let Some(site_url) = update.site_url {
            self.site_url = Some(site_url);
        }
        if let Some(repo_url) = update.repo_url {
            self.repo_url = Some(repo_url);
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
        if let Some(id) = update.category_db_id {
            self.category_db_id = Some(id);
        }
        if let Some(id) = update.content_db_id {
            self.content_db_id = Some(id);
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdate {
    pub site_url: Option<String>,
    pub repo_url: Option<String>,
    pub error: Option<String>,
    pub category_db_id: Option<String>,
    pub content_db_id: Option<String>,
}
