use serde::{Deserialize, Serialize};

/// Body returned by the content provider's OAuth token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub bot_id: String,
    pub workspace_id: String,
    #[serde(default)]
    pub workspace_name: String,
    #[serde(default)]
    pub workspace_icon: Option<String>,
    #[serde(default)]
    pub duplicated_template_id: Option<String>,
    pub owner: TokenOwner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenOwner {
    #[serde(rename = "type")]
    pub owner_type: String,
    #[serde(default)]
    pub user: Option<OwnerUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerUser {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub person: Option<Person>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    #[serde(default)]
    pub email: Option<String>,
}

impl TokenResponse {
    pub fn user_id(&self) -> &str {
        self.owner
            .user
            .as_ref()
            .map(|u| u.id.as_str())
            .filter(|id| !id.is_empty())
            .unwrap_or("anonymous")
    }
}
