use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub html_url: String,
    pub clone_url: String,
    pub default_branch: String,
    pub owner: RepositoryOwner,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryOwner {
    pub login: String,
    pub id: u64,
    #[serde(rename = "type")]
    pub owner_type: String,
}

#[derive(Debug, Clone, Default)]
pub struct CreateRepository {
    pub name: String,
    pub description: Option<String>,
    pub private: bool,
    /// Uploaded as repository secrets, in key order.
    pub environment_variables: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryVisibility {
    All,
    #[default]
    Owner,
    Public,
    Private,
}

impl RepositoryVisibility {
    pub fn as_str(self) -> &'static str {
        match self {
            RepositoryVisibility::All => "all",
            RepositoryVisibility::Owner => "owner",
            RepositoryVisibility::Public => "public",
            RepositoryVisibility::Private => "private",
        }
    }
}
