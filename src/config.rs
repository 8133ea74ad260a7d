use std::net::IpAddr;
use std::time::Duration;

use crate::models::TransitionPolicy;

pub const DEFAULT_NOTION_API_BASE: &str = "https://api.notion.com";
pub const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_TEMPLATE_REPO: &str = "NodeSite-Today/NodeSite.Today-Template";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub encryption_key: String,
    pub admin_token: String,
    pub notion: NotionConfig,
    pub central_token: Option<String>,
    pub github: Option<GithubConfig>,
    pub quota: QuotaConfig,
    pub transition_policy: TransitionPolicy,
    pub deploy: DeployConfig,
}

#[derive(Debug, Clone)]
pub struct NotionConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub api_base: String,
    /// Outbound pacing for the shared central credential.
    pub requests_per_second: u32,
}

#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub token: String,
    pub template_owner: String,
    pub template_repo: String,
    pub api_base: String,
    pub poll_attempts: u32,
    pub poll_delay: Duration,
    pub workflow_ref: String,
}

#[derive(Debug, Clone, Default)]
pub struct QuotaConfig {
    pub enforce_daily: bool,
}

#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub delay: Duration,
    pub domain: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let encryption_key = env_required("NODESITE_ENCRYPTION_KEY")?;
        let admin_token = env_required("NODESITE_ADMIN_TOKEN")?;

        let host: IpAddr = env_or("NODESITE_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid NODESITE_HOST: {e}"))?;

        let port: u16 = env_or("NODESITE_PORT", "3000")
            .parse()
            .map_err(|e| format!("Invalid NODESITE_PORT: {e}"))?;

        let log_level = env_or("NODESITE_LOG_LEVEL", "info");

        let notion = NotionConfig {
            client_id: env_required("NOTION_CLIENT_ID")?,
            client_secret: env_required("NOTION_CLIENT_SECRET")?,
            redirect_uri: env_required("NOTION_REDIRECT_URI")?,
            api_base: env_or("NOTION_API_BASE", DEFAULT_NOTION_API_BASE),
            requests_per_second: env_or("NODESITE_NOTION_RPS", "3")
                .parse()
                .map_err(|e| format!("Invalid NODESITE_NOTION_RPS: {e}"))?,
        };

        let central_token = std::env::var("CENTRAL_NOTION_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());

        let github = match std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()) {
            Some(token) => {
                let (template_owner, template_repo) =
                    parse_template_repo(&env_or("GITHUB_TEMPLATE_REPO", DEFAULT_TEMPLATE_REPO))?;
                Some(GithubConfig {
                    token,
                    template_owner,
                    template_repo,
                    api_base: env_or("GITHUB_API_BASE", DEFAULT_GITHUB_API_BASE),
                    poll_attempts: env_or("NODESITE_REPO_POLL_ATTEMPTS", "10")
                        .parse()
                        .map_err(|e| format!("Invalid NODESITE_REPO_POLL_ATTEMPTS: {e}"))?,
                    poll_delay: Duration::from_millis(
                        env_or("NODESITE_REPO_POLL_DELAY_MS", "1000")
                            .parse()
                            .map_err(|e| format!("Invalid NODESITE_REPO_POLL_DELAY_MS: {e}"))?,
                    ),
                    workflow_ref: env_or("NODESITE_WORKFLOW_REF", "main"),
                })
            }
            None => None,
        };

        let quota = QuotaConfig {
            enforce_daily: env_or("NODESITE_ENFORCE_DAILY_QUOTA", "false") == "true",
        };

        let transition_policy = match env_or("NODESITE_TRANSITION_POLICY", "overwrite").as_str() {
            "forward_only" => TransitionPolicy::ForwardOnly,
            "overwrite" => TransitionPolicy::Overwrite,
            other => return Err(format!("Invalid NODESITE_TRANSITION_POLICY: {other}")),
        };

        let deploy = DeployConfig {
            delay: Duration::from_secs(
                env_or("NODESITE_DEPLOY_DELAY_SECS", "5")
                    .parse()
                    .map_err(|e| format!("Invalid NODESITE_DEPLOY_DELAY_SECS: {e}"))?,
            ),
            domain: env_or("NODESITE_DEPLOY_DOMAIN", "vercel.app"),
        };

        Ok(Config {
            host,
            port,
            log_level,
            encryption_key,
            admin_token,
            notion,
            central_token,
            github,
            quota,
            transition_policy,
            deploy,
        })
    }
}

/// Split `owner/repo` into its two halves.
pub fn parse_template_repo(value: &str) -> Result<(String, String), String> {
    match value.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(format!(
            "Invalid GITHUB_TEMPLATE_REPO '{value}'. Expected: owner/repo"
        )),
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
