#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use nodesite::config::{Config, DeployConfig, GithubConfig, NotionConfig, QuotaConfig};
use nodesite::db::{MemoryProjectStore, MemoryUserStore, MemoryWindowStore};
use nodesite::lifecycle::ProjectLifecycle;
use nodesite::models::{TokenResponse, TransitionPolicy};
use nodesite::notion::NotionClient;
use nodesite::registry::{RegisterUser, UserRegistry};
use nodesite::state::SharedState;

pub const ADMIN_TOKEN: &str = "test-admin-token";
pub const ENCRYPTION_KEY: &str = "test-encryption-key-32-chars-ok!";
pub const CENTRAL_TOKEN: &str = "secret_central_token";
pub const TENANT_TOKEN: &str = "secret_tenant_token";

pub const CATEGORY_DB: &str = "0123456789abcdef0123456789abcdef";
pub const CONTENT_DB: &str = "fedcba9876543210fedcba9876543210";
pub const TEMPLATE_PAGE: &str = "11111111222233334444555555555555";

pub const TEMPLATE_OWNER: &str = "tmpl-owner";
pub const TEMPLATE_REPO: &str = "tmpl-repo";

pub fn notion_config(api_base: &str) -> NotionConfig {
    NotionConfig {
        client_id: "client-123".to_string(),
        client_secret: "client-secret".to_string(),
        redirect_uri: "http://localhost:3000/api/auth/notion/callback".to_string(),
        api_base: api_base.to_string(),
        requests_per_second: 1_000,
    }
}

pub fn github_config(api_base: &str) -> GithubConfig {
    GithubConfig {
        token: "ghp_test".to_string(),
        template_owner: TEMPLATE_OWNER.to_string(),
        template_repo: TEMPLATE_REPO.to_string(),
        api_base: api_base.to_string(),
        poll_attempts: 3,
        poll_delay: Duration::from_millis(10),
        workflow_ref: "main".to_string(),
    }
}

pub fn test_config(notion_base: &str, github_base: &str) -> Config {
    Config {
        host: "127.0.0.1".parse().unwrap(),
        port: 0, // unused, we bind to random port
        log_level: "warn".to_string(),
        encryption_key: ENCRYPTION_KEY.to_string(),
        admin_token: ADMIN_TOKEN.to_string(),
        notion: notion_config(notion_base),
        central_token: Some(CENTRAL_TOKEN.to_string()),
        github: Some(github_config(github_base)),
        quota: QuotaConfig::default(),
        transition_policy: TransitionPolicy::Overwrite,
        deploy: DeployConfig {
            delay: Duration::from_millis(50),
            domain: "vercel.app".to_string(),
        },
    }
}

pub fn registry(enforce_daily: bool) -> UserRegistry {
    UserRegistry::new(
        Arc::new(MemoryUserStore::new()),
        Arc::new(MemoryWindowStore::new()),
        enforce_daily,
    )
}

pub fn lifecycle(notion_base: &str, policy: TransitionPolicy) -> ProjectLifecycle {
    ProjectLifecycle::new(
        NotionClient::new(notion_base),
        notion_config(notion_base),
        Arc::new(MemoryProjectStore::new()),
        ENCRYPTION_KEY.to_string(),
        policy,
    )
}

pub fn register_request(user_id: &str) -> RegisterUser {
    RegisterUser {
        user_id: user_id.to_string(),
        email: Some(format!("{user_id}@example.com")),
        category_db_id: CATEGORY_DB.to_string(),
        content_db_id: CONTENT_DB.to_string(),
        tier: Default::default(),
    }
}

// ── Content API mocks ───────────────────────────────────────────

pub fn token_body(template_id: Option<&str>) -> Value {
    json!({
        "access_token": TENANT_TOKEN,
        "token_type": "bearer",
        "bot_id": "bot-1",
        "workspace_id": "ws-1",
        "workspace_name": "Acme Workspace",
        "workspace_icon": null,
        "duplicated_template_id": template_id,
        "owner": {
            "type": "user",
            "user": {
                "id": "user-1",
                "name": "Ada",
                "person": { "email": "ada@example.com" }
            }
        }
    })
}

pub fn token_response(template_id: Option<&str>) -> TokenResponse {
    serde_json::from_value(token_body(template_id)).unwrap()
}

pub async fn mock_token_exchange(server: &MockServer, template_id: Option<&str>) {
    Mock::given(method("POST"))
        .and(path("/v1/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(template_id)))
        .mount(server)
        .await;
}

pub async fn mock_database(server: &MockServer, database_id: &str, status: u16) {
    let body = if status == 200 {
        json!({ "object": "database", "id": database_id })
    } else {
        json!({ "object": "error", "status": status, "message": "Could not find database" })
    };
    Mock::given(method("GET"))
        .and(path(format!("/v1/databases/{database_id}")))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mock_query(server: &MockServer, database_id: &str, results: Value) {
    Mock::given(method("POST"))
        .and(path(format!("/v1/databases/{database_id}/query")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "results": results,
            "has_more": false,
        })))
        .mount(server)
        .await;
}

pub fn child_database(id: &str, title: &str) -> Value {
    json!({
        "object": "block",
        "id": id,
        "type": "child_database",
        "child_database": { "title": title }
    })
}

pub async fn mock_children(server: &MockServer, block_id: &str, blocks: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/blocks/{block_id}/children")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "results": blocks,
        })))
        .mount(server)
        .await;
}

/// Template page with both inline databases.
pub async fn mock_template(server: &MockServer) {
    mock_children(
        server,
        TEMPLATE_PAGE,
        json!([
            { "object": "block", "id": "para-1", "type": "paragraph" },
            child_database(CATEGORY_DB, "Category DB"),
            child_database(CONTENT_DB, "Content DB"),
        ]),
    )
    .await;
}

// ── Repository host mocks ───────────────────────────────────────

pub fn repo_body(owner: &str, name: &str) -> Value {
    json!({
        "id": 42,
        "name": name,
        "full_name": format!("{owner}/{name}"),
        "html_url": format!("https://github.com/{owner}/{name}"),
        "clone_url": format!("https://github.com/{owner}/{name}.git"),
        "default_branch": "main",
        "private": false,
        "owner": { "login": owner, "id": 7, "type": "User" }
    })
}

pub async fn mock_generate(server: &MockServer, owner: &str, name: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/repos/{TEMPLATE_OWNER}/{TEMPLATE_REPO}/generate")))
        .respond_with(ResponseTemplate::new(201).set_body_json(repo_body(owner, name)))
        .mount(server)
        .await;
}

pub async fn mock_repository(server: &MockServer, owner: &str, name: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/repos/{owner}/{name}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(repo_body(owner, name)))
        .mount(server)
        .await;
}

/// Serve `public_key` as the repository's secrets key and accept every upload.
pub async fn mock_secrets(server: &MockServer, owner: &str, name: &str, public_key: &[u8; 32]) {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;

    Mock::given(method("GET"))
        .and(path(format!("/repos/{owner}/{name}/actions/secrets/public-key")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "key_id": "key-1",
            "key": STANDARD.encode(public_key),
        })))
        .mount(server)
        .await;

    Mock::given(method("PUT"))
        .and(wiremock::matchers::path_regex(format!(
            r"^/repos/{owner}/{name}/actions/secrets/[A-Z_]+$"
        )))
        .respond_with(ResponseTemplate::new(201))
        .mount(server)
        .await;
}

/// Open a sealed secret body with the matching private key.
pub fn unseal(secret_key: &crypto_box::SecretKey, body: &[u8]) -> (String, String) {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;

    let body: Value = serde_json::from_slice(body).unwrap();
    let sealed = STANDARD
        .decode(body["encrypted_value"].as_str().unwrap())
        .unwrap();
    let plaintext = secret_key.unseal(&sealed).unwrap();
    (
        body["key_id"].as_str().unwrap().to_string(),
        String::from_utf8(plaintext).unwrap(),
    )
}

// ── Running server ──────────────────────────────────────────────

/// A running test server instance with mocked upstream APIs.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub state: SharedState,
    pub notion: MockServer,
    pub github: MockServer,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Make an unauthenticated GET request.
    pub async fn get(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Make an admin-authenticated GET request.
    pub async fn get_admin(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(ADMIN_TOKEN)
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Make an unauthenticated POST request with JSON body.
    pub async fn post(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Make a PUT request with JSON body, optionally with a bearer token.
    pub async fn put(&self, path: &str, token: Option<&str>, body: &Value) -> (Value, StatusCode) {
        let mut req = self.client.put(self.url(path)).json(body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.expect("put request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// GET without following redirects; returns the status and `Location`.
    pub async fn get_redirect(&self, path: &str) -> (StatusCode, String) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("redirect request failed");
        let status = resp.status();
        let location = resp
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        (status, location)
    }

    /// Run the OAuth round trip and return the created project id.
    pub async fn onboard(&self) -> String {
        let (_, location) = self.get_redirect("/api/auth/notion/authorize").await;
        let authorize = reqwest::Url::parse(&location).unwrap();
        let state = authorize
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap();

        let (status, location) = self
            .get_redirect(&format!(
                "/api/auth/notion/callback?code=auth-code&state={state}"
            ))
            .await;
        assert!(status.is_redirection(), "callback did not redirect");
        location
            .strip_prefix("/dashboard/")
            .unwrap_or_else(|| panic!("unexpected callback redirect: {location}"))
            .to_string()
    }
}

/// Spawn the app against fresh upstream mocks.
pub async fn spawn_app() -> TestApp {
    let notion = MockServer::start().await;
    let github = MockServer::start().await;

    let config = test_config(&notion.uri(), &github.uri());
    let (app, state) = nodesite::build_app(config);

    // Bind to random port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    // Spawn server in background
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        addr,
        client,
        state,
        notion,
        github,
    }
}
