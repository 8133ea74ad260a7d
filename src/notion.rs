//! Minimal client for the Notion content API and its OAuth token endpoint.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::models::TokenResponse;

pub const NOTION_VERSION: &str = "2022-06-28";

#[derive(Debug, Error)]
pub enum NotionError {
    #[error("Notion request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Notion API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Unexpected Notion response: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct BlockList {
    results: Vec<Block>,
}

#[derive(Debug, Deserialize)]
struct Block {
    id: String,
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    child_database: Option<ChildDatabase>,
}

#[derive(Debug, Deserialize)]
struct ChildDatabase {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    results: Vec<SearchObject>,
}

#[derive(Debug, Deserialize)]
struct SearchObject {
    object: String,
    id: String,
    #[serde(default)]
    title: Vec<RichText>,
}

#[derive(Debug, Deserialize)]
struct RichText {
    #[serde(default)]
    plain_text: String,
}

/// A database reference with the title used to classify it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSummary {
    pub id: String,
    pub title: String,
}

#[derive(Clone)]
pub struct NotionClient {
    http: Client,
    api_base: String,
}

impl NotionClient {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build reqwest client"),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{}", self.api_base, path)
    }

    fn authed(&self, req: RequestBuilder, token: &str) -> RequestBuilder {
        req.bearer_auth(token).header("Notion-Version", NOTION_VERSION)
    }

    pub async fn retrieve_database(&self, token: &str, database_id: &str) -> Result<Value, NotionError> {
        let req = self.http.get(self.url(&format!("/databases/{database_id}")));
        send(self.authed(req, token)).await
    }

    pub async fn retrieve_page(&self, token: &str, page_id: &str) -> Result<Value, NotionError> {
        let req = self.http.get(self.url(&format!("/pages/{page_id}")));
        send(self.authed(req, token)).await
    }

    pub async fn query_database(
        &self,
        token: &str,
        database_id: &str,
        body: &Value,
    ) -> Result<Value, NotionError> {
        let req = self
            .http
            .post(self.url(&format!("/databases/{database_id}/query")))
            .json(body);
        send(self.authed(req, token)).await
    }

    /// Direct child blocks of `block_id` that are inline databases.
    pub async fn child_databases(
        &self,
        token: &str,
        block_id: &str,
    ) -> Result<Vec<DatabaseSummary>, NotionError> {
        let req = self.http.get(self.url(&format!("/blocks/{block_id}/children")));
        let value = send(self.authed(req, token)).await?;
        let list: BlockList = serde_json::from_value(value)?;

        Ok(list
            .results
            .into_iter()
            .filter(|b| b.block_type == "child_database")
            .map(|b| DatabaseSummary {
                id: b.id,
                title: b.child_database.map(|d| d.title).unwrap_or_default(),
            })
            .collect())
    }

    /// Every database the token can see, titled by its first text fragment.
    pub async fn search_databases(&self, token: &str) -> Result<Vec<DatabaseSummary>, NotionError> {
        let req = self.http.post(self.url("/search")).json(&json!({
            "filter": { "property": "object", "value": "database" },
            "page_size": 100,
        }));
        let value = send(self.authed(req, token)).await?;
        let results: SearchResults = serde_json::from_value(value)?;

        Ok(results
            .results
            .into_iter()
            .filter(|r| r.object == "database")
            .map(|r| DatabaseSummary {
                id: r.id,
                title: r
                    .title
                    .into_iter()
                    .next()
                    .map(|t| t.plain_text)
                    .unwrap_or_default(),
            })
            .collect())
    }

    /// Authorization-code grant with client credentials in basic auth.
    /// Failures carry the status reason phrase.
    pub async fn exchange_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, NotionError> {
        let resp = self
            .http
            .post(self.url("/oauth/token"))
            .basic_auth(client_id, Some(client_secret))
            .json(&json!({
                "grant_type": "authorization_code",
                "code": code,
                "redirect_uri": redirect_uri,
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(NotionError::Api {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown status").to_string(),
            });
        }

        Ok(resp.json::<TokenResponse>().await?)
    }
}

async fn send(req: RequestBuilder) -> Result<Value, NotionError> {
    let resp = req.send().await?;
    let status = resp.status();

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown status").to_string());
        return Err(NotionError::Api {
            status: status.as_u16(),
            message,
        });
    }

    Ok(resp.json::<Value>().await?)
}
