//! MediaWiki Action API client.
//!
//! Implements [`ContentStore`] over `api.php` with `formatversion=2`.
//!
//! ### Specification
//!
//! - **Reads**: `action=query` over GET. Batched text reads put up to
//!   `titles_per_request` titles in one `titles=A|B|...` request. Batched
//!   reads, history, backlinks and the page listing follow `continue` until
//!   exhausted.
//! - **Writes**: `action=edit|delete|move` over POST with a CSRF token that is
//!   fetched once per session and refreshed once on `badtoken`.
//! - **Session**: cookies are kept by the HTTP client. `login` performs the
//!   bot-password flow (`meta=tokens&type=login`, then `action=login`).
//! - **Errors**: API error codes and HTTP statuses map to
//!   [`StoreErrorKind`](wikisweep_core::StoreErrorKind) in [`ApiError::kind`].

pub mod error;
pub mod response;

pub use error::ApiError;
pub use response::UserInfo;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use url::Url;
use wikisweep_core::{AppConfig, ContentStore, Revision, StoreError, StoreErrorKind, Title};

use response::{ErrorEnvelope, LoginResponse, QueryBody, QueryResponse, WriteResponse, continuation_params};

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default user agent.
const DEFAULT_USER_AGENT: &str = "wikisweep/0.1";

/// Titles per batched read. The API accepts 50 for normal accounts.
const DEFAULT_TITLES_PER_REQUEST: usize = 50;

/// Parameters sent with every request.
const FORMAT_PARAMS: [(&str, &str); 2] = [("format", "json"), ("formatversion", "2")];

type Params = Vec<(String, String)>;

fn params(action: &str, pairs: &[(&str, &str)]) -> Params {
    let mut params: Params = FORMAT_PARAMS.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    params.push(("action".to_string(), action.to_string()));
    params.extend(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    params
}

/// MediaWiki client configuration.
#[derive(Debug, Clone)]
pub struct WikiConfig {
    /// Full URL of `api.php`.
    pub api_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub titles_per_request: usize,
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost/w/api.php".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            titles_per_request: DEFAULT_TITLES_PER_REQUEST,
        }
    }
}

impl From<&AppConfig> for WikiConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            api_url: config.api_url.clone(),
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// Session against one wiki.
#[derive(Debug)]
pub struct MediaWikiClient {
    http: reqwest::Client,
    api_url: Url,
    config: WikiConfig,
    csrf_token: Mutex<Option<String>>,
}

impl MediaWikiClient {
    pub fn new(config: WikiConfig) -> Result<Self, ApiError> {
        let api_url =
            Url::parse(&config.api_url).map_err(|e| ApiError::InvalidUrl(format!("{}: {e}", config.api_url)))?;
        if !matches!(api_url.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl(config.api_url.clone()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .cookie_store(true)
            .build()?;

        Ok(Self { http, api_url, config, csrf_token: Mutex::new(None) })
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    /// Log in with a bot password. Returns the account name.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let response = self.query(&[("meta", "tokens"), ("type", "login")]).await?;
        let token = response
            .query
            .tokens
            .and_then(|t| t.logintoken)
            .ok_or(ApiError::MissingToken("login"))?;

        let form = params("login", &[("lgname", username), ("lgpassword", password), ("lgtoken", token.as_str())]);
        let response: LoginResponse = self.post(&form).await?;
        if response.login.result != "Success" {
            return Err(ApiError::LoginFailed(response.login.reason.unwrap_or(response.login.result)));
        }

        self.csrf_token.lock().await.take();
        let name = response.login.lgusername.unwrap_or_else(|| username.to_string());
        tracing::info!("logged in as {}", name);
        Ok(name)
    }

    /// The account behind this session, with its groups and rights.
    pub async fn user_info(&self) -> Result<UserInfo, ApiError> {
        let response = self.query(&[("meta", "userinfo"), ("uiprop", "groups|rights")]).await?;
        response
            .query
            .userinfo
            .ok_or_else(|| ApiError::Parse("userinfo missing from response".to_string()))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Vec<u8>, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::HttpError { status: status.as_u16() });
        }

        let bytes = response.bytes().await?;
        let envelope: ErrorEnvelope = serde_json::from_slice(&bytes).map_err(|e| ApiError::Parse(e.to_string()))?;
        if let Some(error) = envelope.error {
            return Err(ApiError::Api { code: error.code, info: error.info });
        }
        Ok(bytes.to_vec())
    }

    async fn get<T: DeserializeOwned>(&self, params: &Params) -> Result<T, ApiError> {
        let bytes = self.send(self.http.get(self.api_url.clone()).query(params)).await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Parse(e.to_string()))
    }

    async fn post<T: DeserializeOwned>(&self, form: &Params) -> Result<T, ApiError> {
        let bytes = self.send(self.http.post(self.api_url.clone()).form(form)).await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Parse(e.to_string()))
    }

    async fn query(&self, pairs: &[(&str, &str)]) -> Result<QueryResponse, ApiError> {
        tracing::debug!("query {:?}", pairs);
        self.get(&params("query", pairs)).await
    }

    /// Run a query and follow `continue` until the last batch.
    async fn query_all(&self, pairs: &[(&str, &str)]) -> Result<Vec<QueryBody>, ApiError> {
        let base = params("query", pairs);

        let mut bodies = Vec::new();
        let mut continuation = Params::new();
        loop {
            let mut request = base.clone();
            request.append(&mut continuation);
            tracing::debug!("query batch {} {:?}", bodies.len() + 1, pairs);

            let response: QueryResponse = self.get(&request).await?;
            bodies.push(response.query);
            match response.continuation {
                Some(next) => continuation = continuation_params(next),
                None => break,
            }
        }
        Ok(bodies)
    }

    async fn csrf_token(&self) -> Result<String, ApiError> {
        let mut cached = self.csrf_token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }
        let response = self.query(&[("meta", "tokens"), ("type", "csrf")]).await?;
        let token = response
            .query
            .tokens
            .and_then(|t| t.csrftoken)
            .ok_or(ApiError::MissingToken("csrf"))?;
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn post_with_token(&self, action: &str, pairs: &[(&str, &str)]) -> Result<WriteResponse, ApiError> {
        let token = self.csrf_token().await?;
        let mut form = params(action, pairs);
        form.push(("token".to_string(), token));
        self.post(&form).await
    }

    /// POST a write action, refreshing a stale token once.
    async fn write(&self, action: &str, pairs: &[(&str, &str)]) -> Result<WriteResponse, ApiError> {
        match self.post_with_token(action, pairs).await {
            Err(e) if e.code() == Some("badtoken") => {
                tracing::debug!("csrf token rejected, refreshing");
                self.csrf_token.lock().await.take();
                self.post_with_token(action, pairs).await
            }
            other => other,
        }
    }

    async fn page_revisions(&self, title: &str, extra: &[(&str, &str)]) -> Result<Vec<QueryBody>, ApiError> {
        let mut pairs = vec![("prop", "revisions"), ("rvslots", "main"), ("titles", title)];
        pairs.extend_from_slice(extra);
        self.query_all(&pairs).await
    }
}

#[async_trait]
impl ContentStore for MediaWikiClient {
    async fn exists(&self, title: &str) -> Result<bool, StoreError> {
        let response = self.query(&[("prop", "info"), ("titles", title)]).await?;
        Ok(response.query.pages.first().is_some_and(|p| p.exists()))
    }

    async fn get_text(&self, title: &str) -> Result<String, StoreError> {
        let response = self
            .query(&[("prop", "revisions"), ("rvprop", "content"), ("rvslots", "main"), ("titles", title)])
            .await?;
        let page = response
            .query
            .pages
            .into_iter()
            .next()
            .filter(|p| p.exists())
            .ok_or_else(|| StoreError::not_found(title))?;
        page.content()
            .map(str::to_string)
            .ok_or_else(|| StoreError::new(StoreErrorKind::Unknown, format!("content of {title} is hidden")))
    }

    async fn get_texts(&self, titles: &[Title]) -> Result<HashMap<Title, String>, StoreError> {
        let mut texts = HashMap::with_capacity(titles.len());
        for chunk in titles.chunks(self.config.titles_per_request.max(1)) {
            let joined = chunk.join("|");
            // Large batches spread revision content over several `rvcontinue` rounds.
            let bodies = self
                .query_all(&[("prop", "revisions"), ("rvprop", "content"), ("rvslots", "main"), ("titles", joined.as_str())])
                .await?;

            let mut requested: HashMap<String, String> = HashMap::new();
            let mut missing: Vec<String> = Vec::new();
            for body in &bodies {
                requested.extend(body.normalized.iter().map(|n| (n.to.clone(), n.from.clone())));
            }
            for page in bodies.iter().flat_map(|b| &b.pages) {
                let title = requested.get(&page.title).cloned().unwrap_or_else(|| page.title.clone());
                if !page.exists() {
                    missing.push(title);
                } else if let Some(content) = page.content() {
                    texts.insert(title, content.to_string());
                }
            }

            for title in chunk {
                if texts.contains_key(title) {
                    continue;
                }
                if missing.contains(title) {
                    tracing::debug!("{} does not exist", title);
                } else {
                    tracing::warn!("no content returned for {}", title);
                }
            }
        }
        Ok(texts)
    }

    async fn get_history(&self, title: &str) -> Result<Vec<Revision>, StoreError> {
        let bodies = self
            .page_revisions(title, &[("rvprop", "ids|user|content"), ("rvlimit", "max")])
            .await?;

        let mut history = Vec::new();
        for body in bodies {
            for page in body.pages {
                if !page.exists() {
                    return Err(StoreError::not_found(title));
                }
                history.extend(page.revisions.into_iter().map(Revision::from));
            }
        }
        Ok(history)
    }

    async fn save(&self, title: &str, text: &str, summary: &str, tags: &[String]) -> Result<(), StoreError> {
        let tags = tags.join("|");
        let mut pairs = vec![("title", title), ("text", text), ("summary", summary), ("bot", "1")];
        if !tags.is_empty() {
            pairs.push(("tags", tags.as_str()));
        }

        let response = self.write("edit", &pairs).await?;
        match response.edit {
            Some(edit) if edit.result == "Success" => {
                if edit.nochange {
                    tracing::debug!("edit of {} was a no-op", title);
                }
                Ok(())
            }
            Some(edit) => Err(ApiError::Unexpected { action: "edit", result: edit.result }.into()),
            None => Err(ApiError::Unexpected { action: "edit", result: "no edit body".to_string() }.into()),
        }
    }

    async fn delete(&self, title: &str, reason: &str) -> Result<(), StoreError> {
        let response = self.write("delete", &[("title", title), ("reason", reason)]).await?;
        match response.delete {
            Some(_) => Ok(()),
            None => Err(ApiError::Unexpected { action: "delete", result: "no delete body".to_string() }.into()),
        }
    }

    async fn move_page(&self, title: &str, new_title: &str, reason: &str) -> Result<(), StoreError> {
        let response = self
            .write("move", &[("from", title), ("to", new_title), ("reason", reason), ("movetalk", "1")])
            .await?;
        match response.moved {
            Some(_) => Ok(()),
            None => Err(ApiError::Unexpected { action: "move", result: "no move body".to_string() }.into()),
        }
    }

    async fn backlinks(&self, title: &str, redirects_only: bool) -> Result<Vec<Title>, StoreError> {
        let filter = if redirects_only { "redirects" } else { "all" };
        let bodies = self
            .query_all(&[("list", "backlinks"), ("bltitle", title), ("blfilterredir", filter), ("bllimit", "max")])
            .await?;
        Ok(bodies
            .into_iter()
            .flat_map(|b| b.backlinks)
            .map(|p| p.title)
            .collect())
    }

    async fn all_titles(&self) -> Result<Vec<Title>, StoreError> {
        let bodies = self
            .query_all(&[
                ("list", "allpages"),
                ("apnamespace", "0"),
                ("apfilterredir", "nonredirects"),
                ("aplimit", "max"),
            ])
            .await?;
        let titles: Vec<Title> = bodies
            .into_iter()
            .flat_map(|b| b.allpages)
            .map(|p| p.title)
            .collect();
        tracing::info!("listed {} pages", titles.len());
        Ok(titles)
    }
}
