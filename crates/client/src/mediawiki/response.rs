//! MediaWiki Action API response types (`formatversion=2`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use wikisweep_core::Revision;

/// `{"error": {...}}`, present on any failed call.
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    #[serde(default)]
    pub info: String,
}

/// Response to `action=query`.
#[derive(Debug, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub query: QueryBody,
    /// Parameters to merge into the next request, absent on the last batch.
    #[serde(rename = "continue")]
    pub continuation: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QueryBody {
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub normalized: Vec<Normalized>,
    #[serde(default)]
    pub backlinks: Vec<ListedPage>,
    #[serde(default)]
    pub allpages: Vec<ListedPage>,
    pub tokens: Option<Tokens>,
    pub userinfo: Option<UserInfo>,
}

#[derive(Debug, Deserialize)]
pub struct Page {
    pub title: String,
    #[serde(default)]
    pub missing: bool,
    #[serde(default)]
    pub invalid: bool,
    #[serde(default)]
    pub revisions: Vec<RawRevision>,
}

impl Page {
    pub fn exists(&self) -> bool {
        !self.missing && !self.invalid
    }

    /// Content of the newest fetched revision.
    pub fn content(&self) -> Option<&str> {
        self.revisions.first().and_then(RawRevision::content)
    }
}

#[derive(Debug, Deserialize)]
pub struct RawRevision {
    pub revid: u64,
    pub user: Option<String>,
    #[serde(default)]
    pub userhidden: bool,
    pub slots: Option<Slots>,
}

impl RawRevision {
    pub fn content(&self) -> Option<&str> {
        self.slots.as_ref().and_then(|s| s.main.content.as_deref())
    }
}

impl From<RawRevision> for Revision {
    fn from(raw: RawRevision) -> Self {
        let text = raw.content().map(str::to_string);
        let editor = if raw.userhidden { None } else { raw.user.filter(|u| !u.is_empty()) };
        Revision { editor, revision_id: raw.revid, text }
    }
}

#[derive(Debug, Deserialize)]
pub struct Slots {
    pub main: Slot,
}

#[derive(Debug, Deserialize)]
pub struct Slot {
    pub content: Option<String>,
}

/// Title rewrite applied by the API (`foo_bar` -> `Foo bar`).
#[derive(Debug, Deserialize)]
pub struct Normalized {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Deserialize)]
pub struct ListedPage {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct Tokens {
    pub csrftoken: Option<String>,
    pub logintoken: Option<String>,
}

/// The logged-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
    #[serde(default)]
    pub anon: bool,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub rights: Vec<String>,
}

impl UserInfo {
    pub fn has_right(&self, right: &str) -> bool {
        self.rights.iter().any(|r| r == right)
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub login: LoginBody,
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub result: String,
    pub reason: Option<String>,
    pub lgusername: Option<String>,
}

/// Response to `action=edit`, `action=delete` or `action=move`. Exactly one
/// of the bodies is present.
#[derive(Debug, Deserialize)]
pub struct WriteResponse {
    pub edit: Option<EditBody>,
    pub delete: Option<Value>,
    #[serde(rename = "move")]
    pub moved: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct EditBody {
    pub result: String,
    #[serde(default)]
    pub nochange: bool,
}

/// Flatten a continuation object into request parameters.
pub fn continuation_params(continuation: BTreeMap<String, Value>) -> Vec<(String, String)> {
    continuation
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_revisions_query() {
        let json = r#"{
            "batchcomplete": true,
            "continue": {"rvcontinue": "20240101|42", "continue": "||"},
            "query": {
                "normalized": [{"fromencoded": false, "from": "foo", "to": "Foo"}],
                "pages": [
                    {"pageid": 1, "ns": 0, "title": "Foo", "revisions": [
                        {"revid": 7, "user": "Bot", "slots": {"main": {"contentmodel": "wikitext", "content": "hello"}}},
                        {"revid": 5, "userhidden": true, "slots": {"main": {"content": "older"}}}
                    ]},
                    {"ns": 0, "title": "Missing", "missing": true}
                ]
            }
        }"#;
        let response: QueryResponse = serde_json::from_str(json).unwrap();

        let foo = &response.query.pages[0];
        assert!(foo.exists());
        assert_eq!(foo.content(), Some("hello"));
        assert!(!response.query.pages[1].exists());
        assert_eq!(response.query.normalized[0].to, "Foo");

        let params = continuation_params(response.continuation.unwrap());
        assert!(params.contains(&("rvcontinue".to_string(), "20240101|42".to_string())));
    }

    #[test]
    fn test_hidden_user_becomes_none() {
        let raw = RawRevision { revid: 5, user: None, userhidden: true, slots: None };
        let revision = Revision::from(raw);
        assert_eq!(revision.editor, None);
        assert_eq!(revision.revision_id, 5);
        assert_eq!(revision.text, None);
    }
}
