//! In-memory forge used by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::{Value, json};

use super::client::ApiClient;
use crate::errors::ApiError;

pub(crate) const FAKE_API: &str = "https://forge.test/api/v1/";
const FAKE_PATH_PREFIX: &str = "/api/v1/";

/// Serves `user` and paged collections keyed by path relative to `FAKE_API`.
pub(crate) struct FakeForge {
    login: String,
    collections: HashMap<String, Vec<Value>>,
    raw: HashMap<String, Value>,
    failures: HashMap<(String, u32), u16>,
    page_cap: Option<usize>,
    requests: Mutex<Vec<Url>>,
}

impl FakeForge {
    pub(crate) fn new(login: &str) -> Self {
        Self {
            login: login.to_string(),
            collections: HashMap::new(),
            raw: HashMap::new(),
            failures: HashMap::new(),
            page_cap: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_collection(mut self, path: &str, items: Vec<Value>) -> Self {
        self.collections.insert(path.to_string(), items);
        self
    }

    pub(crate) fn with_raw(mut self, path: &str, body: Value) -> Self {
        self.raw.insert(path.to_string(), body);
        self
    }

    /// Answer `page` of `path` (page 0 matches non-paged requests) with `status`.
    pub(crate) fn with_failing_page(mut self, path: &str, page: u32, status: u16) -> Self {
        self.failures.insert((path.to_string(), page), status);
        self
    }

    /// Serve at most `cap` items per page regardless of `per_page`.
    pub(crate) fn with_page_cap(mut self, cap: usize) -> Self {
        self.page_cap = Some(cap);
        self
    }

    pub(crate) fn requests(&self) -> Vec<Url> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn query_usize(url: &Url, key: &str) -> Option<usize> {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.parse().ok())
    }
}

#[async_trait]
impl ApiClient for FakeForge {
    async fn get_json(&self, url: &Url) -> Result<Value, ApiError> {
        self.requests.lock().unwrap().push(url.clone());

        let path = url
            .path()
            .strip_prefix(FAKE_PATH_PREFIX)
            .unwrap_or(url.path())
            .to_string();
        let page = Self::query_usize(url, "page").unwrap_or(0) as u32;

        if let Some(status) = self.failures.get(&(path.clone(), page)) {
            return Err(ApiError::Status {
                url: url.to_string(),
                status: *status,
            });
        }
        if let Some(body) = self.raw.get(&path) {
            return Ok(body.clone());
        }
        if path == "user" {
            return Ok(json!({ "login": self.login, "id": 1 }));
        }

        let Some(items) = self.collections.get(&path) else {
            return Err(ApiError::Status {
                url: url.to_string(),
                status: 404,
            });
        };

        let per_page = Self::query_usize(url, "per_page").unwrap_or(30);
        let per_page = self.page_cap.map_or(per_page, |cap| per_page.min(cap));
        let start = (page.max(1) as usize - 1) * per_page;
        let page_items: Vec<Value> = items.iter().skip(start).take(per_page).cloned().collect();
        Ok(Value::Array(page_items))
    }
}

/// `count` repository records owned by `owner`, named `repo0..`.
pub(crate) fn repo_items(owner: &str, count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({
                "full_name": format!("{}/repo{}", owner, i),
                "clone_url": format!("https://forge.test/{}/repo{}.git", owner, i),
                "default_branch": "main",
            })
        })
        .collect()
}

pub(crate) fn org_items(logins: &[&str]) -> Vec<Value> {
    logins.iter().map(|l| json!({ "login": l })).collect()
}
