//! Forge REST API access: the authenticated client, wire types, pagination,
//! and the enumerator that turns a token into the full list of repositories.
//!
//! Works against any GitHub-compatible API (github.com, Forgejo, Gitea) that
//! pages with `per_page`/`page` and serves these endpoints:
//!
//! | Endpoint                 | Used for                          |
//! |--------------------------|-----------------------------------|
//! | `GET user`               | the principal behind the token    |
//! | `GET user/orgs`          | organizations of the principal    |
//! | `GET users/{slug}/repos` | repositories of a user or an org  |

mod client;
#[cfg(test)]
pub(crate) mod fake;
mod pagination;
mod types;

pub use client::{ApiClient, HttpApiClient, join_api_path};
pub use pagination::{PER_PAGE, fetch_all_pages, page_url};
pub use types::{ForgeRepo, Organization, User};

use reqwest::Url;

use crate::errors::ApiError;

/// Walks the forge API for one principal.
pub struct Enumerator<'a> {
    client: &'a dyn ApiClient,
    api: Url,
}

impl<'a> Enumerator<'a> {
    pub fn new(client: &'a dyn ApiClient, api: Url) -> Self {
        Self { client, api }
    }

    /// The user the access token belongs to.
    pub async fn principal(&self) -> Result<User, ApiError> {
        let url = join_api_path(&self.api, &["user"])?;
        tracing::info!(url = %url, "Getting user");

        let body = self.client.get_json(&url).await?;
        let user: User = serde_json::from_value(body).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })?;

        tracing::debug!(user = %user.login, "Got user");
        Ok(user)
    }

    /// All organizations the principal belongs to, in API order.
    pub async fn organizations(&self) -> Result<Vec<Organization>, ApiError> {
        let url = join_api_path(&self.api, &["user", "orgs"])?;
        fetch_all_pages(self.client, &url).await
    }

    /// Scope slugs to enumerate: the principal first, then its organizations.
    ///
    /// No deduplication is done.
    pub async fn scopes(&self, principal: &User, include_orgs: bool) -> Result<Vec<String>, ApiError> {
        let mut slugs = vec![principal.login.clone()];
        if include_orgs {
            tracing::info!("Getting organizations for user");
            let orgs = self.organizations().await?;
            slugs.extend(orgs.into_iter().map(|o| o.login));
        }
        tracing::debug!(organizations = ?slugs, "Got organizations for user");
        Ok(slugs)
    }

    /// Every repository listed under `scope`.
    pub async fn repositories(&self, scope: &str) -> Result<Vec<ForgeRepo>, ApiError> {
        let url = join_api_path(&self.api, &["users", scope, "repos"])?;
        let repos: Vec<ForgeRepo> = fetch_all_pages(self.client, &url).await?;
        for repo in &repos {
            tracing::debug!(
                scope,
                full_name = %repo.full_name,
                clone_url = %repo.clone_url,
                "Got repository"
            );
        }
        Ok(repos)
    }
}
