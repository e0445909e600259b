use serde::{Deserialize, Serialize};

/// The account the access token belongs to (subset of fields we care about).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
}

/// An organization the principal is a member of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub login: String,
}

/// A repository listed under a user or organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgeRepo {
    /// `owner/name`
    pub full_name: String,
    pub clone_url: String,
    /// Forgejo and GitHub both send this; absent on some mirrors.
    #[serde(default)]
    pub default_branch: Option<String>,
}
