use crate::client::DEFAULT_BASE_URL;
use crate::error::{Error, Result};
use crate::storage::{repository, Database};

pub const ENV_ORGANIZATION: &str = "COPILOT_ORGANIZATION";
pub const ENV_TOKEN: &str = "GITHUB_TOKEN";
pub const ENV_BASE_URL: &str = "COPILOT_BASE_URL";

/// Connection settings for the GitHub usage endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub organization: String,
    pub token: String,
    pub base_url: String,
}

impl Settings {
    /// Resolve settings from the command line, the process environment and
    /// the `app_config` table, in that order of precedence.
    pub async fn resolve(db: &Database, cli_org: Option<&str>) -> Result<Self> {
        Self::resolve_with(db, cli_org, |key| std::env::var(key).ok()).await
    }

    pub async fn resolve_with<F>(db: &Database, cli_org: Option<&str>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let stored = db.reader().call(|conn| repository::list_config(conn)).await?;
        let stored_value = |key: &str| {
            stored
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        let organization = non_empty(cli_org.map(str::to_string))
            .or_else(|| non_empty(env(ENV_ORGANIZATION)))
            .or_else(|| non_empty(stored_value("organization")))
            .ok_or_else(|| {
                Error::Config(format!(
                    "no organization configured. Pass --org, set {ENV_ORGANIZATION}, \
                     or run 'copilotdw config set organization <name>'"
                ))
            })?;

        let token = non_empty(env(ENV_TOKEN))
            .or_else(|| non_empty(stored_value("token")))
            .ok_or_else(|| {
                Error::Config(format!(
                    "no GitHub token configured. Set {ENV_TOKEN} \
                     or run 'copilotdw config set token <token>'"
                ))
            })?;

        let base_url = non_empty(env(ENV_BASE_URL))
            .or_else(|| non_empty(stored_value("base_url")))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        url::Url::parse(&base_url)
            .map_err(|e| Error::Config(format!("invalid base URL {base_url:?}: {e}")))?;

        Ok(Self {
            organization: organization.trim().to_string(),
            token,
            base_url,
        })
    }
}
