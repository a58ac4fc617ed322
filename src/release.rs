use crate::error::FetchError;
use crate::locator::glob_to_regex;
use crate::types::{AssetSelector, GitHubAsset, GitHubRelease, LatestRelease, ReleaseQuery};
use async_trait::async_trait;
use thiserror::Error;

/// Failure of the raw HTTP-GET-as-JSON capability.
#[derive(Debug, Error)]
pub enum FeedResponseError {
    #[error("{0}")]
    Network(String),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("{0}")]
    Body(String),
}

#[async_trait]
pub trait ReleaseFeed: Send + Sync {
    async fn get_json(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<serde_json::Value, FeedResponseError>;
}

/// `ReleaseFeed` backed by reqwest, talking to the GitHub REST API.
#[derive(Debug, Clone, Default)]
pub struct GitHubFeed {
    client: reqwest::Client,
}

impl GitHubFeed {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReleaseFeed for GitHubFeed {
    async fn get_json(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<serde_json::Value, FeedResponseError> {
        tracing::debug!("Fetching release info from: {}", url);

        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| FeedResponseError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("Release feed {} answered {}", url, status);
            return Err(FeedResponseError::Status(status.as_u16()));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| FeedResponseError::Body(e.to_string()))
    }
}

/// Headers sent with every feed request.
pub fn feed_headers(user_agent: &str, token: Option<&str>) -> Vec<(String, String)> {
    let mut headers = vec![
        ("Accept".to_string(), "application/json".to_string()),
        ("User-Agent".to_string(), user_agent.to_string()),
    ];
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        tracing::debug!("Using GitHub token");
        headers.push(("Authorization".to_string(), format!("token {}", token)));
    }
    headers
}

/// Resolves the download URL and version id of the newest release asset.
pub async fn fetch_latest(
    feed: &dyn ReleaseFeed,
    target: &str,
    query: &ReleaseQuery,
    headers: &[(String, String)],
) -> Result<LatestRelease, FetchError> {
    let payload = feed
        .get_json(&query.feed_url, headers)
        .await
        .map_err(|e| match e {
            FeedResponseError::Network(reason) => FetchError::Network {
                target: target.to_string(),
                url: query.feed_url.clone(),
                reason,
            },
            FeedResponseError::Status(status) => FetchError::Status {
                target: target.to_string(),
                status,
            },
            FeedResponseError::Body(reason) => FetchError::Parse {
                target: target.to_string(),
                reason,
            },
        })?;

    let mut releases: Vec<GitHubRelease> =
        serde_json::from_value(payload).map_err(|e| FetchError::Parse {
            target: target.to_string(),
            reason: e.to_string(),
        })?;

    // Newest first; entries without a timestamp keep their feed order at the end.
    releases.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let release = releases.into_iter().next().ok_or_else(|| FetchError::NoReleases {
        target: target.to_string(),
    })?;

    let asset = select_asset(&release.assets, &query.asset_selector).ok_or_else(|| {
        FetchError::NoMatchingAsset {
            target: target.to_string(),
            tag: release.tag_name.clone(),
            selector: query.asset_selector.to_string(),
        }
    })?;

    let latest = LatestRelease {
        url: compose_download_url(&query.download_url_template, &release.tag_name, &asset.name),
        version_id: asset.id.to_string(),
        tag: release.tag_name.clone(),
        asset_name: asset.name.clone(),
    };
    tracing::debug!(
        "[{}] latest release {} asset '{}' (id {})",
        target,
        latest.tag,
        latest.asset_name,
        latest.version_id
    );
    Ok(latest)
}

pub fn select_asset<'a>(
    assets: &'a [GitHubAsset],
    selector: &AssetSelector,
) -> Option<&'a GitHubAsset> {
    match selector {
        AssetSelector::Index(i) => assets.get(*i),
        AssetSelector::NamePattern(pattern) => match glob_to_regex(pattern) {
            Ok(re) => assets.iter().find(|a| re.is_match(&a.name)),
            Err(e) => {
                tracing::error!("Invalid asset pattern '{}': {}", pattern, e);
                None
            }
        },
    }
}

/// `template` + tag + `/` + asset name, with exactly one separator between
/// the template and the tag.
pub fn compose_download_url(template: &str, tag: &str, asset_name: &str) -> String {
    format!("{}/{}/{}", template.trim_end_matches('/'), tag, asset_name)
}
