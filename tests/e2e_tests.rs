#![cfg(feature = "e2e")]

use retrolaunch::config::LauncherConfig;
use retrolaunch::release::{self, GitHubFeed};

#[tokio::test]
async fn e2e_fetch_latest_xenia_canary() {
    let config = LauncherConfig::default();
    let (target, query) = config.target("xenia_canary").expect("builtin target");
    let query = query.expect("xenia_canary has a release feed");

    let token = std::env::var("GITHUB_TOKEN").ok();
    let headers = release::feed_headers(&config.settings.user_agent, token.as_deref());

    let latest = release::fetch_latest(&GitHubFeed::new(), &target.name, &query, &headers)
        .await
        .expect("live feed should resolve");

    assert!(latest.url.starts_with(&query.download_url_template));
    assert!(latest.url.ends_with(&latest.asset_name));
    assert!(!latest.version_id.is_empty());
}

#[tokio::test]
async fn e2e_fetch_latest_rpcs3() {
    let config = LauncherConfig::default();
    let (target, query) = config.target("rpcs3").expect("builtin target");
    let query = query.expect("rpcs3 has a release feed");

    let token = std::env::var("GITHUB_TOKEN").ok();
    let headers = release::feed_headers(&config.settings.user_agent, token.as_deref());

    let latest = release::fetch_latest(&GitHubFeed::new(), &target.name, &query, &headers)
        .await
        .expect("live feed should resolve");

    assert!(!latest.tag.is_empty());
    assert!(!latest.version_id.is_empty());
}
