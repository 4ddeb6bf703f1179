//! GitHub profile fetcher. Pulls a user's public profile and recent repos
//! and condenses them into the summary fed to the profile analysis prompt.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

const GITHUB_API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "UpSkill-App";
const REPOS_PER_PAGE: u32 = 30;
const TOP_LANGUAGES: usize = 5;
const TOP_REPOS: usize = 5;
const RECENT_MONTHS: u32 = 6;

#[derive(Debug, Clone, Error)]
pub enum GithubError {
    #[error("GitHub user not found")]
    NotFound,

    #[error("GitHub API rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("Failed to fetch GitHub profile: {0}")]
    Http(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubUser {
    pub login: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    #[serde(default)]
    pub public_repos: u32,
    #[serde(default)]
    pub followers: u32,
    #[serde(default)]
    pub following: u32,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubRepo {
    pub name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u32,
    #[serde(default)]
    pub forks_count: u32,
    pub html_url: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoSummary {
    pub name: String,
    pub description: String,
    pub language: Option<String>,
    pub stars: u32,
    pub forks: u32,
    pub url: String,
}

/// Condensed profile handed to the model and returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubProfile {
    pub username: String,
    pub name: String,
    pub bio: String,
    pub public_repos: u32,
    pub followers: u32,
    pub following: u32,
    pub created_at: Option<DateTime<Utc>>,
    pub primary_languages: Vec<String>,
    pub total_stars: u32,
    pub top_repos: Vec<RepoSummary>,
    pub recent_activity: u32,
    pub recent_repo_names: Vec<String>,
}

/// Source of GitHub profiles. `GithubClient` is the HTTP implementation.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn fetch_profile(&self, username: &str) -> Result<GithubProfile, GithubError>;
}

pub struct GithubClient {
    client: Client,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(token: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, token })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, GithubError> {
        let mut request = self
            .client
            .get(url)
            .query(query)
            .header("Accept", "application/vnd.github.v3+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GithubError::Http(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(GithubError::NotFound),
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => Err(GithubError::RateLimited),
            status if !status.is_success() => Err(GithubError::Http(format!("status {status}"))),
            _ => response
                .json()
                .await
                .map_err(|e| GithubError::Http(e.to_string())),
        }
    }
}

#[async_trait]
impl ProfileSource for GithubClient {
    async fn fetch_profile(&self, username: &str) -> Result<GithubProfile, GithubError> {
        info!("Fetching GitHub profile for {username}");

        let user: GithubUser = self
            .get_json(&format!("{GITHUB_API_BASE}/users/{username}"), &[])
            .await?;
        let repos: Vec<GithubRepo> = self
            .get_json(
                &format!("{GITHUB_API_BASE}/users/{username}/repos"),
                &[
                    ("sort", "updated".to_string()),
                    ("per_page", REPOS_PER_PAGE.to_string()),
                ],
            )
            .await?;

        let profile = summarize_profile(user, repos, Utc::now());
        info!(
            "GitHub profile fetched: {} repos, {} languages",
            profile.public_repos,
            profile.primary_languages.len()
        );
        Ok(profile)
    }
}

/// Builds the profile summary. `repos` are expected most-recently-updated first.
pub fn summarize_profile(user: GithubUser, repos: Vec<GithubRepo>, now: DateTime<Utc>) -> GithubProfile {
    let mut language_counts: HashMap<&str, usize> = HashMap::new();
    for lang in repos.iter().filter_map(|r| r.language.as_deref()) {
        *language_counts.entry(lang).or_default() += 1;
    }
    let mut languages: Vec<(&str, usize)> = language_counts.into_iter().collect();
    // Count desc, then name asc so ties are stable.
    languages.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let primary_languages = languages
        .into_iter()
        .take(TOP_LANGUAGES)
        .map(|(lang, _)| lang.to_string())
        .collect();

    let cutoff = now
        .checked_sub_months(Months::new(RECENT_MONTHS))
        .unwrap_or(now);
    let recent: Vec<&GithubRepo> = repos.iter().filter(|r| r.updated_at >= cutoff).collect();
    let recent_activity = recent.len() as u32;
    let recent_repo_names = recent.iter().take(TOP_REPOS).map(|r| r.name.clone()).collect();

    let total_stars = repos.iter().map(|r| r.stargazers_count).sum();

    let mut by_stars: Vec<&GithubRepo> = repos.iter().collect();
    by_stars.sort_by(|a, b| b.stargazers_count.cmp(&a.stargazers_count));
    let top_repos = by_stars
        .into_iter()
        .take(TOP_REPOS)
        .map(|r| RepoSummary {
            name: r.name.clone(),
            description: r
                .description
                .clone()
                .unwrap_or_else(|| "No description".to_string()),
            language: r.language.clone(),
            stars: r.stargazers_count,
            forks: r.forks_count,
            url: r.html_url.clone(),
        })
        .collect();

    GithubProfile {
        name: user.name.unwrap_or_else(|| user.login.clone()),
        username: user.login,
        bio: user.bio.unwrap_or_default(),
        public_repos: user.public_repos,
        followers: user.followers,
        following: user.following,
        created_at: user.created_at,
        primary_languages,
        total_stars,
        top_repos,
        recent_activity,
        recent_repo_names,
    }
}
