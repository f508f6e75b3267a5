// # Jenkins Master Source
//
// This crate provides a Jenkins-backed MasterSource implementation for the
// buildwatch system.
//
// ## Architecture
//
// One HTTP GET per trait call against the Jenkins remote-access JSON API,
// using `tree=` projections so masters only serialize the fields the
// detector compares:
//
// - Job listing: GET `{base}/api/json?tree=jobs[name,lastBuild[number,building,result]]`
// - Build history: GET `{base}/job/{job}/api/json?tree=builds[number,building,result]`
//
// ## Constraints
//
// - Stateless: no caching of listings (state is owned by the build cache)
// - No retry logic (the scheduler's next tick is the retry)
// - Failures surface as an error for that call only
//
// ## Security
//
// The API token is never logged; the Debug implementation redacts it.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use buildwatch_core::traits::{BuildSnapshot, Job, MasterSource};
use buildwatch_core::{Error, Result};
use serde::Deserialize;

/// Default HTTP timeout for master API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Tree projection for the job listing call
const JOBS_TREE: &str = "jobs[name,lastBuild[number,building,result]]";

/// Tree projection for the build-history call
const BUILDS_TREE: &str = "builds[number,building,result]";

/// Optional basic-auth credentials for masters that require them
#[derive(Clone)]
pub struct JenkinsAuth {
    /// API username
    pub username: String,
    /// API token
    /// ⚠️ NEVER log this value
    pub api_token: String,
}

/// Jenkins-backed master source
///
/// Resolves master identifiers to base URLs through a configured map and
/// performs single-shot JSON API calls per listing.
pub struct JenkinsSource {
    /// Master identifier -> base URL
    masters: HashMap<String, String>,

    /// Optional credentials applied to every request
    auth: Option<JenkinsAuth>,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for JenkinsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JenkinsSource")
            .field("masters", &self.masters)
            .field("auth", &self.auth.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl JenkinsSource {
    /// Create a new Jenkins source
    ///
    /// # Parameters
    ///
    /// - `masters`: Master identifier -> base URL (no trailing slash needed)
    /// - `auth`: Optional basic-auth credentials
    pub fn new(masters: HashMap<String, String>, auth: Option<JenkinsAuth>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::source(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            masters,
            auth,
            client,
        })
    }

    fn base_url(&self, master: &str) -> Result<&str> {
        self.masters
            .get(master)
            .map(|url| url.trim_end_matches('/'))
            .ok_or_else(|| Error::master(master, "unknown master"))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, master: &str, url: &str) -> Result<T> {
        let mut request = self.client.get(url);
        if let Some(auth) = &self.auth {
            request = request.basic_auth(&auth.username, Some(&auth.api_token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::master(master, format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::master(
                master,
                format!("HTTP error: {}", response.status()),
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::master(master, format!("bad response body: {}", e)))
    }
}

#[async_trait]
impl MasterSource for JenkinsSource {
    async fn list_jobs(&self, master: &str) -> Result<Vec<Job>> {
        let base = self.base_url(master)?;
        let url = format!("{}/api/json?tree={}", base, JOBS_TREE);

        tracing::debug!(master, "listing jobs");
        let listing: JobsResponse = self.get_json(master, &url).await?;

        Ok(listing.jobs.into_iter().map(Job::from).collect())
    }

    async fn list_builds(&self, master: &str, job: &str) -> Result<Vec<BuildSnapshot>> {
        let base = self.base_url(master)?;
        let url = format!("{}/job/{}/api/json?tree={}", base, job, BUILDS_TREE);

        tracing::debug!(master, job, "fetching build history");
        let history: BuildsResponse = self.get_json(master, &url).await?;

        Ok(history.builds.into_iter().map(BuildSnapshot::from).collect())
    }
}

/// Jenkins job-listing response
#[derive(Debug, Deserialize)]
struct JobsResponse {
    #[serde(default)]
    jobs: Vec<JobEntry>,
}

#[derive(Debug, Deserialize)]
struct JobEntry {
    name: String,
    #[serde(rename = "lastBuild")]
    last_build: Option<BuildEntry>,
}

impl From<JobEntry> for Job {
    fn from(entry: JobEntry) -> Self {
        Job::new(entry.name, entry.last_build.map(BuildSnapshot::from))
    }
}

/// Jenkins build-history response
#[derive(Debug, Deserialize)]
struct BuildsResponse {
    #[serde(default)]
    builds: Vec<BuildEntry>,
}

#[derive(Debug, Deserialize)]
struct BuildEntry {
    number: u64,
    building: bool,
    result: Option<String>,
}

impl From<BuildEntry> for BuildSnapshot {
    fn from(entry: BuildEntry) -> Self {
        BuildSnapshot {
            number: entry.number,
            building: entry.building,
            result: entry.result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_job_listing() {
        let body = r#"{
            "jobs": [
                {"name": "deploy", "lastBuild": {"number": 42, "building": false, "result": "SUCCESS"}},
                {"name": "smoke", "lastBuild": {"number": 7, "building": true, "result": null}},
                {"name": "brand-new", "lastBuild": null}
            ]
        }"#;

        let listing: JobsResponse = serde_json::from_str(body).unwrap();
        let jobs: Vec<Job> = listing.jobs.into_iter().map(Job::from).collect();

        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0].name, "deploy");
        assert_eq!(
            jobs[0].last_build,
            Some(BuildSnapshot::finished(42, "SUCCESS"))
        );
        assert_eq!(jobs[1].last_build, Some(BuildSnapshot::in_flight(7)));
        assert!(jobs[2].last_build.is_none());
    }

    #[test]
    fn parses_build_history() {
        let body = r#"{
            "builds": [
                {"number": 3, "building": false, "result": "FAILURE"},
                {"number": 4, "building": true, "result": null}
            ]
        }"#;

        let history: BuildsResponse = serde_json::from_str(body).unwrap();
        let builds: Vec<BuildSnapshot> =
            history.builds.into_iter().map(BuildSnapshot::from).collect();

        assert_eq!(builds.len(), 2);
        assert_eq!(builds[0], BuildSnapshot::finished(3, "FAILURE"));
        assert_eq!(builds[1], BuildSnapshot::in_flight(4));
    }

    #[test]
    fn parses_empty_listing() {
        let listing: JobsResponse = serde_json::from_str("{}").unwrap();
        assert!(listing.jobs.is_empty());
    }

    #[tokio::test]
    async fn unknown_master_is_an_error() {
        let source = JenkinsSource::new(HashMap::new(), None).unwrap();
        let result = source.list_jobs("nowhere").await;
        assert!(result.is_err());
    }

    #[test]
    fn debug_redacts_credentials() {
        let source = JenkinsSource::new(
            HashMap::new(),
            Some(JenkinsAuth {
                username: "ci-bot".to_string(),
                api_token: "super-secret".to_string(),
            }),
        )
        .unwrap();

        let debugged = format!("{:?}", source);
        assert!(!debugged.contains("super-secret"));
    }
}
