use thiserror::Error;

/// Client for the GitLab merge-request listing endpoint. The endpoint returns
/// a JSON array of merge requests; the task count is the array length.
pub struct GitlabClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("GitLab returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("unexpected response body: {0}")]
    Body(serde_json::Error),
}

impl GitlabClient {
    pub fn new(token: &str, base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(3))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            token: token.to_string(),
            base_url: base_url.to_string(),
        }
    }

    /// Number of open merge requests assigned to the token's user.
    /// No retry; transport timeouts are the client defaults.
    pub async fn fetch_assigned_count(&self) -> Result<usize, FetchError> {
        let response = self
            .client
            .get(endpoint_url(&self.base_url))
            .query(&[("scope", "assigned_to_me"), ("state", "opened")])
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.text().await?;
        count_from_body(&body).map_err(FetchError::Body)
    }
}

fn endpoint_url(base_url: &str) -> String {
    format!("{}/api/v4/merge_requests", base_url.trim_end_matches('/'))
}

fn count_from_body(body: &str) -> Result<usize, serde_json::Error> {
    let requests: Vec<serde_json::Value> = serde_json::from_str(body)?;
    Ok(requests.len())
}
