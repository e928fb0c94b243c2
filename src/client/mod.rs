use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{VoteSubmission, VoteTally};
use async_trait::async_trait;
use log::{debug, error};
use reqwest::Url;

/// The two remote endpoints the widget talks to.
#[async_trait]
pub trait VoteBackend: Send + Sync {
    /// Record one vote. Session de-duplication is the server's business.
    async fn submit_vote(&self, submission: &VoteSubmission) -> Result<()>;

    /// Fetch the current aggregate counts.
    async fn fetch_results(&self) -> Result<VoteTally>;
}

pub struct HttpBackend {
    client: reqwest::Client,
    vote_url: Url,
    results_url: Url,
}

impl HttpBackend {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self::with_client(client, config.vote_url.clone(), config.results_url.clone()))
    }

    pub fn with_client(client: reqwest::Client, vote_url: Url, results_url: Url) -> Self {
        Self {
            client,
            vote_url,
            results_url,
        }
    }
}

#[async_trait]
impl VoteBackend for HttpBackend {
    async fn submit_vote(&self, submission: &VoteSubmission) -> Result<()> {
        debug!("Posting vote {} to {}", submission.rating, self.vote_url);
        let response = self
            .client
            .post(self.vote_url.clone())
            .json(submission)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!("Failed to submit vote: {}", status);
            return Err(Error::Status(status));
        }
        Ok(())
    }

    async fn fetch_results(&self) -> Result<VoteTally> {
        let response = self.client.get(self.results_url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            error!("Failed to get results: {}", status);
            return Err(Error::Status(status));
        }

        let body = response.bytes().await?;
        VoteTally::from_json(&body)
    }
}
