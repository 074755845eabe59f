use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::config::{env_string, env_u64, normalize_endpoint};
use crate::models::{GoalFrequency, GoalType, StudyGoal};

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone)]
pub struct GoalStoreConfig {
    pub api_endpoint: Option<String>,
    pub timeout: Duration,
}

impl GoalStoreConfig {
    pub fn from_env() -> Self {
        let api_endpoint = env_string("GOAL_STORE_ENDPOINT").map(normalize_endpoint);
        let timeout =
            Duration::from_millis(env_u64("GOAL_STORE_TIMEOUT").unwrap_or(DEFAULT_TIMEOUT_MS));

        Self { api_endpoint, timeout }
    }
}

#[derive(Debug, Error)]
pub enum GoalStoreError {
    #[error("goal store not configured: {0}")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: reqwest::StatusCode, body: String },
}

/// Fields the user chooses when creating a goal; the store assigns identity
/// and the client initializes progress and the reset timestamp.
#[derive(Debug, Clone)]
pub struct NewGoal {
    pub goal_type: GoalType,
    pub target: u32,
    pub frequency: GoalFrequency,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoalDocument {
    #[serde(rename = "type")]
    goal_type: GoalType,
    target: u32,
    frequency: GoalFrequency,
    progress: u32,
    last_reset: i64,
}

#[derive(Debug, Serialize)]
struct ProgressPatch {
    progress: u32,
}

/// CRUD façade over the remote per-user goal collection. No business logic:
/// ordering, identity assignment, and missing-id semantics are the store's
/// own contract.
#[derive(Clone)]
pub struct GoalStoreClient {
    config: GoalStoreConfig,
    client: reqwest::Client,
    bearer_token: Option<String>,
}

impl GoalStoreClient {
    pub fn new(config: GoalStoreConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { config, client, bearer_token: None }
    }

    pub fn from_env() -> Self {
        Self::new(GoalStoreConfig::from_env())
    }

    /// The store authenticates with the identity token of the signed-in user;
    /// cleared on sign-out.
    pub fn set_bearer_token(&mut self, token: Option<String>) {
        self.bearer_token = token;
    }

    fn endpoint(&self) -> Result<&str, GoalStoreError> {
        self.config
            .api_endpoint
            .as_deref()
            .ok_or(GoalStoreError::NotConfigured("GOAL_STORE_ENDPOINT"))
    }

    fn goals_url(&self, user_id: &str) -> Result<String, GoalStoreError> {
        Ok(format!("{}/users/{}/goals", self.endpoint()?, urlencoding::encode(user_id)))
    }

    fn goal_url(&self, user_id: &str, goal_id: &str) -> Result<String, GoalStoreError> {
        Ok(format!("{}/{}", self.goals_url(user_id)?, urlencoding::encode(goal_id)))
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, GoalStoreError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GoalStoreError::HttpStatus { status, body });
        }
        Ok(resp)
    }

    /// Full current collection, in the order the store returns it.
    pub async fn fetch_all(&self, user_id: &str) -> Result<Vec<StudyGoal>, GoalStoreError> {
        let url = self.goals_url(user_id)?;
        let resp = self.request(self.client.get(&url)).send().await?;
        let resp = Self::ensure_success(resp).await?;
        Ok(resp.json().await?)
    }

    /// Creates a goal with `progress = 0` and `lastReset = now`; the store
    /// assigns and returns the identity.
    pub async fn create(&self, user_id: &str, goal: NewGoal) -> Result<StudyGoal, GoalStoreError> {
        let url = self.goals_url(user_id)?;
        let document = GoalDocument {
            goal_type: goal.goal_type,
            target: goal.target,
            frequency: goal.frequency,
            progress: 0,
            last_reset: Utc::now().timestamp_millis(),
        };

        let resp = self.request(self.client.post(&url)).json(&document).send().await?;
        let resp = Self::ensure_success(resp).await?;
        Ok(resp.json().await?)
    }

    /// Deletes by identity. A missing id gets whatever the store does for it;
    /// nothing special happens here.
    pub async fn delete(&self, user_id: &str, goal_id: &str) -> Result<(), GoalStoreError> {
        let url = self.goal_url(user_id, goal_id)?;
        let resp = self.request(self.client.delete(&url)).send().await?;
        Self::ensure_success(resp).await?;
        Ok(())
    }

    /// Persists a new progress value. Callers treat this as fire-and-forget:
    /// the local optimistic update has already been applied and is not rolled
    /// back on failure.
    pub async fn update_progress(
        &self,
        user_id: &str,
        goal_id: &str,
        new_progress: u32,
    ) -> Result<(), GoalStoreError> {
        let url = self.goal_url(user_id, goal_id)?;
        let resp = self
            .request(self.client.patch(&url))
            .json(&ProgressPatch { progress: new_progress })
            .send()
            .await?;
        Self::ensure_success(resp).await?;
        Ok(())
    }
}
