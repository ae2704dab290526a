use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::ServiceConfig;
use crate::nlu::service::NluService;
use crate::nlu::types::{Entity, IntentCandidate, NluResult};

/// NLU backend reached over HTTP (LUIS-style v2 query endpoint).
#[derive(Clone)]
pub struct HttpNluService {
    name: String,
    client: Client,
    endpoint: String,
    app_id: String,
    key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    query: String,
    #[serde(default)]
    top_scoring_intent: Option<ScoredIntent>,
    #[serde(default)]
    intents: Vec<ScoredIntent>,
    #[serde(default)]
    entities: Vec<EntityRecord>,
}

#[derive(Deserialize)]
struct ScoredIntent {
    intent: String,
    #[serde(default)]
    score: Option<f32>,
}

#[derive(Deserialize)]
struct EntityRecord {
    entity: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    score: Option<f32>,
}

impl HttpNluService {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            name: config.name.clone(),
            client: Client::builder()
                .timeout(Duration::from_millis(config.timeout_ms))
                .build()
                .unwrap_or_default(),
            endpoint: config.endpoint.clone(),
            app_id: config.app_id.clone(),
            key: config.key.clone(),
        }
    }

    async fn fetch(&self, text: &str) -> Result<QueryResponse> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", text),
                ("appId", self.app_id.as_str()),
                ("subscription-key", self.key.as_str()),
                ("verbose", "true"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("NLU Server Error: {}", response.status()));
        }

        Ok(response.json().await?)
    }

    fn into_result(response: QueryResponse) -> NluResult {
        let mut candidates: Vec<IntentCandidate> = response
            .intents
            .into_iter()
            .map(|i| IntentCandidate::new(i.intent, i.score.unwrap_or(0.0)))
            .collect();

        // Some app tiers only report the top intent.
        if let Some(top) = response.top_scoring_intent {
            if !candidates.iter().any(|c| c.intent == top.intent) {
                candidates.insert(0, IntentCandidate::new(top.intent, top.score.unwrap_or(0.0)));
            }
        }

        NluResult {
            query: response.query,
            candidates,
            entities: response
                .entities
                .into_iter()
                .map(|e| Entity {
                    kind: e.kind,
                    value: e.entity,
                    score: e.score,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl NluService for HttpNluService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(&self, text: &str, cancel: &CancellationToken) -> Result<NluResult> {
        // Covers both the round trip and the body read.
        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(anyhow!("query cancelled")),
            body = self.fetch(text) => body?,
        };
        Ok(Self::into_result(body))
    }
}
