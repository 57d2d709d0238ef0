use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{EdgeStore, PatchItem};
use crate::error::FlagsError;

/// Vercel Edge Config client over the management HTTP API.
///
/// Reads and writes both go through `api.vercel.com` with a bearer token;
/// the `PATCH /items` endpoint is all-or-nothing per call.
pub struct VercelEdgeConfig {
    client: reqwest::Client,
    edge_config_id: String,
    token: String,
    team_id: Option<String>,
}

impl VercelEdgeConfig {
    pub fn new(edge_config_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            edge_config_id: edge_config_id.into(),
            token: token.into(),
            team_id: None,
        }
    }

    pub fn with_team_id(mut self, team_id: Option<String>) -> Self {
        self.team_id = team_id;
        self
    }

    /// Build a client from an `EDGE_CONFIG` connection string like
    /// `https://edge-config.vercel.com/ecfg_abc?token=xxx`. When an API
    /// token is supplied it is used instead of the embedded read token,
    /// which is required for writes.
    pub fn from_connection_string(
        connection: &str,
        api_token: Option<&str>,
    ) -> Result<Self, FlagsError> {
        let (id, embedded_token) = parse_connection_string(connection)?;
        let token = api_token.map(String::from).unwrap_or(embedded_token);
        Ok(Self::new(id, token))
    }

    fn items_url(&self) -> String {
        format!(
            "https://api.vercel.com/v1/edge-config/{}/items",
            self.edge_config_id
        )
    }
}

/// Extract `(edge_config_id, token)` from a connection string.
pub fn parse_connection_string(connection: &str) -> Result<(String, String), FlagsError> {
    let url = reqwest::Url::parse(connection)
        .map_err(|_| FlagsError::Configuration("invalid EDGE_CONFIG connection string".into()))?;
    let id = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| FlagsError::Configuration("EDGE_CONFIG is missing the config id".into()))?
        .to_string();
    let token = url
        .query_pairs()
        .find(|(k, _)| k == "token")
        .map(|(_, v)| v.to_string())
        .ok_or_else(|| FlagsError::Configuration("EDGE_CONFIG is missing the token parameter".into()))?;
    Ok((id, token))
}

#[derive(Debug, Deserialize)]
struct WireItem {
    key: String,
    value: Value,
}

#[derive(Debug, Serialize)]
struct WirePatchItem<'a> {
    operation: &'static str,
    key: &'a str,
    value: &'a Value,
}

#[async_trait]
impl EdgeStore for VercelEdgeConfig {
    async fn get_all(&self) -> Result<HashMap<String, Value>, FlagsError> {
        let mut request = self.client.get(self.items_url()).bearer_auth(&self.token);
        if let Some(team) = &self.team_id {
            request = request.query(&[("teamId", team.as_str())]);
        }
        let response = request
            .send()
            .await
            .map_err(|e| FlagsError::StoreRead(e.to_string()))?;
        if !response.status().is_success() {
            return Err(FlagsError::StoreRead(format!(
                "edge config read returned {}",
                response.status()
            )));
        }
        let items: Vec<WireItem> = response
            .json()
            .await
            .map_err(|e| FlagsError::StoreRead(e.to_string()))?;
        Ok(items.into_iter().map(|i| (i.key, i.value)).collect())
    }

    async fn get_items(&self, keys: &[String]) -> Result<HashMap<String, Option<Value>>, FlagsError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let keys_param = serde_json::to_string(keys)
            .map_err(|e| FlagsError::StoreRead(e.to_string()))?;
        let mut request = self
            .client
            .get(self.items_url())
            .bearer_auth(&self.token)
            .query(&[("keys", keys_param.as_str())]);
        if let Some(team) = &self.team_id {
            request = request.query(&[("teamId", team.as_str())]);
        }
        let response = request
            .send()
            .await
            .map_err(|e| FlagsError::StoreRead(e.to_string()))?;
        if !response.status().is_success() {
            return Err(FlagsError::StoreRead(format!(
                "edge config read returned {}",
                response.status()
            )));
        }
        let items: Vec<WireItem> = response
            .json()
            .await
            .map_err(|e| FlagsError::StoreRead(e.to_string()))?;

        // Absent keys must map to None, never be omitted.
        let mut out: HashMap<String, Option<Value>> =
            keys.iter().map(|k| (k.clone(), None)).collect();
        for item in items {
            if let Some(slot) = out.get_mut(&item.key) {
                *slot = Some(item.value);
            }
        }
        Ok(out)
    }

    async fn patch_items(&self, items: &[PatchItem]) -> Result<(), FlagsError> {
        if items.is_empty() {
            return Ok(());
        }
        let wire: Vec<WirePatchItem> = items
            .iter()
            .map(|i| WirePatchItem {
                operation: "upsert",
                key: &i.key,
                value: &i.value,
            })
            .collect();
        let mut request = self
            .client
            .patch(self.items_url())
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "items": wire }));
        if let Some(team) = &self.team_id {
            request = request.query(&[("teamId", team.as_str())]);
        }
        let response = request
            .send()
            .await
            .map_err(|e| FlagsError::StoreWrite(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(FlagsError::StoreWrite(format!(
                "edge config write returned {}: {}",
                status, detail
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connection_string() {
        let (id, token) =
            parse_connection_string("https://edge-config.vercel.com/ecfg_abc123?token=secret")
                .unwrap();
        assert_eq!(id, "ecfg_abc123");
        assert_eq!(token, "secret");
    }

    #[test]
    fn test_parse_connection_string_missing_token() {
        assert!(parse_connection_string("https://edge-config.vercel.com/ecfg_abc123").is_err());
    }

    #[test]
    fn test_parse_connection_string_garbage() {
        assert!(parse_connection_string("not a url").is_err());
    }
}
