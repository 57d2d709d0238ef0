//! Notion as the authoritative flag source.
//!
//! Rows live in a Notion database with a `key` title column, an `enabled`
//! checkbox, an `env` multi-select, an optional `type` select, and value
//! columns. Malformed rows raise a schema error carrying the page URL and
//! a remediation hint rather than being silently dropped.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::FlagsError;
use crate::types::{clamp_percent, FlagType};

pub const NOTION_VERSION: &str = "2022-06-28";

/// One flag row as fetched from the document store.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagRow {
    pub key: String,
    pub enabled: bool,
    pub value: Value,
    pub kind: Option<FlagType>,
    pub envs: Vec<String>,
    pub last_edited_at: String,
    pub page_url: Option<String>,
}

/// Document-store collaborator contract: return every row changed since
/// the given watermark (all rows when `None`), paginating internally.
#[async_trait]
pub trait RowSource: Send + Sync {
    async fn fetch_changed_rows(&self, since: Option<&str>) -> Result<Vec<FlagRow>, FlagsError>;
}

pub struct NotionClient {
    client: reqwest::Client,
    token: String,
    database_id: Option<String>,
    database_name: Option<String>,
}

impl NotionClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
            database_id: None,
            database_name: None,
        }
    }

    pub fn with_database_id(mut self, id: Option<String>) -> Self {
        self.database_id = id;
        self
    }

    pub fn with_database_name(mut self, name: Option<String>) -> Self {
        self.database_name = name;
        self
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, FlagsError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| FlagsError::StoreRead(e.to_string()))?;
        if !response.status().is_success() {
            return Err(FlagsError::StoreRead(format!(
                "notion returned {} for {}",
                response.status(),
                url
            )));
        }
        response
            .json()
            .await
            .map_err(|e| FlagsError::StoreRead(e.to_string()))
    }

    /// Use the configured database id, or look it up by name via search.
    async fn resolve_database_id(&self) -> Result<String, FlagsError> {
        if let Some(id) = &self.database_id {
            if !id.is_empty() {
                return Ok(id.clone());
            }
        }
        let name = self
            .database_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                FlagsError::Configuration(
                    "a Notion database id or database name is required".into(),
                )
            })?;

        let data = self
            .post(
                "https://api.notion.com/v1/search",
                &json!({
                    "query": name,
                    "filter": { "property": "object", "value": "database" }
                }),
            )
            .await?;

        let results = data["results"].as_array().cloned().unwrap_or_default();
        let name_lower = name.to_lowercase();
        let title_of = |r: &Value| {
            r["title"][0]["plain_text"]
                .as_str()
                .unwrap_or("")
                .to_lowercase()
        };
        if let Some(exact) = results.iter().find(|r| title_of(r) == name_lower) {
            if let Some(id) = exact["id"].as_str() {
                return Ok(id.to_string());
            }
        }
        if let Some(first) = results.first() {
            if let Some(id) = first["id"].as_str() {
                return Ok(id.to_string());
            }
        }
        Err(FlagsError::Configuration(format!(
            "notion database '{}' not found",
            name
        )))
    }
}

#[async_trait]
impl RowSource for NotionClient {
    async fn fetch_changed_rows(&self, since: Option<&str>) -> Result<Vec<FlagRow>, FlagsError> {
        let database_id = self.resolve_database_id().await?;
        let url = format!("https://api.notion.com/v1/databases/{}/query", database_id);

        let mut rows = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut body = json!({});
            if let Some(since) = since {
                body["filter"] = json!({
                    "timestamp": "last_edited_time",
                    "last_edited_time": { "on_or_after": since }
                });
            }
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }

            let data = self.post(&url, &body).await?;
            for page in data["results"].as_array().into_iter().flatten() {
                rows.push(parse_row(page)?);
            }
            if !data["has_more"].as_bool().unwrap_or(false) {
                break;
            }
            cursor = data["next_cursor"].as_str().map(String::from);
            if cursor.is_none() {
                break;
            }
        }
        Ok(rows)
    }
}

/// Decode one Notion page into a flag row.
pub fn parse_row(page: &Value) -> Result<FlagRow, FlagsError> {
    let page_id = page["id"].as_str().unwrap_or("");
    let page_url = format!("https://www.notion.so/{}", page_id.replace('-', ""));
    let props = &page["properties"];

    let key = read_title(&props["key"])
        .or_else(|| read_title(&props["Key"]))
        .ok_or_else(|| {
            FlagsError::schema(
                "missing required property 'key' (Title)",
                &page_url,
                "Add a Title column named 'key'.",
            )
        })?;

    let enabled = read_checkbox(&props["enabled"])
        .or_else(|| read_checkbox(&props["Enabled"]))
        .ok_or_else(|| {
            FlagsError::schema(
                "missing required property 'enabled' (Checkbox)",
                &page_url,
                "Add a Checkbox column named 'enabled'.",
            )
        })?;

    let envs = read_multi_select(&props["env"])
        .or_else(|| read_multi_select(&props["Env"]))
        .unwrap_or_default();
    if envs.is_empty() {
        return Err(FlagsError::schema(
            "missing 'env' (Multi-select)",
            &page_url,
            "Add an 'env' multi-select with values like development, preview, production.",
        ));
    }

    let kind = read_select(&props["type"]).or_else(|| read_select(&props["Type"]));
    let value = match kind {
        Some(kind) => read_value_by_type(kind, props, &page_url)?,
        None => read_generic_value(props),
    };

    Ok(FlagRow {
        key,
        enabled,
        value,
        kind,
        envs,
        last_edited_at: page["last_edited_time"].as_str().unwrap_or("").to_string(),
        page_url: Some(page_url),
    })
}

fn read_title(prop: &Value) -> Option<String> {
    if prop["type"].as_str() != Some("title") {
        return None;
    }
    prop["title"]
        .as_array()?
        .iter()
        .find_map(|t| t["plain_text"].as_str().filter(|s| !s.is_empty()))
        .map(String::from)
}

fn read_checkbox(prop: &Value) -> Option<bool> {
    if prop["type"].as_str() != Some("checkbox") {
        return None;
    }
    Some(prop["checkbox"].as_bool().unwrap_or(false))
}

fn read_select(prop: &Value) -> Option<FlagType> {
    if prop["type"].as_str() != Some("select") {
        return None;
    }
    prop["select"]["name"].as_str().and_then(FlagType::parse)
}

fn read_multi_select(prop: &Value) -> Option<Vec<String>> {
    if prop["type"].as_str() != Some("multi_select") {
        return None;
    }
    Some(
        prop["multi_select"]
            .as_array()?
            .iter()
            .filter_map(|x| x["name"].as_str())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
    )
}

fn read_rich_text_first(prop: &Value) -> Option<String> {
    prop["rich_text"]
        .as_array()?
        .first()?
        .get("plain_text")?
        .as_str()
        .map(String::from)
}

static NULL: Value = Value::Null;

fn first_present<'a>(props: &'a Value, names: &[&str]) -> &'a Value {
    for name in names {
        if !props[*name].is_null() {
            return &props[*name];
        }
    }
    &NULL
}

/// Coalesce on the extracted field, not the property: a filled but
/// wrongly-shaped `value` column falls through to the dedicated column.
fn first_number<'a>(props: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .map(|name| &props[*name]["number"])
        .find(|n| n.is_number())
}

fn first_rich_text(props: &Value, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| read_rich_text_first(&props[*name]))
}

fn read_value_by_type(kind: FlagType, props: &Value, page_url: &str) -> Result<Value, FlagsError> {
    match kind {
        FlagType::Number => first_number(props, &["value", "Value", "value_number"])
            .cloned()
            .ok_or_else(|| {
                FlagsError::schema(
                    "number value missing",
                    page_url,
                    "Ensure a Number in 'value' or add 'value_number'.",
                )
            }),
        FlagType::String => {
            first_rich_text(props, &["value", "Value", "value_string"])
                .map(Value::String)
                .ok_or_else(|| {
                    FlagsError::schema(
                        "string value missing",
                        page_url,
                        "Ensure first Rich text block in 'value' or add 'value_string'.",
                    )
                })
        }
        FlagType::Json => {
            let text = first_rich_text(props, &["value", "Value", "value_json"])
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| {
                    FlagsError::schema(
                        "JSON value missing",
                        page_url,
                        "Put JSON in the 'value' rich text field, or use 'value_json'.",
                    )
                })?;
            serde_json::from_str(&text).map_err(|_| {
                FlagsError::schema(
                    "JSON parse failed",
                    page_url,
                    format!("Ensure valid JSON in the rich text field. Current content: {}", truncate(&text, 100)),
                )
            })
        }
        FlagType::Percent => {
            let n = first_number(props, &["value", "Value", "value_percent"])
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0);
            Ok(json!(clamp_percent(n)))
        }
        FlagType::Rules => {
            let text = first_rich_text(props, &["value", "Value", "value_ruleset"])
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| {
                    FlagsError::schema(
                        "rules value missing",
                        page_url,
                        "Put rules JSON in the 'value' rich text field, or use 'value_ruleset'.",
                    )
                })?;
            serde_json::from_str(&text).map_err(|_| {
                FlagsError::schema(
                    "rules parse failed",
                    page_url,
                    format!(
                        "Ensure valid JSON like {{\"rules\":[{{\"if\":{{...}},\"then\":true}},{{\"else\":false}}]}}. Current content: {}",
                        truncate(&text, 100)
                    ),
                )
            })
        }
    }
}

/// Untyped rows: take whatever value column is filled in, parsing rich
/// text as JSON when possible and keeping it as a string otherwise.
fn read_generic_value(props: &Value) -> Value {
    for name in ["value", "Value"] {
        let prop = &props[name];
        match prop["type"].as_str() {
            Some("checkbox") => return json!(prop["checkbox"].as_bool().unwrap_or(false)),
            Some("number") if prop["number"].is_number() => return prop["number"].clone(),
            _ => {}
        }
    }
    if let Some(text) = read_rich_text_first(first_present(props, &["value", "Value"])) {
        if !text.is_empty() {
            return serde_json::from_str(&text).unwrap_or(Value::String(text));
        }
    }
    Value::Null
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
