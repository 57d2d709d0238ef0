use std::io::{self, BufRead, Write};
use std::process;

use edgeflags_lib::notion::NOTION_VERSION;
use serde_json::{json, Value};

use crate::config::CliConfig;

fn prompt(question: &str) -> String {
    print!("{} ", question);
    let _ = io::stdout().flush();
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line).is_err() {
        return String::new();
    }
    line.trim().to_string()
}

async fn notion_post(client: &reqwest::Client, token: &str, url: &str, body: Value) -> Value {
    let response = client
        .post(url)
        .bearer_auth(token)
        .header("Notion-Version", NOTION_VERSION)
        .json(&body)
        .send()
        .await;
    let response = match response {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Notion request failed: {}", e);
            process::exit(1);
        }
    };
    if !response.status().is_success() {
        let status = response.status();
        let detail = response.text().await.unwrap_or_default();
        eprintln!("Notion returned {}: {}", status, detail);
        process::exit(1);
    }
    response.json().await.unwrap_or(Value::Null)
}

/// Interactive setup: creates the flags database under a parent page and
/// seeds it with one sample row per value type.
pub async fn run(config: &CliConfig) {
    println!("edgeflags setup");
    println!();
    println!("Step 1: Notion Integration");
    println!("1. Go to https://www.notion.so/my-integrations");
    println!("2. Click 'New integration' and name it 'Feature Flags'");
    println!("3. Copy the Internal Integration Token");
    println!();

    let token = match &config.notion.token {
        Some(t) if !t.is_empty() => t.clone(),
        _ => prompt("Paste your NOTION_TOKEN:"),
    };
    if token.is_empty() {
        eprintln!("NOTION_TOKEN required");
        process::exit(1);
    }

    println!();
    println!("Step 2: Parent Page");
    println!("1. Open any Notion page in your workspace");
    println!("2. Copy the URL (contains a 32-char hex id at the end)");
    println!();

    let parent_page_id = prompt("Paste the 32-char page ID:");
    if parent_page_id.len() != 32 {
        eprintln!("Invalid page ID (must be 32 characters)");
        process::exit(1);
    }

    let db_name = match &config.notion.database_name {
        Some(name) if !name.is_empty() => name.clone(),
        _ => {
            let entered = prompt("Database name (default: Feature Flags):");
            if entered.is_empty() {
                "Feature Flags".to_string()
            } else {
                entered
            }
        }
    };

    let client = reqwest::Client::new();

    let db = notion_post(
        &client,
        &token,
        "https://api.notion.com/v1/databases",
        json!({
            "parent": { "type": "page_id", "page_id": parent_page_id },
            "title": [{ "type": "text", "text": { "content": db_name } }],
            "properties": {
                "key": { "title": {} },
                "enabled": { "checkbox": {} },
                "type": { "select": { "options": [
                    { "name": "string" }, { "name": "number" }, { "name": "json" },
                    { "name": "percent" }, { "name": "rules" }
                ] } },
                "env": { "multi_select": { "options": [
                    { "name": "development" }, { "name": "preview" }, { "name": "production" }
                ] } },
                "value_number": { "number": {} },
                "value_string": { "rich_text": {} },
                "value_json": { "rich_text": {} },
                "value_percent": { "number": {} },
                "value_ruleset": { "rich_text": {} }
            }
        }),
    )
    .await;

    let db_id = match db["id"].as_str() {
        Some(id) => id.to_string(),
        None => {
            eprintln!("Notion did not return a database id");
            process::exit(1);
        }
    };

    let env_dev = json!({ "multi_select": [{ "name": "development" }] });
    let sample_rules =
        r#"{"rules":[{"if":{"country":"PL"},"then":true},{"else":false}]}"#;
    let samples = [
        json!({
            "key": { "title": [{ "text": { "content": "checkoutRedesign" } }] },
            "enabled": { "checkbox": true },
            "env": env_dev
        }),
        json!({
            "key": { "title": [{ "text": { "content": "testNumber" } }] },
            "enabled": { "checkbox": true },
            "type": { "select": { "name": "number" } },
            "env": env_dev,
            "value_number": { "number": 42 }
        }),
        json!({
            "key": { "title": [{ "text": { "content": "testString" } }] },
            "enabled": { "checkbox": true },
            "type": { "select": { "name": "string" } },
            "env": env_dev,
            "value_string": { "rich_text": [{ "text": { "content": "hello" } }] }
        }),
        json!({
            "key": { "title": [{ "text": { "content": "testJSON" } }] },
            "enabled": { "checkbox": true },
            "type": { "select": { "name": "json" } },
            "env": env_dev,
            "value_json": { "rich_text": [{ "text": { "content": "{\"a\":1,\"b\":\"x\"}" } }] }
        }),
        json!({
            "key": { "title": [{ "text": { "content": "testPercent" } }] },
            "enabled": { "checkbox": true },
            "type": { "select": { "name": "percent" } },
            "env": env_dev,
            "value_percent": { "number": 25 }
        }),
        json!({
            "key": { "title": [{ "text": { "content": "testRules" } }] },
            "enabled": { "checkbox": true },
            "type": { "select": { "name": "rules" } },
            "env": env_dev,
            "value_ruleset": { "rich_text": [{ "text": { "content": sample_rules } }] }
        }),
    ];

    for properties in &samples {
        notion_post(
            &client,
            &token,
            "https://api.notion.com/v1/pages",
            json!({ "parent": { "database_id": db_id }, "properties": properties }),
        )
        .await;
    }

    println!();
    println!("Created database \"{}\" with {} sample flags", db_name, samples.len());
    println!("Database ID: {}", db_id);
    println!("View: https://www.notion.so/{}", db_id.replace('-', ""));
    println!();
    println!("Add these to your environment (or edgeflags.toml):");
    println!();
    println!("NOTION_TOKEN={}", token);
    println!("NOTION_FLAGS_DB={}", db_id);
    println!("NOTION_FLAGS_DB_NAME=\"{}\"", db_name);
    println!();
    println!("Still needed (get from Vercel):");
    println!("EDGE_CONFIG=https://edge-config.vercel.com/ecfg_xxx?token=xxx");
    println!("VERCEL_API_TOKEN=xxx");
    println!();
    println!("Next steps:");
    println!("  1. Share the database with your Notion integration");
    println!("  2. edgeflags validate --env development");
    println!("  3. edgeflags sync --env development --once");
}
