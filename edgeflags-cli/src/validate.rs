use std::process;

use edgeflags_lib::env::resolve_environment;
use edgeflags_lib::RowSource;

use crate::config::CliConfig;

pub async fn run(config: &CliConfig, env_arg: Option<&str>) {
    let source = match config.notion_client() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };
    let env = resolve_environment(env_arg);

    // Full fetch: validation always looks at the whole database.
    let rows = match source.fetch_changed_rows(None).await {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("validation failed: {}", e);
            process::exit(1);
        }
    };

    let count = rows.iter().filter(|r| r.envs.iter().any(|e| e == &env)).count();
    println!("ok: {} rows for env={}", count, env);
}
