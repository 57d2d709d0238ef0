mod config;
mod diff;
mod export;
mod flip;
mod init;
mod sync;
mod validate;

use clap::{Parser, Subcommand};

use crate::config::CliConfig;

#[derive(Parser, Debug)]
#[command(name = "edgeflags")]
#[command(version)]
#[command(about = "Notion-authored feature flags, synced into Vercel Edge Config", long_about = None)]
struct Args {
    /// Path to config file
    #[arg(short = 'c', long = "config", default_value = "edgeflags.toml", global = true)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive setup: create the Notion flags database with sample rows
    Init,
    /// Run one sync cycle, or poll until interrupted
    Sync {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,

        /// Target environment (defaults to VERCEL_ENV / NODE_ENV / production)
        #[arg(short = 'e', long = "env")]
        env: Option<String>,

        /// Key namespace in Edge Config
        #[arg(short = 'n', long = "namespace")]
        namespace: Option<String>,

        /// Sleep between poll cycles, in milliseconds (minimum 1000)
        #[arg(long = "interval-ms")]
        interval_ms: Option<u64>,

        /// prefer-notion, prefer-edge-config or report-only
        #[arg(long = "drift-policy")]
        drift_policy: Option<edgeflags_lib::DriftPolicy>,
    },
    /// Manually override one flag in Edge Config
    Flip {
        /// Flag key (without namespace/environment prefix)
        #[arg(short = 'k', long = "key")]
        key: String,

        #[arg(short = 'e', long = "env")]
        env: Option<String>,

        /// New value: true/false, a number, JSON, or a bare string
        #[arg(short = 'v', long = "value")]
        value: Option<String>,

        /// Set the kill-switch explicitly; with no --value and no
        /// --enabled the kill-switch is toggled
        #[arg(long = "enabled")]
        enabled: Option<bool>,

        #[arg(short = 'n', long = "namespace")]
        namespace: Option<String>,
    },
    /// Fetch all rows from Notion and report how many parse for an environment
    Validate {
        #[arg(short = 'e', long = "env")]
        env: Option<String>,
    },
    /// Show desired-vs-current differences as JSON without writing
    Diff {
        #[arg(short = 'e', long = "env")]
        env: Option<String>,

        #[arg(short = 'n', long = "namespace")]
        namespace: Option<String>,
    },
    /// Dump the current Edge Config values for an environment as JSON
    Export {
        #[arg(short = 'e', long = "env")]
        env: Option<String>,

        #[arg(short = 'n', long = "namespace")]
        namespace: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = CliConfig::load(&args.config);

    match args.cmd {
        Command::Init => init::run(&config).await,
        Command::Sync {
            once,
            env,
            namespace,
            interval_ms,
            drift_policy,
        } => {
            sync::run(
                &config,
                once,
                env.as_deref(),
                namespace.as_deref(),
                interval_ms,
                drift_policy,
            )
            .await
        }
        Command::Flip {
            key,
            env,
            value,
            enabled,
            namespace,
        } => {
            flip::run(
                &config,
                &key,
                env.as_deref(),
                value.as_deref(),
                enabled,
                namespace.as_deref(),
            )
            .await
        }
        Command::Validate { env } => validate::run(&config, env.as_deref()).await,
        Command::Diff { env, namespace } => {
            diff::run(&config, env.as_deref(), namespace.as_deref()).await
        }
        Command::Export { env, namespace } => {
            export::run(&config, env.as_deref(), namespace.as_deref()).await
        }
    }
}
