//! Feature flags authored in Notion, synced into Vercel Edge Config, and
//! evaluated in the request path.
//!
//! The crate splits into an evaluation side and a sync side. Evaluation
//! ([`evaluate_flag`], [`FlagsClient`]) never fails a request: missing or
//! malformed data degrades to `false`/`None`. The sync side ([`Syncer`])
//! raises eagerly and relies on the poll loop as its only retry boundary.
//!
//! ```no_run
//! use std::sync::Arc;
//! use edgeflags_lib::{FlagsClient, VercelEdgeConfig};
//!
//! # async fn demo() {
//! let store = Arc::new(
//!     VercelEdgeConfig::from_connection_string(
//!         "https://edge-config.vercel.com/ecfg_abc?token=xxx",
//!         None,
//!     )
//!     .unwrap(),
//! );
//! let flags = FlagsClient::new(store).with_env("production");
//! if flags.is_enabled("checkoutRedesign").await {
//!     // new checkout
//! }
//! # }
//! ```

pub mod checkpoint;
pub mod client;
pub mod env;
pub mod error;
pub mod evaluate;
pub mod hash;
pub mod notion;
pub mod rules;
pub mod store;
pub mod syncer;
pub mod types;

pub use checkpoint::SyncSummary;
pub use client::FlagsClient;
pub use error::FlagsError;
pub use evaluate::{evaluate_flag, rollout_percent};
pub use hash::{bucket_percent, stable_hash};
pub use notion::{FlagRow, NotionClient, RowSource};
pub use rules::{default_predicates, rule_set, Predicate, PredicateMap, PredicateOutcome};
pub use store::edge_config::VercelEdgeConfig;
pub use store::memory::MemoryStore;
pub use store::{EdgeStore, PatchItem};
pub use syncer::{DriftPolicy, SyncOutcome, Syncer};
pub use types::{EvalContext, FlagRecord, FlagType, FlagValue, Rule, RuleSet};
