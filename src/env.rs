//! Environment resolution and the flat key layout used in Edge Config.

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "flag";

/// Resolve the target environment: explicit value first, then
/// `VERCEL_ENV`, then `NODE_ENV`, falling back to `production`.
pub fn resolve_environment(explicit: Option<&str>) -> String {
    if let Some(env) = explicit {
        if !env.is_empty() {
            return env.to_string();
        }
    }
    if let Ok(env) = std::env::var("VERCEL_ENV") {
        if !env.is_empty() {
            return env;
        }
    }
    if let Ok(env) = std::env::var("NODE_ENV") {
        if !env.is_empty() {
            return env;
        }
    }
    "production".to_string()
}

/// Flat key for one flag: `{namespace}__{environment}__{key}`.
pub fn namespaced_key(namespace: &str, env: &str, key: &str) -> String {
    format!("{}__{}__{}", namespace, env, key)
}

/// Reserved key holding the last-synced ISO-8601 watermark.
pub fn checkpoint_key(namespace: &str, env: &str) -> String {
    format!("{}__sync__{}__checkpoint", namespace, env)
}

/// Reserved key holding the last sync summary (count, timestamp, checksum).
pub fn summary_key(namespace: &str, env: &str) -> String {
    format!("{}__sync__{}__summary", namespace, env)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaced_key_format() {
        assert_eq!(
            namespaced_key("flag", "development", "checkoutRedesign"),
            "flag__development__checkoutRedesign"
        );
    }

    #[test]
    fn test_reserved_keys() {
        assert_eq!(checkpoint_key("flag", "production"), "flag__sync__production__checkpoint");
        assert_eq!(summary_key("flag", "production"), "flag__sync__production__summary");
    }

    #[test]
    fn test_explicit_environment_wins() {
        assert_eq!(resolve_environment(Some("preview")), "preview");
        assert_eq!(resolve_environment(Some("custom-env")), "custom-env");
    }
}
