//! Stable string hashing for percentage rollout bucketing.
//!
//! The hash must be bit-for-bit reproducible across implementations, so
//! rollout cohorts survive a migration between SDKs. DJB2 variant: start
//! at 5381, then `h = h * 33 + unit` with wrapping arithmetic, where
//! `unit` is a UTF-16 code unit. Non-BMP characters hash as their
//! surrogate pair, matching JavaScript's `charCodeAt`.

/// Deterministic 32-bit hash of a string. No seeding, no global state.
pub fn stable_hash(input: &str) -> u32 {
    let mut hash: u32 = 5381;
    for unit in input.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_add(hash)
            .wrapping_add(unit as u32);
    }
    hash
}

/// Bucket a (flag key, unit id) pair into `[0, 99]`.
///
/// Same pair always yields the same bucket, which is what makes raising a
/// rollout percentage purely additive.
pub fn bucket_percent(key: &str, unit_id: &str) -> u32 {
    stable_hash(&format!("{}::{}", key, unit_id)) % 100
}
