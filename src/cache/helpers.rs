//! Cache-aside helpers.

use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};

use crate::cache::backend::{CacheBackend, CacheError};

/// Fetch and deserialize a JSON value.
pub async fn get_json<T: DeserializeOwned>(
    cache: &dyn CacheBackend,
    key: &str,
) -> Result<Option<T>, CacheError> {
    match cache.get_raw(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Serialize and store a JSON value.
pub async fn set_json<T: Serialize>(
    cache: &dyn CacheBackend,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<(), CacheError> {
    let raw = serde_json::to_string(value)?;
    cache.set_raw(key, raw, ttl).await
}

/// Run `query_fn` unless `key` is cached, then cache its result.
///
/// Cache failures never fail the query: a broken read falls through to
/// `query_fn` and a broken write is only logged.
pub async fn cached_query<T, E, F, Fut>(
    cache: &dyn CacheBackend,
    key: &str,
    ttl: Duration,
    query_fn: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match get_json::<T>(cache, key).await {
        Ok(Some(cached)) => {
            tracing::debug!(key = %key, "Cache hit");
            return Ok(cached);
        }
        Ok(None) => tracing::debug!(key = %key, "Cache miss"),
        Err(e) => tracing::warn!(key = %key, error = %e, "Cache read failed, querying source"),
    }

    let result = query_fn().await?;

    if let Err(e) = set_json(cache, key, &result, ttl).await {
        tracing::warn!(key = %key, error = %e, "Failed to cache result");
    }
    Ok(result)
}

/// [`cached_query`] keyed by a prefix and a hash of serialized params.
pub async fn cached_query_with_params<T, P, E, F, Fut>(
    cache: &dyn CacheBackend,
    key_prefix: &str,
    params: &P,
    ttl: Duration,
    query_fn: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    P: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let key = build_param_cache_key(key_prefix, params);
    cached_query(cache, &key, ttl, query_fn).await
}

/// Deterministic cache key from a prefix and serializable params.
pub fn build_param_cache_key<P: Serialize>(key_prefix: &str, params: &P) -> String {
    let json = serde_json::to_string(params).unwrap_or_default();
    let mut hasher = DefaultHasher::new();
    json.hash(&mut hasher);
    format!("{}:{:x}", key_prefix, hasher.finish())
}
