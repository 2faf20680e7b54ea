//! Gateway configuration loaded from the environment.
//!
//! ## Variables
//!
//! - `HOST` / `PORT`: bind address (default `0.0.0.0:5000`)
//! - `TRUST_SERVICE_URL` (alias `ML_SERVICE_URL`): trust source base URL
//! - `GRAPH_SERVICE_URL`: graph source base URL
//! - `TRUST_TIMEOUT_MS`, `GRAPH_TIMEOUT_MS`, `DIRECTORY_TIMEOUT_MS`: per-call budgets
//! - `BROADCAST_INTERVAL_MS`: tick interval
//! - `DELTA_MIN` / `DELTA_MAX`: inclusive delta bounds
//! - `BROADCAST_TARGET_POLICY`: `fixed`, `round_robin` or `interested`
//! - `BROADCAST_SELLER_IDS`: comma-separated identifiers used by the policy
//! - `SUBSCRIBER_QUEUE_DEPTH`: per-subscriber outbound queue
//! - `CORS_ALLOW_ORIGIN`: restrict the browser origin (any when unset)

use std::str::FromStr;
use std::time::Duration;

use crate::broadcast::TargetPolicy;
use crate::error::ConfigError;
use crate::types::{DeltaBounds, SellerId};

/// Seller the demo dashboard receives live deltas for.
pub const DEMO_SELLER_ID: &str = "76293524-7b94-4366-963d-4299446d7904";

const DEFAULT_TRUST_URL: &str = "http://localhost:8000";
const DEFAULT_GRAPH_URL: &str = "http://localhost:8001";

/// Settings for the broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Time between ticks.
    pub interval: Duration,
    /// Inclusive bounds of generated changes.
    pub bounds: DeltaBounds,
    /// How each tick picks its target seller.
    pub target: TargetPolicy,
    /// Outbound queue depth per subscriber.
    pub queue_depth: usize,
    /// Consecutive ticks a subscriber may miss on a full queue before it is
    /// deregistered.
    pub max_missed_ticks: u32,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            bounds: DeltaBounds::default(),
            target: TargetPolicy::Fixed(demo_seller()),
            queue_depth: 16,
            max_missed_ticks: 3,
        }
    }
}

/// Complete gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Trust source base URL, without trailing slash.
    pub trust_service_url: String,
    /// Graph source base URL, without trailing slash.
    pub graph_service_url: String,
    /// Budget for the required trust call.
    pub trust_timeout: Duration,
    /// Budget for the best-effort graph call.
    pub graph_timeout: Duration,
    /// Budget for display-name resolution.
    pub directory_timeout: Duration,
    /// Broadcast channel settings.
    pub broadcast: BroadcastConfig,
    /// Allowed browser origin; `None` allows any.
    pub cors_allow_origin: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            trust_service_url: DEFAULT_TRUST_URL.to_string(),
            graph_service_url: DEFAULT_GRAPH_URL.to_string(),
            trust_timeout: Duration::from_millis(5000),
            graph_timeout: Duration::from_millis(1500),
            directory_timeout: Duration::from_millis(1500),
            broadcast: BroadcastConfig::default(),
            cors_allow_origin: None,
        }
    }
}

impl GatewayConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    ///
    /// Unset or empty keys fall back to defaults; set but unparseable keys
    /// are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let trust_service_url = get("TRUST_SERVICE_URL")
            .or_else(|| get("ML_SERVICE_URL"))
            .map(|url| normalize_base_url("TRUST_SERVICE_URL", &url))
            .transpose()?
            .unwrap_or(defaults.trust_service_url);
        let graph_service_url = get("GRAPH_SERVICE_URL")
            .map(|url| normalize_base_url("GRAPH_SERVICE_URL", &url))
            .transpose()?
            .unwrap_or(defaults.graph_service_url);

        let delta_min = parse_or(&get, "DELTA_MIN", defaults.broadcast.bounds.min())?;
        let delta_max = parse_or(&get, "DELTA_MAX", defaults.broadcast.bounds.max())?;
        let bounds = DeltaBounds::new(delta_min, delta_max).ok_or_else(|| ConfigError::InvalidValue {
            key: "DELTA_MIN",
            reason: format!("{} is greater than DELTA_MAX {}", delta_min, delta_max),
        })?;

        let queue_depth: usize = parse_or(&get, "SUBSCRIBER_QUEUE_DEPTH", defaults.broadcast.queue_depth)?;
        if queue_depth == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SUBSCRIBER_QUEUE_DEPTH",
                reason: "must be at least 1".to_string(),
            });
        }

        let max_missed_ticks: u32 = parse_or(
            &get,
            "SUBSCRIBER_MAX_MISSED_TICKS",
            defaults.broadcast.max_missed_ticks,
        )?;
        if max_missed_ticks == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SUBSCRIBER_MAX_MISSED_TICKS",
                reason: "must be at least 1".to_string(),
            });
        }

        let broadcast = BroadcastConfig {
            interval: millis_or(&get, "BROADCAST_INTERVAL_MS", defaults.broadcast.interval)?,
            bounds,
            target: parse_target_policy(get("BROADCAST_TARGET_POLICY"), get("BROADCAST_SELLER_IDS"))?,
            queue_depth,
            max_missed_ticks,
        };

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse_or(&get, "PORT", defaults.port)?,
            trust_service_url,
            graph_service_url,
            trust_timeout: millis_or(&get, "TRUST_TIMEOUT_MS", defaults.trust_timeout)?,
            graph_timeout: millis_or(&get, "GRAPH_TIMEOUT_MS", defaults.graph_timeout)?,
            directory_timeout: millis_or(&get, "DIRECTORY_TIMEOUT_MS", defaults.directory_timeout)?,
            broadcast,
            cors_allow_origin: get("CORS_ALLOW_ORIGIN"),
        })
    }
}

fn demo_seller() -> SellerId {
    SellerId::parse(DEMO_SELLER_ID).expect("demo seller id is well-formed")
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn millis_or<G>(get: &G, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let millis: u64 = parse_or(get, key, default.as_millis() as u64)?;
    if millis == 0 {
        return Err(ConfigError::InvalidValue {
            key,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_millis(millis))
}

fn normalize_base_url(key: &'static str, raw: &str) -> Result<String, ConfigError> {
    if !(raw.starts_with("http://") || raw.starts_with("https://")) {
        return Err(ConfigError::InvalidValue {
            key,
            reason: format!("'{}' is not an http(s) URL", raw),
        });
    }
    Ok(raw.trim_end_matches('/').to_string())
}

fn parse_target_policy(
    policy: Option<String>,
    ids: Option<String>,
) -> Result<TargetPolicy, ConfigError> {
    let ids = ids
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    SellerId::parse(s).map_err(|e| ConfigError::InvalidValue {
                        key: "BROADCAST_SELLER_IDS",
                        reason: format!("'{}': {}", s, e),
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?
        .filter(|ids| !ids.is_empty())
        .unwrap_or_else(|| vec![demo_seller()]);

    match policy.as_deref().map(str::to_lowercase).as_deref() {
        None | Some("fixed") => Ok(TargetPolicy::Fixed(ids[0].clone())),
        Some("round_robin") => Ok(TargetPolicy::RoundRobin(ids)),
        Some("interested") => Ok(TargetPolicy::Interested {
            fallback: ids[0].clone(),
        }),
        Some(other) => Err(ConfigError::InvalidValue {
            key: "BROADCAST_TARGET_POLICY",
            reason: format!("unknown policy '{}'", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<GatewayConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatewayConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.trust_service_url, "http://localhost:8000");
        assert_eq!(cfg.graph_service_url, "http://localhost:8001");
        assert_eq!(cfg.broadcast.interval, Duration::from_secs(5));
        assert_eq!(cfg.broadcast.bounds, DeltaBounds::default());
        assert!(matches!(cfg.broadcast.target, TargetPolicy::Fixed(ref id) if id.as_str() == DEMO_SELLER_ID));
        assert!(cfg.graph_timeout < cfg.trust_timeout);
    }

    #[test]
    fn test_ml_service_url_alias_and_trailing_slash() {
        let cfg = load(&[("ML_SERVICE_URL", "http://ml:9000/")]).unwrap();
        assert_eq!(cfg.trust_service_url, "http://ml:9000");

        let cfg = load(&[("ML_SERVICE_URL", "http://ml:9000"), ("TRUST_SERVICE_URL", "http://trust")]).unwrap();
        assert_eq!(cfg.trust_service_url, "http://trust");
    }

    #[test]
    fn test_rejects_inverted_delta_bounds() {
        let err = load(&[("DELTA_MIN", "4"), ("DELTA_MAX", "1")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "DELTA_MIN", .. }));
    }

    #[test]
    fn test_rejects_zero_interval_and_garbage() {
        assert!(load(&[("BROADCAST_INTERVAL_MS", "0")]).is_err());
        assert!(load(&[("PORT", "eighty")]).is_err());
        assert!(load(&[("GRAPH_SERVICE_URL", "graph:8001")]).is_err());
    }

    #[test]
    fn test_round_robin_policy() {
        let cfg = load(&[
            ("BROADCAST_TARGET_POLICY", "round_robin"),
            ("BROADCAST_SELLER_IDS", "S-1, S-2,,S-3"),
        ])
        .unwrap();
        match cfg.broadcast.target {
            TargetPolicy::RoundRobin(ids) => {
                let ids: Vec<_> = ids.iter().map(|id| id.as_str().to_string()).collect();
                assert_eq!(ids, vec!["S-1", "S-2", "S-3"]);
            }
            other => panic!("unexpected policy {:?}", other),
        }
    }

    #[test]
    fn test_max_missed_ticks() {
        assert_eq!(load(&[]).unwrap().broadcast.max_missed_ticks, 3);
        let cfg = load(&[("SUBSCRIBER_MAX_MISSED_TICKS", "10")]).unwrap();
        assert_eq!(cfg.broadcast.max_missed_ticks, 10);
        let err = load(&[("SUBSCRIBER_MAX_MISSED_TICKS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "SUBSCRIBER_MAX_MISSED_TICKS", .. }));
    }

    #[test]
    fn test_unknown_policy_is_error() {
        assert!(load(&[("BROADCAST_TARGET_POLICY", "random")]).is_err());
        assert!(load(&[("BROADCAST_SELLER_IDS", "bad id")]).is_err());
    }
}
