//! Env-overridable knobs for discovery and transport, read once at startup —
//! the same `std::env::var(..).unwrap_or_else(..)` pattern the teacher's
//! `server/src/main.rs` uses for `DATABASE_URL`/`BIND_ADDR`.

use std::time::Duration;

/// Inclusive UDP port range discovery binds and broadcasts on.
#[derive(Debug, Clone, Copy)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl Default for PortRange {
    fn default() -> Self {
        PortRange {
            start: 12340,
            end: 12399,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub port_range: PortRange,
    pub announce_interval: Duration,
    /// Bounded retries when binding a listen socket within `port_range`.
    pub bind_attempts: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            port_range: PortRange::default(),
            announce_interval: Duration::from_secs(3),
            bind_attempts: 20,
        }
    }
}

impl DiscoveryConfig {
    /// Loads overrides from the environment, falling back to defaults for
    /// anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port_range = std::env::var("EDITOR_DISCOVERY_PORT_RANGE")
            .ok()
            .and_then(|raw| parse_port_range(&raw))
            .unwrap_or(defaults.port_range);

        let announce_interval = std::env::var("EDITOR_ANNOUNCE_INTERVAL_SECS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.announce_interval);

        let bind_attempts = std::env::var("EDITOR_DISCOVERY_BIND_ATTEMPTS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(defaults.bind_attempts);

        DiscoveryConfig {
            port_range,
            announce_interval,
            bind_attempts,
        }
    }
}

fn parse_port_range(raw: &str) -> Option<PortRange> {
    let (start, end) = raw.split_once('-')?;
    let start = start.trim().parse().ok()?;
    let end = end.trim().parse().ok()?;
    Some(PortRange { start, end })
}

/// How long a receive loop blocks on a single read before looping again to
/// check for cancellation — the cooperative-cancellation tick from §4.5/§5.
pub fn read_deadline() -> Duration {
    std::env::var("EDITOR_READ_DEADLINE_MS")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(30))
}
