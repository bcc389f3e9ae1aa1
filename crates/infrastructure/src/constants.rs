use std::time::Duration;

// ── Paths ──────────────────────────────────────────────────────────

pub const DEFAULT_CONFIG_PATH: &str = "/etc/flowgate/config.yaml";
pub const DEFAULT_CONTROL_SOCKET: &str = "/run/flowgate/control.sock";

// ── Channel capacities ─────────────────────────────────────────────

pub const CONTROL_CHANNEL_CAPACITY: usize = 64;

// ── Timeouts ───────────────────────────────────────────────────────

pub const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// ── Limits ─────────────────────────────────────────────────────────

/// Maximum filter rules accepted from the config file.
pub const MAX_CONFIG_FILTER_RULES: usize = 4096;

/// Maximum NAT rules accepted from the config file.
pub const MAX_CONFIG_NAT_RULES: usize = 256;
