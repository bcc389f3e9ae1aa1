pub mod entity;
pub mod table;

use std::time::Duration;

/// Idle lifetime granted to a flow on creation and on every lookup.
pub const CONN_EXPIRES: Duration = Duration::from_secs(7);

/// NAT flows live `CONN_EXPIRES * CONN_NAT_TIMES`.
pub const CONN_NAT_TIMES: u32 = 10;

/// Period of the background expiry sweep.
pub const CONN_ROLL_INTERVAL: Duration = Duration::from_secs(5);
