//! Compile-time configuration.
//!
//! Tunables for the peripheral core. These are plain constants; adjust them
//! here when porting to a controller with different resource limits.

use embassy_time::Duration;

/// Device name broadcast in the advertising payload and matched by the
/// companion desktop application during discovery.
pub const DEVICE_NAME: &str = "HuGo";

/// Receive buffer size requested from the radio stack at startup.
///
/// Sized so a full shell command or keyboard report fits in a single
/// attribute write.
pub const RX_BUFFER_SIZE: u16 = 256;

/// Number of times an MTU exchange is attempted for a new connection before
/// the link is given up and force-disconnected.
pub const MTU_EXCHANGE_ATTEMPTS: usize = 3;

/// Advertising interval used whenever advertising is (re)started.
pub const ADVERTISE_INTERVAL: Duration = Duration::from_micros(100_000);

/// Maximum number of concurrently tracked links.
pub const MAX_LINKS: usize = 4;

/// Maximum legacy advertising payload length.
pub const ADV_DATA_LEN: usize = 31;

/// Maximum number of characteristics a registered service may carry.
pub const MAX_SERVICE_CHARACTERISTICS: usize = 4;

/// Capacity of one deferred log line. Longer lines are truncated.
pub const LOG_LINE_LEN: usize = 128;

/// Depth of the deferred log queue. When full, further lines are dropped
/// until the queue is drained on the next scheduler tick.
pub const LOG_QUEUE_DEPTH: usize = 4;
