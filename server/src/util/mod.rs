pub mod compiler;
pub mod error;
pub mod glob;

/// Milliseconds since the UNIX epoch. Used for key expiry timestamps and
/// stream entry IDs alike, so both subsystems agree on "now".
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the epoch")
        .as_millis() as u64
}
