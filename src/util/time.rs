//! Time utilities for match simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Target simulation rate for every match
pub const SIMULATION_TPS: u32 = 60;

/// Upper bound on a single measured tick delta (seconds). Longer stalls
/// are dropped; simulations sub-step whatever remains in whole frames.
pub const MAX_TICK_DELTA: f32 = 0.1;

/// Nominal wall-clock length of one tick
pub fn tick_duration() -> Duration {
    Duration::from_micros(1_000_000 / SIMULATION_TPS as u64)
}

/// Convert a measured delta into "nominal frames" (1.0 at exactly 60 Hz).
/// Kinematic constants are expressed per frame.
pub fn frames(dt: f32) -> f32 {
    dt.clamp(0.0, MAX_TICK_DELTA) * SIMULATION_TPS as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nominal_tick_is_one_frame() {
        let dt = tick_duration().as_secs_f32();
        assert!((frames(dt) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn stalled_tick_is_capped() {
        assert_eq!(frames(5.0), MAX_TICK_DELTA * SIMULATION_TPS as f32);
        assert_eq!(frames(-1.0), 0.0);
    }
}
