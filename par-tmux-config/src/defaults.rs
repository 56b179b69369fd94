//! Default value functions for configuration.
//!
//! Used as `#[serde(default = "crate::defaults::...")]` attributes on
//! `TmuxConfig` fields.

// ── Command queue ──────────────────────────────────────────────────────────

pub fn command_queue_capacity() -> usize {
    20 // Upper bound on concurrently outstanding control mode commands
}

pub fn command_timeout_ms() -> u64 {
    10_000
}

// ── Reconciliation ─────────────────────────────────────────────────────────

pub fn session_request_timeout_ms() -> u64 {
    10_000
}

pub fn resize_settle_ms() -> u64 {
    500 // tmux echoes a %layout-change shortly after resize-window/resize-pane
}

pub fn sync_resize_block_ms() -> u64 {
    2000
}

pub fn sync_resize_block_count() -> u32 {
    1
}

pub fn echo_block_ms() -> u64 {
    1000
}
