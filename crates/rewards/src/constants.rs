//! Engine Constants

/// Source registry bounds
pub mod sources {
    /// Default bound on sources simultaneously active over a queried window
    pub const DEFAULT_MAX_WINDOW: u64 = 8;
}
