/// Read-only game feeds.
pub mod feed;
/// Outbound notification sinks.
pub mod sink;
/// Storage error types shared by persistence backends.
pub mod storage;
/// Persistence of the manually tracked game set.
pub mod tracked_games;
