/// Admin operations on tracked games.
pub mod admin_service;
/// Per-game lifecycle controller.
pub mod controller;
/// OpenAPI documentation generation.
pub mod documentation;
/// Registry of tracked games and daily discovery.
pub mod fleet_supervisor;
/// Health check service.
pub mod health_service;
/// Diff/reconcile engine between feed snapshots and notifications.
pub mod reconciler;
/// Linear replay of a finished game.
pub mod replay;
/// Per-sport rules and rendering.
pub mod sport;
/// Server-Sent Events forwarding.
pub mod sse_service;
