//! The alert engine: subscription filtering, dedupe and flapping suppression,
//! rate-limited channel routing and the alert feed, tied together by the
//! pipeline.

pub mod feed;
pub mod filtering;
pub mod pipeline;
pub mod router;
pub mod suppression;
pub mod window;
