//! Command-line entry points.

pub mod feed;
pub mod reset;
pub mod run;

pub use feed::FeedArgs;
pub use reset::ResetArgs;
pub use run::RunArgs;
