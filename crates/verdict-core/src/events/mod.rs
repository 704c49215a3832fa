//! Lifecycle events for dashboards and review tooling.

pub mod dispatcher;
pub mod handler;
pub mod types;

pub use dispatcher::EventDispatcher;
pub use handler::FeedbackEventHandler;
pub use types::*;
