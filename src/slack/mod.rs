//! Slack transport: Web API client, Events API endpoint, and event listener.

pub mod api;
pub mod events;
pub mod listener;
pub mod server;

pub use api::SlackClient;
pub use events::{EventEnvelope, FileSharedEvent, MessageEvent, SlackEvent};
pub use listener::{EventListener, Handled, spawn_listener};
pub use server::events_router;
