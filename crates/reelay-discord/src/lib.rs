//! Destination collaborator: posts messages, threads, and file attachments to
//! a Discord-compatible REST API.

pub mod client;
pub mod destination;
pub mod error;
pub mod rate_limit;

pub use client::DiscordClient;
pub use destination::{Destination, ThreadOptions};
pub use error::DestinationError;
