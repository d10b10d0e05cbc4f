//! # WordNest Channels
//! Outbound and inbound plumbing: the Telegram Bot API and the remote
//! record-keeping endpoint.

pub mod sync;
pub mod telegram;

pub use sync::HttpProfileSync;
pub use telegram::{TelegramChannel, TelegramPollingStream};
