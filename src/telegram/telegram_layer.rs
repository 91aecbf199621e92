// Telegram layer - transport adapter and update handlers.

use crate::core::moderation::ModerationService;
use crate::infra::moderation::SqliteModerationStore;

#[path = "handlers.rs"]
pub mod handlers;

#[path = "transport.rs"]
pub mod transport;

pub use transport::TelegramTransport;

/// The moderation service as wired up for production.
pub type Moderation = ModerationService<SqliteModerationStore, TelegramTransport, TelegramTransport>;
