pub mod analytics;
pub mod conversation;
pub mod message;
pub mod user;

pub use analytics::{AnalyticsEvent, EventType, PopularMessage};
pub use conversation::{ConversationPatch, ConversationRecord, SavedChat};
pub use message::{MessageRecord, QuoteRecord};
pub use user::{UserRecord, UserStats};
