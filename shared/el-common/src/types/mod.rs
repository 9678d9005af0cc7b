//! Shared Types

mod conversation;
mod message;
mod user;

pub use conversation::Conversation;
pub use message::{Attachment, Message};
pub use user::UserProfile;
