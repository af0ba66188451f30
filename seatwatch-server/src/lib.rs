pub mod calendar;
pub mod conversation;
pub mod events;
pub mod http;
pub mod prompts;
pub mod subsystems;
