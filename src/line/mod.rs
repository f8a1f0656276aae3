pub mod client;
pub mod events;
pub mod messages;
pub mod signature;
