pub mod events;
pub mod progression;
pub mod replies;
pub mod scheduler;
