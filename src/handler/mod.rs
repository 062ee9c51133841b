pub mod auth;
pub mod notifications;
pub mod realtime;
pub mod tickets;
pub mod users;
