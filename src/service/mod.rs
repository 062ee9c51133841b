pub mod attachment_service;
pub mod authorization;
pub mod background_jobs;
pub mod bootstrap;
pub mod error;
pub mod notification_service;
pub mod observers;
pub mod push;
pub mod realtime;
pub mod support_time;
pub mod ticket_service;
