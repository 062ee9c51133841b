pub mod db;
pub mod notificationdb;
pub mod ticketdb;
pub mod userdb;

#[cfg(test)]
pub mod memory;

use notificationdb::NotificationExt;
use ticketdb::TicketExt;
use userdb::UserExt;

/// Everything the services need from storage. Implemented by the Postgres
/// `DBClient` and, in tests, by `memory::MemoryDb`.
pub trait HelpdeskDb: UserExt + TicketExt + NotificationExt + Send + Sync + std::fmt::Debug {}

impl<T> HelpdeskDb for T where T: UserExt + TicketExt + NotificationExt + Send + Sync + std::fmt::Debug {}
