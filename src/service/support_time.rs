// service/support_time.rs
use std::sync::Arc;

use crate::{
    db::HelpdeskDb,
    models::ticketmodel::{Ticket, TicketStatus},
    service::{
        error::ServiceError,
        realtime::{ticket_topic, RealtimeBus, RealtimeEvent},
    },
};

/// Owns the customer's daily support-time counter. The only writer besides
/// the daily reset.
#[derive(Debug, Clone)]
pub struct SupportTimeMeter {
    db: Arc<dyn HelpdeskDb>,
    bus: RealtimeBus,
}

impl SupportTimeMeter {
    pub fn new(db: Arc<dyn HelpdeskDb>, bus: RealtimeBus) -> Self {
        Self { db, bus }
    }

    /// Deducts `seconds` from the ticket's customer and returns the new
    /// balance. Outside IN_PROGRESS, or with an empty balance, nothing is
    /// written and no event is published.
    pub async fn deduct_time(&self, ticket: &Ticket, seconds: i32) -> Result<i32, ServiceError> {
        if seconds <= 0 {
            return Err(ServiceError::validation("seconds", "Seconds must be positive"));
        }
        if ticket.status != TicketStatus::InProgress {
            return self.current_balance(ticket).await;
        }

        let remaining = match self
            .db
            .deduct_support_seconds(ticket.customer_id, seconds)
            .await?
        {
            Some(remaining) => remaining,
            None => {
                // exhausted, or the customer row is gone
                self.current_balance(ticket).await?;
                return Ok(0);
            }
        };

        self.bus
            .publish(
                &ticket_topic(ticket.id),
                RealtimeEvent::SupportTimeUpdated {
                    ticket_id: ticket.id,
                    remaining_seconds: remaining,
                },
            )
            .await;

        if remaining == 0 {
            tracing::info!(
                "Customer {} exhausted daily support time on ticket {}",
                ticket.customer_id,
                ticket.id
            );
        }

        Ok(remaining)
    }

    pub async fn reset_daily_allowance(&self, seconds: i32) -> Result<u64, ServiceError> {
        let customers = self.db.reset_customer_support_time(seconds).await?;
        tracing::info!("Reset support time to {}s for {} customers", seconds, customers);
        Ok(customers)
    }

    async fn current_balance(&self, ticket: &Ticket) -> Result<i32, ServiceError> {
        self.db
            .get_support_seconds(ticket.customer_id)
            .await?
            .ok_or(ServiceError::UserNotFound(ticket.customer_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{memory::MemoryDb, ticketdb::TicketExt},
        models::{ticketmodel::NewTicketMessage, usermodel::UserRole},
    };
    use tokio::sync::broadcast::error::TryRecvError;

    async fn setup(balance: i32, status: TicketStatus) -> (Arc<MemoryDb>, SupportTimeMeter, Ticket) {
        let db = Arc::new(MemoryDb::new());
        let customer = db.insert_user("Carol", UserRole::Customer, balance);
        let supporter = db.insert_user("Sam", UserRole::Supporter, 0);
        let (ticket, _) = db
            .create_ticket(
                customer.id,
                Some(supporter.id),
                "Cannot log in".to_string(),
                vec![],
                NewTicketMessage {
                    user_id: customer.id,
                    message: "Help".to_string(),
                    attachment_path: None,
                    is_system: false,
                },
            )
            .await
            .unwrap();
        db.set_status(ticket.id, status);
        let ticket = db.get_ticket(ticket.id).await.unwrap().unwrap();

        let meter = SupportTimeMeter::new(db.clone(), RealtimeBus::new());
        (db, meter, ticket)
    }

    #[tokio::test]
    async fn test_twenty_ticks_drain_one_hundred_seconds() {
        let (db, meter, ticket) = setup(100, TicketStatus::InProgress).await;
        let mut rx = meter.bus.subscribe(&ticket_topic(ticket.id)).await;

        for i in 1..=20 {
            let remaining = meter.deduct_time(&ticket, 5).await.unwrap();
            assert_eq!(remaining, 100 - i * 5);
        }
        assert_eq!(db.balance(ticket.customer_id), 0);

        for _ in 0..20 {
            assert!(matches!(
                rx.try_recv(),
                Ok(RealtimeEvent::SupportTimeUpdated { .. })
            ));
        }

        let remaining = meter.deduct_time(&ticket, 5).await.unwrap();
        assert_eq!(remaining, 0);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_balance_floors_at_zero() {
        let (db, meter, ticket) = setup(3, TicketStatus::InProgress).await;
        assert_eq!(meter.deduct_time(&ticket, 5).await.unwrap(), 0);
        assert_eq!(db.balance(ticket.customer_id), 0);
    }

    #[tokio::test]
    async fn test_non_positive_deduction_is_rejected() {
        let (db, meter, ticket) = setup(100, TicketStatus::InProgress).await;
        let mut rx = meter.bus.subscribe(&ticket_topic(ticket.id)).await;

        for seconds in [-500, 0] {
            assert!(matches!(
                meter.deduct_time(&ticket, seconds).await,
                Err(ServiceError::Validation { field: "seconds", .. })
            ));
        }
        assert_eq!(db.balance(ticket.customer_id), 100);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_no_op_outside_in_progress() {
        for status in [TicketStatus::Open, TicketStatus::Resolved, TicketStatus::Closed] {
            let (db, meter, ticket) = setup(100, status).await;
            let mut rx = meter.bus.subscribe(&ticket_topic(ticket.id)).await;

            assert_eq!(meter.deduct_time(&ticket, 5).await.unwrap(), 100);
            assert_eq!(db.balance(ticket.customer_id), 100);
            assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        }
    }

    #[tokio::test]
    async fn test_concurrent_ticks_never_go_negative() {
        let (db, meter, ticket) = setup(52, TicketStatus::InProgress).await;

        let handles: Vec<_> = (0..40)
            .map(|_| {
                let meter = meter.clone();
                let ticket = ticket.clone();
                tokio::spawn(async move { meter.deduct_time(&ticket, 5).await })
            })
            .collect();

        for handle in handles {
            let remaining = handle.await.unwrap().unwrap();
            assert!(remaining >= 0);
        }
        assert_eq!(db.balance(ticket.customer_id), 0);
    }

    #[tokio::test]
    async fn test_reset_restores_customers_only() {
        let (db, meter, ticket) = setup(0, TicketStatus::InProgress).await;
        let other = db.insert_user("Dana", UserRole::Customer, 12);
        let supporter = db.insert_user("Sid", UserRole::Supporter, 0);

        assert_eq!(meter.reset_daily_allowance(1800).await.unwrap(), 2);
        assert_eq!(db.balance(ticket.customer_id), 1800);
        assert_eq!(db.balance(other.id), 1800);
        assert_eq!(db.balance(supporter.id), 0);
    }
}
