// service/authorization.rs
//! Pure ticket access predicates. Consulted by the lifecycle service and by
//! the realtime subscription check; no state, no I/O.
use crate::models::{ticketmodel::Ticket, usermodel::User};

/// Supporters see every ticket; customers only their own.
pub fn can_view(actor: &User, ticket: &Ticket) -> bool {
    actor.is_supporter() || ticket.customer_id == actor.id
}

/// A supporter must be the assignee; a customer must own the ticket.
pub fn can_update(actor: &User, ticket: &Ticket) -> bool {
    if actor.is_supporter() {
        return ticket.is_assigned_to(actor.id);
    }

    actor.is_customer() && ticket.customer_id == actor.id
}

pub fn can_delete(actor: &User, _ticket: &Ticket) -> bool {
    actor.is_supporter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ticketmodel::TicketStatus, usermodel::UserRole};
    use chrono::Utc;
    use uuid::Uuid;

    fn user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            name: "someone".to_string(),
            email: "someone@example.com".to_string(),
            password: String::new(),
            role,
            remaining_support_seconds: 1800,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ticket(customer: &User, assignee: Option<&User>) -> Ticket {
        Ticket {
            id: Uuid::new_v4(),
            customer_id: customer.id,
            assigned_to: assignee.map(|a| a.id),
            title: "Printer on fire".to_string(),
            status: TicketStatus::Open,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_can_view() {
        let owner = user(UserRole::Customer);
        let stranger = user(UserRole::Customer);
        let supporter = user(UserRole::Supporter);
        let t = ticket(&owner, None);

        assert!(can_view(&owner, &t));
        assert!(!can_view(&stranger, &t));
        assert!(can_view(&supporter, &t));
    }

    #[test]
    fn test_can_update_requires_assignment_for_supporters() {
        let owner = user(UserRole::Customer);
        let assignee = user(UserRole::Supporter);
        let other = user(UserRole::Supporter);
        let t = ticket(&owner, Some(&assignee));

        assert!(can_update(&owner, &t));
        assert!(can_update(&assignee, &t));
        assert!(!can_update(&other, &t));
        assert!(!can_update(&other, &ticket(&owner, None)));
    }

    #[test]
    fn test_can_update_rejects_other_customers() {
        let owner = user(UserRole::Customer);
        let stranger = user(UserRole::Customer);
        assert!(!can_update(&stranger, &ticket(&owner, None)));
    }

    #[test]
    fn test_can_delete() {
        let owner = user(UserRole::Customer);
        let t = ticket(&owner, None);
        assert!(!can_delete(&owner, &t));
        assert!(can_delete(&user(UserRole::Supporter), &t));
        assert!(can_delete(&user(UserRole::Admin), &t));
    }
}
