use axum::extract::{Path, State};
use axum::response::Response;
use std::collections::BTreeMap;

use crate::models::{BeachTicket, TicketWithBenefits};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

/// Active tickets keyed by beach, then by ticket type.
pub type TicketCatalogView = BTreeMap<String, BTreeMap<String, Vec<BeachTicket>>>;

fn group(tickets: Vec<BeachTicket>) -> TicketCatalogView {
    let mut grouped = TicketCatalogView::new();
    for ticket in tickets {
        grouped
            .entry(ticket.beach_name.clone())
            .or_default()
            .entry(ticket.ticket_type.clone())
            .or_default()
            .push(ticket);
    }
    grouped
}

pub async fn list_tickets(State(state): State<AppState>) -> Result<Response, AppError> {
    let tickets = state.catalog.list_active().await?;
    Ok(success(group(tickets), "Tickets retrieved"))
}

pub async fn show_ticket(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let ticket = state
        .catalog
        .find_ticket(id)
        .await?
        .filter(BeachTicket::is_purchasable)
        .ok_or_else(|| AppError::NotFound(format!("Ticket {} not found", id)))?;
    let benefits = state.catalog.benefits_for(id).await?;

    Ok(success(
        TicketWithBenefits { ticket, benefits },
        "Ticket retrieved",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn ticket(id: i64, beach: &str, kind: &str, name: &str) -> BeachTicket {
        let now = Utc::now();
        BeachTicket {
            id,
            name: name.to_string(),
            beach_name: beach.to_string(),
            ticket_type: kind.to_string(),
            description: None,
            price: Decimal::from(50_000),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_group_by_beach_and_type() {
        let grouped = group(vec![
            ticket(1, "bodur", "regular", "Bodur A"),
            ticket(2, "bodur", "bundling", "Bodur Family"),
            ticket(3, "lalassa", "regular", "Lalassa A"),
            ticket(4, "bodur", "regular", "Bodur B"),
        ]);

        assert_eq!(grouped.len(), 2);
        let bodur_regular: Vec<i64> = grouped["bodur"]["regular"].iter().map(|t| t.id).collect();
        assert_eq!(bodur_regular, vec![1, 4]);
        assert_eq!(grouped["bodur"]["bundling"].len(), 1);
    }
}
