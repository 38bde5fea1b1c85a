use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::buyer::{
    Buyer, BuyerRequest, BuyerResponse, TicketHolder, TicketHolderRequest, TicketHolderResponse,
};
use super::seat::{Seat, SeatResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Failed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Failed => "failed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Pending and confirmed bookings count against the one-per-concert rule.
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for BookingStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "failed" => Ok(BookingStatus::Failed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: i64,
    pub concert_id: i64,
    pub total_price: Decimal,
    #[sqlx(try_from = "String")]
    pub status: BookingStatus,
    pub payment_id: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A booking with everything it owns, seats in booking order.
#[derive(Debug, Clone)]
pub struct BookingDetails {
    pub booking: Booking,
    pub seats: Vec<Seat>,
    pub buyer: Option<Buyer>,
    pub ticket_holder: Option<TicketHolder>,
    pub concert_name: String,
    pub concert_date: DateTime<Utc>,
}

impl BookingDetails {
    /// Seat count per ticket class, in order of first appearance.
    pub fn seats_per_class(&self) -> Vec<(i64, i64)> {
        let mut counts: Vec<(i64, i64)> = Vec::new();
        for seat in &self.seats {
            match counts.iter_mut().find(|(id, _)| *id == seat.ticket_class_id) {
                Some((_, n)) => *n += 1,
                None => counts.push((seat.ticket_class_id, 1)),
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketQuantityByClass {
    pub ticket_class_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub concert_id: i64,
    pub tickets_by_class: Vec<TicketQuantityByClass>,
    pub buyer_info: BuyerRequest,
    #[serde(default)]
    pub ticket_holder_info: Option<TicketHolderRequest>,
}

impl CreateBookingRequest {
    pub fn total_tickets(&self) -> i64 {
        self.tickets_by_class
            .iter()
            .map(|line| i64::from(line.quantity))
            .sum()
    }

    /// Request lines merged per class, keeping the order classes first appear in.
    pub fn quantities_by_class(&self) -> Vec<(i64, i32)> {
        let mut merged: Vec<(i64, i32)> = Vec::new();
        for line in &self.tickets_by_class {
            match merged.iter_mut().find(|(id, _)| *id == line.ticket_class_id) {
                Some((_, qty)) => *qty += line.quantity,
                None => merged.push((line.ticket_class_id, line.quantity)),
            }
        }
        merged
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.tickets_by_class.is_empty() {
            return Err("tickets_by_class must not be empty".to_string());
        }
        if let Some(line) = self.tickets_by_class.iter().find(|l| l.quantity < 1) {
            return Err(format!(
                "quantity for ticket class {} must be at least 1",
                line.ticket_class_id
            ));
        }
        self.buyer_info.validate()?;
        if let Some(holder) = &self.ticket_holder_info {
            holder.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub user_id: i64,
    pub concert_id: i64,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub payment_id: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub booked_seats: Vec<SeatResponse>,
    pub concert_name: String,
    pub concert_date: DateTime<Utc>,
    pub buyer_info: Option<BuyerResponse>,
    pub ticket_holder_info: Option<TicketHolderResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&BookingDetails> for BookingResponse {
    fn from(details: &BookingDetails) -> Self {
        let b = &details.booking;
        Self {
            id: b.id,
            user_id: b.user_id,
            concert_id: b.concert_id,
            total_price: b.total_price,
            status: b.status,
            payment_id: b.payment_id,
            expires_at: b.expires_at,
            booked_seats: details.seats.iter().map(SeatResponse::from).collect(),
            concert_name: details.concert_name.clone(),
            concert_date: details.concert_date,
            buyer_info: details.buyer.as_ref().map(BuyerResponse::from),
            ticket_holder_info: details.ticket_holder.as_ref().map(TicketHolderResponse::from),
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

/// Payment service callback body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateBookingStatusRequest {
    pub status: String,
    pub payment_id: i64,
}
