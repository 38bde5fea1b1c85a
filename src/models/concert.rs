use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcertStatus {
    PendingSeatCreation,
    Active,
    Failed,
}

impl ConcertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConcertStatus::PendingSeatCreation => "pending_seat_creation",
            ConcertStatus::Active => "active",
            ConcertStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ConcertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for ConcertStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending_seat_creation" => Ok(ConcertStatus::PendingSeatCreation),
            "active" => Ok(ConcertStatus::Active),
            "failed" => Ok(ConcertStatus::Failed),
            other => Err(format!("unknown concert status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Concert {
    pub id: i64,
    pub name: String,
    pub artist: String,
    pub venue: String,
    pub date: DateTime<Utc>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub total_seats: i32,
    #[sqlx(try_from = "String")]
    pub status: ConcertStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketClass {
    pub id: i64,
    pub concert_id: i64,
    pub name: String,
    pub price: Decimal,
    pub total_seats_in_class: i32,
    /// Durable mirror of the class counter; lags the counter store.
    pub available_seats_in_class: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A concert together with its ticket classes, ordered by class id.
#[derive(Debug, Clone)]
pub struct ConcertWithClasses {
    pub concert: Concert,
    pub ticket_classes: Vec<TicketClass>,
}

impl ConcertWithClasses {
    pub fn ticket_class(&self, ticket_class_id: i64) -> Option<&TicketClass> {
        self.ticket_classes
            .iter()
            .find(|tc| tc.id == ticket_class_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTicketClassRequest {
    pub name: String,
    pub price: Decimal,
    pub total_seats_in_class: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConcertRequest {
    pub name: String,
    pub artist: String,
    pub date: DateTime<Utc>,
    pub venue: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub ticket_classes: Vec<CreateTicketClassRequest>,
}

impl CreateConcertRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().chars().count() < 3 {
            return Err("name must be at least 3 characters".to_string());
        }
        if self.artist.trim().is_empty() {
            return Err("artist is required".to_string());
        }
        if self.venue.trim().is_empty() {
            return Err("venue is required".to_string());
        }
        if self.ticket_classes.is_empty() {
            return Err("at least one ticket class is required".to_string());
        }

        let mut names = Vec::with_capacity(self.ticket_classes.len());
        for tc in &self.ticket_classes {
            let name = tc.name.trim();
            if name.is_empty() {
                return Err("ticket class name is required".to_string());
            }
            if names.contains(&name) {
                return Err(format!("duplicate ticket class name '{name}'"));
            }
            names.push(name);
            if tc.price.is_sign_negative() {
                return Err(format!("ticket class '{name}' has a negative price"));
            }
            if tc.total_seats_in_class < 0 {
                return Err(format!("ticket class '{name}' has a negative seat count"));
            }
        }

        if self.total_seats() == 0 {
            return Err("total seats from ticket classes must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn total_seats(&self) -> i32 {
        self.ticket_classes
            .iter()
            .map(|tc| tc.total_seats_in_class)
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketClassResponse {
    pub id: i64,
    pub name: String,
    pub price: Decimal,
    pub total_seats_in_class: i32,
    pub available_seats_in_class: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcertResponse {
    pub id: i64,
    pub name: String,
    pub artist: String,
    pub date: DateTime<Utc>,
    pub venue: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub total_seats: i32,
    pub available_seats: i64,
    pub status: ConcertStatus,
    pub ticket_classes: Vec<TicketClassResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConcertResponse {
    /// Builds the response with per-class availability supplied by the caller,
    /// in the same order as `concert.ticket_classes`.
    pub fn new(concert: &ConcertWithClasses, available: &[i64]) -> Self {
        let ticket_classes: Vec<TicketClassResponse> = concert
            .ticket_classes
            .iter()
            .zip(available.iter().copied())
            .map(|(tc, available_seats_in_class)| TicketClassResponse {
                id: tc.id,
                name: tc.name.clone(),
                price: tc.price,
                total_seats_in_class: tc.total_seats_in_class,
                available_seats_in_class,
            })
            .collect();

        let c = &concert.concert;
        Self {
            id: c.id,
            name: c.name.clone(),
            artist: c.artist.clone(),
            date: c.date,
            venue: c.venue.clone(),
            description: c.description.clone(),
            image_url: c.image_url.clone(),
            total_seats: c.total_seats,
            available_seats: ticket_classes
                .iter()
                .map(|tc| tc.available_seats_in_class)
                .sum(),
            status: c.status,
            ticket_classes,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Work item handed to the seat materialization worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatCreationMessage {
    pub concert_id: i64,
    pub total_seats: i32,
    pub ticket_classes: Vec<TicketClassMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketClassMessage {
    pub ticket_class_id: i64,
    pub name: String,
    pub total_seats_in_class: i32,
}

impl From<&ConcertWithClasses> for SeatCreationMessage {
    fn from(concert: &ConcertWithClasses) -> Self {
        Self {
            concert_id: concert.concert.id,
            total_seats: concert.concert.total_seats,
            ticket_classes: concert
                .ticket_classes
                .iter()
                .map(|tc| TicketClassMessage {
                    ticket_class_id: tc.id,
                    name: tc.name.clone(),
                    total_seats_in_class: tc.total_seats_in_class,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilitySource {
    Cache,
    Database,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassAvailability {
    pub ticket_class_id: i64,
    pub name: String,
    pub available_seats: i64,
    pub source: AvailabilitySource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcertAvailability {
    pub concert_id: i64,
    pub total_available_seats: i64,
    pub ticket_classes: Vec<ClassAvailability>,
}
