use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

const NATIONAL_ID_LEN: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Buyer {
    pub id: i64,
    pub booking_id: Uuid,
    pub full_name: String,
    pub phone_number: String,
    pub email: String,
    pub national_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketHolder {
    pub id: i64,
    pub booking_id: Uuid,
    pub full_name: String,
    pub national_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyerRequest {
    pub full_name: String,
    pub phone_number: String,
    pub email: String,
    pub national_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketHolderRequest {
    pub full_name: String,
    pub national_id: String,
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split('.')
            .filter(|part| !part.is_empty())
            .count()
            >= 2
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

fn validate_national_id(field: &str, value: &str) -> Result<(), String> {
    if value.len() != NATIONAL_ID_LEN || !is_digits(value) {
        return Err(format!("{field} must be exactly {NATIONAL_ID_LEN} digits"));
    }
    Ok(())
}

impl BuyerRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.full_name.trim().is_empty() {
            return Err("buyer_info.full_name is required".to_string());
        }
        if !is_digits(&self.phone_number) || !(10..=15).contains(&self.phone_number.len()) {
            return Err("buyer_info.phone_number must be 10 to 15 digits".to_string());
        }
        if !is_email(&self.email) {
            return Err("buyer_info.email must be a valid email address".to_string());
        }
        validate_national_id("buyer_info.national_id", &self.national_id)
    }
}

impl TicketHolderRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.full_name.trim().is_empty() {
            return Err("ticket_holder_info.full_name is required".to_string());
        }
        validate_national_id("ticket_holder_info.national_id", &self.national_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyerResponse {
    pub id: i64,
    pub full_name: String,
    pub phone_number: String,
    pub email: String,
    pub national_id: String,
}

impl From<&Buyer> for BuyerResponse {
    fn from(buyer: &Buyer) -> Self {
        Self {
            id: buyer.id,
            full_name: buyer.full_name.clone(),
            phone_number: buyer.phone_number.clone(),
            email: buyer.email.clone(),
            national_id: buyer.national_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketHolderResponse {
    pub id: i64,
    pub full_name: String,
    pub national_id: String,
}

impl From<&TicketHolder> for TicketHolderResponse {
    fn from(holder: &TicketHolder) -> Self {
        Self {
            id: holder.id,
            full_name: holder.full_name.clone(),
            national_id: holder.national_id.clone(),
        }
    }
}
