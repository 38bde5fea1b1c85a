//! Outbound call asking the payment service to start charging a booking.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_PAYMENT_METHOD: &str = "credit_card";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("payment request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("payment service answered {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub booking_id: Uuid,
    pub amount: Decimal,
    pub payment_method: String,
}

impl PaymentRequest {
    pub fn new(booking_id: Uuid, amount: Decimal) -> Self {
        Self {
            booking_id,
            amount,
            payment_method: DEFAULT_PAYMENT_METHOD.to_string(),
        }
    }
}

#[async_trait]
pub trait PaymentNotifier: Send + Sync {
    async fn notify(&self, request: PaymentRequest) -> Result<(), NotifyError>;
}

pub struct HttpPaymentNotifier {
    client: Client,
    base_url: String,
}

impl HttpPaymentNotifier {
    pub fn new(base_url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(NOTIFY_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PaymentNotifier for HttpPaymentNotifier {
    async fn notify(&self, request: PaymentRequest) -> Result<(), NotifyError> {
        let url = format!("{}/payments", self.base_url);
        let response = self.client.post(&url).json(&request).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(NotifyError::Rejected { status, body })
        }
    }
}

/// Notifier that keeps every request in memory instead of sending it.
#[derive(Default)]
pub struct RecordingNotifier {
    requests: Mutex<Vec<PaymentRequest>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn requests(&self) -> Vec<PaymentRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl PaymentNotifier for RecordingNotifier {
    async fn notify(&self, request: PaymentRequest) -> Result<(), NotifyError> {
        self.requests.lock().await.push(request);
        Ok(())
    }
}
