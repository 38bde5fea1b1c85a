#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use rust_decimal::Decimal;

use encore_booking::auth::{Claims, JwtVerifier};
use encore_booking::counter::{CounterStore, MemoryCounterStore};
use encore_booking::models::{
    BuyerRequest, ConcertStatus, ConcertWithClasses, CreateBookingRequest, CreateConcertRequest,
    CreateTicketClassRequest, TicketQuantityByClass,
};
use encore_booking::queue::MemorySeatQueue;
use encore_booking::services::RecordingNotifier;
use encore_booking::state::AppState;
use encore_booking::store::{BookingStore, MemoryBookingStore};

pub const JWT_SECRET: &str = "test-secret";

pub struct Harness {
    pub state: AppState,
    pub store: Arc<MemoryBookingStore>,
    pub counters: Arc<MemoryCounterStore>,
    pub queue: Arc<MemorySeatQueue>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryBookingStore::new());
        let counters = Arc::new(MemoryCounterStore::new());
        let queue = Arc::new(MemorySeatQueue::new());
        let notifier = Arc::new(RecordingNotifier::new());

        let state = AppState::new(
            store.clone(),
            counters.clone(),
            queue.clone(),
            notifier.clone(),
            JwtVerifier::new(JWT_SECRET),
            Duration::from_secs(15 * 60),
        );

        Self {
            state,
            store,
            counters,
            queue,
            notifier,
        }
    }

    /// Creates an active concert. With `materialize` the seat worker's job is
    /// run, otherwise the concert is activated without any seat rows.
    pub async fn concert(&self, classes: &[(&str, i32)], materialize: bool) -> ConcertWithClasses {
        let request = CreateConcertRequest {
            name: "Summer Night Live".to_string(),
            artist: "The Band".to_string(),
            date: Utc::now() + chrono::Duration::days(30),
            venue: "Arena".to_string(),
            description: None,
            image_url: None,
            ticket_classes: classes
                .iter()
                .map(|(name, seats)| CreateTicketClassRequest {
                    name: name.to_string(),
                    price: Decimal::new(50_000, 2),
                    total_seats_in_class: *seats,
                })
                .collect(),
        };
        let concert = self.state.concerts.create_concert(request).await.unwrap();
        let concert_id = concert.concert.id;

        if materialize {
            let message = self
                .queue
                .published()
                .await
                .into_iter()
                .rev()
                .find(|m| m.concert_id == concert_id)
                .unwrap();
            assert!(self.state.concerts.process_seat_creation(&message).await.unwrap());
        } else {
            self.store
                .set_concert_status(concert_id, ConcertStatus::Active)
                .await
                .unwrap();
        }

        self.store.get_concert(concert_id).await.unwrap().unwrap()
    }

    pub async fn counter(&self, ticket_class_id: i64) -> Option<i64> {
        self.counters.get(ticket_class_id).await.unwrap()
    }
}

pub fn buyer() -> BuyerRequest {
    BuyerRequest {
        full_name: "Dewi Lestari".to_string(),
        phone_number: "081234567890".to_string(),
        email: "dewi@example.com".to_string(),
        national_id: "3174012345678901".to_string(),
    }
}

pub fn booking_request(concert_id: i64, lines: &[(i64, i32)]) -> CreateBookingRequest {
    CreateBookingRequest {
        concert_id,
        tickets_by_class: lines
            .iter()
            .map(|(ticket_class_id, quantity)| TicketQuantityByClass {
                ticket_class_id: *ticket_class_id,
                quantity: *quantity,
            })
            .collect(),
        buyer_info: buyer(),
        ticket_holder_info: None,
    }
}

pub fn token(user_id: i64, role: &str) -> String {
    let claims = Claims {
        user_id,
        role: role.to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}
