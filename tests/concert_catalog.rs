mod common;

use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::watch;

use encore_booking::models::{ConcertStatus, CreateConcertRequest, CreateTicketClassRequest};
use encore_booking::services::BookingError;
use encore_booking::store::BookingStore;

use common::Harness;

fn request(classes: &[(&str, i32)]) -> CreateConcertRequest {
    CreateConcertRequest {
        name: "Autumn Tour".to_string(),
        artist: "Quartet".to_string(),
        date: Utc::now() + chrono::Duration::days(10),
        venue: "Hall".to_string(),
        description: Some("Evening show".to_string()),
        image_url: None,
        ticket_classes: classes
            .iter()
            .map(|(name, seats)| CreateTicketClassRequest {
                name: name.to_string(),
                price: Decimal::new(25_000, 2),
                total_seats_in_class: *seats,
            })
            .collect(),
    }
}

#[tokio::test]
async fn new_concert_waits_for_seats_and_queues_the_job() {
    let harness = Harness::new();
    let concert = harness
        .state
        .concerts
        .create_concert(request(&[("VIP", 2), ("GA", 3)]))
        .await
        .unwrap();

    assert_eq!(concert.concert.status, ConcertStatus::PendingSeatCreation);
    assert_eq!(concert.concert.total_seats, 5);

    let published = harness.queue.published().await;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].concert_id, concert.concert.id);
    assert_eq!(published[0].ticket_classes.len(), 2);

    for tc in &concert.ticket_classes {
        assert_eq!(
            harness.counter(tc.id).await,
            Some(i64::from(tc.total_seats_in_class))
        );
    }
}

#[tokio::test]
async fn invalid_concert_is_rejected() {
    let harness = Harness::new();
    let err = harness
        .state
        .concerts
        .create_concert(request(&[("GA", 0)]))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));
    assert!(harness.queue.published().await.is_empty());
}

#[tokio::test]
async fn publish_failure_marks_concert_failed() {
    let harness = Harness::new();
    harness.queue.reject_publish(true);

    let concert = harness
        .state
        .concerts
        .create_concert(request(&[("GA", 3)]))
        .await
        .unwrap();

    assert_eq!(concert.concert.status, ConcertStatus::Failed);
    let stored = harness.store.get_concert(concert.concert.id).await.unwrap().unwrap();
    assert_eq!(stored.concert.status, ConcertStatus::Failed);
}

#[tokio::test]
async fn worker_materializes_numbered_seats() {
    let harness = Harness::new();
    let concert = harness.concert(&[("VIP", 2), ("GA", 3)], true).await;
    assert_eq!(concert.concert.status, ConcertStatus::Active);

    let seats = harness
        .state
        .concerts
        .concert_seats(concert.concert.id)
        .await
        .unwrap();
    let numbers: Vec<&str> = seats.iter().map(|s| s.seat_number.as_str()).collect();
    assert_eq!(numbers, vec!["VIP-S1", "VIP-S2", "GA-S1", "GA-S2", "GA-S3"]);
    assert_eq!(seats[0].ticket_class_name.as_deref(), Some("VIP"));
}

#[tokio::test]
async fn already_processed_job_is_skipped() {
    let harness = Harness::new();
    let concert = harness.concert(&[("GA", 2)], true).await;
    let message = harness.queue.published().await.remove(0);

    assert!(!harness
        .state
        .concerts
        .process_seat_creation(&message)
        .await
        .unwrap());
    let seats = harness.store.list_concert_seats(concert.concert.id).await.unwrap();
    assert_eq!(seats.len(), 2);
}

#[tokio::test]
async fn startup_recovery_requeues_pending_concerts() {
    let harness = Harness::new();
    let pending = harness
        .state
        .concerts
        .create_concert(request(&[("GA", 2)]))
        .await
        .unwrap();
    harness.concert(&[("GA", 2)], true).await;

    let requeued = harness.state.concerts.recover_pending().await.unwrap();
    assert_eq!(requeued, 1);
    let published = harness.queue.published().await;
    assert_eq!(published.last().unwrap().concert_id, pending.concert.id);
}

#[tokio::test]
async fn catalog_reads_report_availability() {
    let harness = Harness::new();
    let concert = harness.concert(&[("VIP", 2), ("GA", 3)], true).await;

    let listed = harness.state.concerts.list_concerts().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].available_seats, 5);

    let single = harness
        .state
        .concerts
        .get_concert(concert.concert.id)
        .await
        .unwrap();
    assert_eq!(single.ticket_classes[1].available_seats_in_class, 3);

    assert!(matches!(
        harness.state.concerts.get_concert(12_345).await,
        Err(BookingError::ConcertNotFound(12_345))
    ));
}

#[tokio::test]
async fn background_worker_activates_concert() {
    let harness = Harness::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = harness.state.concerts.clone().spawn_worker(shutdown_rx);

    let concert = harness
        .state
        .concerts
        .create_concert(request(&[("GA", 4)]))
        .await
        .unwrap();

    let mut status = ConcertStatus::PendingSeatCreation;
    for _ in 0..100 {
        status = harness
            .store
            .get_concert(concert.concert.id)
            .await
            .unwrap()
            .unwrap()
            .concert
            .status;
        if status == ConcertStatus::Active {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, ConcertStatus::Active);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), worker)
        .await
        .unwrap()
        .unwrap();
}
