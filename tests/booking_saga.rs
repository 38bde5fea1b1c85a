mod common;

use std::time::Duration;

use encore_booking::models::{BookingStatus, SeatStatus, TicketHolderRequest};
use encore_booking::services::BookingError;
use encore_booking::store::{BookingStore, FailPoint};

use common::{booking_request, Harness};

#[tokio::test]
async fn booking_reserves_and_records_everything() {
    let harness = Harness::new();
    let concert = harness.concert(&[("VIP", 10), ("GA", 100)], true).await;
    let vip = concert.ticket_classes[0].id;
    let ga = concert.ticket_classes[1].id;

    let mut request = booking_request(concert.concert.id, &[(vip, 1), (ga, 2)]);
    request.ticket_holder_info = Some(TicketHolderRequest {
        full_name: "Budi Santoso".to_string(),
        national_id: "3174019876543210".to_string(),
    });
    let details = harness.state.bookings.create_booking(7, request).await.unwrap();

    assert_eq!(details.booking.status, BookingStatus::Pending);
    assert!(details.booking.expires_at.is_some());
    assert_eq!(details.seats.len(), 3);
    assert!(details.seats.iter().all(|s| s.status == SeatStatus::Reserved));
    assert_eq!(details.seats[0].seat_number, "VIP-S1");
    assert!(details.buyer.is_some());
    assert!(details.ticket_holder.is_some());
    assert_eq!(details.concert_name, "Summer Night Live");
    assert_eq!(details.booking.total_price, rust_decimal::Decimal::new(150_000, 2));

    assert_eq!(harness.counter(vip).await, Some(9));
    assert_eq!(harness.counter(ga).await, Some(98));
    assert_eq!(
        harness.store.ticket_class(ga).await.unwrap().available_seats_in_class,
        98
    );
}

#[tokio::test]
async fn seats_are_synthesized_when_none_are_materialized() {
    let harness = Harness::new();
    let concert = harness.concert(&[("GA", 5)], false).await;
    let ga = concert.ticket_classes[0].id;

    let details = harness
        .state
        .bookings
        .create_booking(1, booking_request(concert.concert.id, &[(ga, 2)]))
        .await
        .unwrap();

    let hex = details.booking.id.simple().to_string();
    assert_eq!(details.seats[0].seat_number, format!("GA-{hex}-1"));
    assert_eq!(details.seats[1].seat_number, format!("GA-{hex}-2"));
}

#[tokio::test]
async fn zero_or_six_tickets_rejected_without_side_effects() {
    let harness = Harness::new();
    let concert = harness.concert(&[("GA", 10)], false).await;
    let ga = concert.ticket_classes[0].id;

    for lines in [vec![(ga, 0)], vec![(ga, 6)], vec![(ga, 3), (ga, 3)]] {
        let err = harness
            .state
            .bookings
            .create_booking(1, booking_request(concert.concert.id, &lines))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidQuantity { .. }), "{err:?}");
    }

    assert_eq!(harness.counters.cas_calls(), 0);
    assert_eq!(harness.counter(ga).await, Some(10));
    assert_eq!(harness.store.booking_count().await, 0);
}

#[tokio::test]
async fn second_active_booking_is_a_duplicate() {
    let harness = Harness::new();
    let concert = harness.concert(&[("GA", 10)], false).await;
    let ga = concert.ticket_classes[0].id;
    let bookings = &harness.state.bookings;

    bookings
        .create_booking(1, booking_request(concert.concert.id, &[(ga, 1)]))
        .await
        .unwrap();
    let err = bookings
        .create_booking(1, booking_request(concert.concert.id, &[(ga, 1)]))
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::DuplicateActiveBooking { .. }));
    assert_eq!(harness.counter(ga).await, Some(9));
}

#[tokio::test]
async fn concert_must_exist_and_be_active() {
    let harness = Harness::new();
    let err = harness
        .state
        .bookings
        .create_booking(1, booking_request(999, &[(1, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::ConcertNotFound(999)));

    let concert = harness.concert(&[("GA", 10)], false).await;
    harness
        .store
        .set_concert_status(concert.concert.id, encore_booking::models::ConcertStatus::Failed)
        .await
        .unwrap();
    let err = harness
        .state
        .bookings
        .create_booking(1, booking_request(concert.concert.id, &[(concert.ticket_classes[0].id, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::ConcertNotActive(_)));
}

#[tokio::test]
async fn unknown_class_is_rejected_before_reserving() {
    let harness = Harness::new();
    let concert = harness.concert(&[("GA", 10)], false).await;
    let ga = concert.ticket_classes[0].id;

    let err = harness
        .state
        .bookings
        .create_booking(1, booking_request(concert.concert.id, &[(ga, 1), (424_242, 1)]))
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::ClassNotFound(424_242)));
    assert_eq!(harness.counters.cas_calls(), 0);
    assert_eq!(harness.counter(ga).await, Some(10));
}

#[tokio::test]
async fn failed_reservation_releases_earlier_classes() {
    let harness = Harness::new();
    let concert = harness.concert(&[("VIP", 10), ("GA", 1)], false).await;
    let vip = concert.ticket_classes[0].id;
    let ga = concert.ticket_classes[1].id;

    let err = harness
        .state
        .bookings
        .create_booking(1, booking_request(concert.concert.id, &[(vip, 2), (ga, 2)]))
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::InsufficientInventory { ticket_class_id } if ticket_class_id == ga));
    assert_eq!(harness.counter(vip).await, Some(10));
    assert_eq!(harness.counter(ga).await, Some(1));
    assert_eq!(harness.store.booking_count().await, 0);
}

#[tokio::test]
async fn failed_transaction_is_compensated() {
    let harness = Harness::new();
    let concert = harness.concert(&[("GA", 10)], true).await;
    let ga = concert.ticket_classes[0].id;
    harness.store.fail(FailPoint::CreateBooking).await;

    let err = harness
        .state
        .bookings
        .create_booking(1, booking_request(concert.concert.id, &[(ga, 3)]))
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::Transaction(_)));
    assert_eq!(harness.counter(ga).await, Some(10));
    assert_eq!(harness.store.count_available_seats(ga).await.unwrap(), 10);
    assert!(harness.notifier.requests().await.is_empty());
}

#[tokio::test]
async fn payment_service_is_notified_after_commit() {
    let harness = Harness::new();
    let concert = harness.concert(&[("GA", 10)], false).await;
    let ga = concert.ticket_classes[0].id;

    let details = harness
        .state
        .bookings
        .create_booking(1, booking_request(concert.concert.id, &[(ga, 2)]))
        .await
        .unwrap();

    let mut requests = Vec::new();
    for _ in 0..50 {
        requests = harness.notifier.requests().await;
        if !requests.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].booking_id, details.booking.id);
    assert_eq!(requests[0].amount, details.booking.total_price);
    assert_eq!(requests[0].payment_method, "credit_card");
}

#[tokio::test]
async fn bookings_are_only_visible_to_their_owner() {
    let harness = Harness::new();
    let concert = harness.concert(&[("GA", 10)], false).await;
    let ga = concert.ticket_classes[0].id;
    let bookings = &harness.state.bookings;

    let details = bookings
        .create_booking(1, booking_request(concert.concert.id, &[(ga, 1)]))
        .await
        .unwrap();

    assert!(bookings.get_booking(details.booking.id, 1).await.is_ok());
    assert!(matches!(
        bookings.get_booking(details.booking.id, 2).await,
        Err(BookingError::Unauthorized)
    ));
    assert!(matches!(
        bookings.get_booking(uuid::Uuid::new_v4(), 1).await,
        Err(BookingError::BookingNotFound(_))
    ));
}

#[tokio::test]
async fn user_bookings_are_listed_newest_first() {
    let harness = Harness::new();
    let first = harness.concert(&[("GA", 10)], false).await;
    let second = harness.concert(&[("GA", 10)], false).await;
    let bookings = &harness.state.bookings;

    let older = bookings
        .create_booking(5, booking_request(first.concert.id, &[(first.ticket_classes[0].id, 1)]))
        .await
        .unwrap();
    let newer = bookings
        .create_booking(5, booking_request(second.concert.id, &[(second.ticket_classes[0].id, 1)]))
        .await
        .unwrap();

    let listed = bookings.list_user_bookings(5).await.unwrap();
    let ids: Vec<_> = listed.iter().map(|d| d.booking.id).collect();
    assert_eq!(ids, vec![newer.booking.id, older.booking.id]);
    assert!(bookings.list_user_bookings(6).await.unwrap().is_empty());
}
