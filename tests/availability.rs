mod common;

use encore_booking::counter::CounterStore;
use encore_booking::models::AvailabilitySource;
use encore_booking::services::BookingError;

use common::{booking_request, Harness};

#[tokio::test]
async fn counter_hit_is_served_from_cache() {
    let harness = Harness::new();
    let concert = harness.concert(&[("GA", 10)], true).await;
    let ga = concert.ticket_classes[0].id;

    let (available, source) = harness.state.availability.class_available(ga).await.unwrap();
    assert_eq!(available, 10);
    assert_eq!(source, AvailabilitySource::Cache);
}

#[tokio::test]
async fn counter_miss_falls_back_and_heals() {
    let harness = Harness::new();
    let concert = harness.concert(&[("GA", 10)], true).await;
    let ga = concert.ticket_classes[0].id;
    harness
        .state
        .bookings
        .create_booking(1, booking_request(concert.concert.id, &[(ga, 3)]))
        .await
        .unwrap();
    harness.counters.remove(ga).await;

    let (available, source) = harness.state.availability.class_available(ga).await.unwrap();
    assert_eq!(available, 7);
    assert_eq!(source, AvailabilitySource::Database);
    assert_eq!(harness.counters.get(ga).await.unwrap(), Some(7));

    let (_, source) = harness.state.availability.class_available(ga).await.unwrap();
    assert_eq!(source, AvailabilitySource::Cache);
}

#[tokio::test]
async fn counter_outage_still_answers_from_durable_store() {
    let harness = Harness::new();
    let concert = harness.concert(&[("GA", 4)], true).await;
    let ga = concert.ticket_classes[0].id;
    harness.counters.set_unavailable(true);

    let (available, source) = harness.state.availability.class_available(ga).await.unwrap();
    assert_eq!(available, 4);
    assert_eq!(source, AvailabilitySource::Database);
}

#[tokio::test]
async fn concert_total_is_the_sum_of_its_classes() {
    let harness = Harness::new();
    let concert = harness.concert(&[("VIP", 5), ("GA", 20)], true).await;
    let vip = concert.ticket_classes[0].id;
    harness
        .state
        .bookings
        .create_booking(1, booking_request(concert.concert.id, &[(vip, 2)]))
        .await
        .unwrap();

    let availability = harness
        .state
        .availability
        .concert_availability(concert.concert.id)
        .await
        .unwrap();
    assert_eq!(availability.ticket_classes.len(), 2);
    assert_eq!(availability.ticket_classes[0].available_seats, 3);
    assert_eq!(availability.total_available_seats, 23);
}

#[tokio::test]
async fn unknown_concert_has_no_availability() {
    let harness = Harness::new();
    assert!(matches!(
        harness.state.availability.concert_availability(404).await,
        Err(BookingError::ConcertNotFound(404))
    ));
}
