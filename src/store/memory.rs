use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{BookingStore, NewBooking, StoreError, TransitionUpdate};
use crate::models::seat::synthetic_seat_number;
use crate::models::{
    Booking, BookingDetails, BookingStatus, Buyer, Concert, ConcertStatus, ConcertWithClasses,
    CreateConcertRequest, NewSeat, Seat, SeatStatus, TicketClass, TicketHolder,
};

/// Store operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    FindActive,
    CreateBooking,
    GetBooking,
    ApplyTransition,
    ExpiredScan,
    CountSeats,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    concerts: BTreeMap<i64, Concert>,
    classes: BTreeMap<i64, TicketClass>,
    seats: BTreeMap<i64, Seat>,
    bookings: HashMap<Uuid, Booking>,
    booking_order: Vec<Uuid>,
    booking_seats: HashMap<Uuid, Vec<i64>>,
    buyers: HashMap<Uuid, Buyer>,
    holders: HashMap<Uuid, TicketHolder>,
    fail_points: HashSet<FailPoint>,
    delays: HashMap<FailPoint, Duration>,
    failing_bookings: HashSet<Uuid>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&self, point: FailPoint) -> Result<(), StoreError> {
        if self.fail_points.contains(&point) {
            return Err(StoreError::Unavailable(format!("injected failure at {point:?}")));
        }
        Ok(())
    }

    fn with_classes(&self, concert: &Concert) -> ConcertWithClasses {
        ConcertWithClasses {
            concert: concert.clone(),
            ticket_classes: self
                .classes
                .values()
                .filter(|tc| tc.concert_id == concert.id)
                .cloned()
                .collect(),
        }
    }

    fn details(&self, booking_id: Uuid) -> Option<BookingDetails> {
        let booking = self.bookings.get(&booking_id)?.clone();
        let concert = self.concerts.get(&booking.concert_id)?;
        let seats = self
            .booking_seats
            .get(&booking_id)
            .map(|ids| ids.iter().filter_map(|id| self.seats.get(id).cloned()).collect())
            .unwrap_or_default();

        Some(BookingDetails {
            seats,
            buyer: self.buyers.get(&booking_id).cloned(),
            ticket_holder: self.holders.get(&booking_id).cloned(),
            concert_name: concert.name.clone(),
            concert_date: concert.date,
            booking,
        })
    }
}

/// In-process [`BookingStore`] for tests and local runs.
///
/// Each method validates everything it needs before touching any state, so a
/// rejected call leaves the store exactly as it was, like a rolled-back
/// transaction.
#[derive(Default)]
pub struct MemoryBookingStore {
    inner: Mutex<Inner>,
}

impl MemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail(&self, point: FailPoint) {
        self.inner.lock().await.fail_points.insert(point);
    }

    pub async fn heal(&self, point: FailPoint) {
        self.inner.lock().await.fail_points.remove(&point);
    }

    /// Makes an operation sleep before it runs. Combined with [`Self::fail`]
    /// the operation is slow and then fails.
    pub async fn delay(&self, point: FailPoint, delay: Duration) {
        self.inner.lock().await.delays.insert(point, delay);
    }

    async fn stall(&self, point: FailPoint) {
        let delay = self.inner.lock().await.delays.get(&point).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    /// Makes every transition of one booking fail until healed.
    pub async fn fail_booking(&self, booking_id: Uuid) {
        self.inner.lock().await.failing_bookings.insert(booking_id);
    }

    pub async fn heal_booking(&self, booking_id: Uuid) {
        self.inner.lock().await.failing_bookings.remove(&booking_id);
    }

    pub async fn booking_count(&self) -> usize {
        self.inner.lock().await.bookings.len()
    }

    pub async fn ticket_class(&self, ticket_class_id: i64) -> Option<TicketClass> {
        self.inner.lock().await.classes.get(&ticket_class_id).cloned()
    }

    /// Overwrites a booking's expiry, letting tests age bookings.
    pub async fn set_expires_at(&self, booking_id: Uuid, expires_at: DateTime<Utc>) {
        if let Some(booking) = self.inner.lock().await.bookings.get_mut(&booking_id) {
            booking.expires_at = Some(expires_at);
        }
    }
}

#[async_trait]
impl BookingStore for MemoryBookingStore {
    async fn find_active_bookings(
        &self,
        user_id: i64,
        concert_id: i64,
    ) -> Result<Vec<Booking>, StoreError> {
        let inner = self.inner.lock().await;
        inner.check(FailPoint::FindActive)?;
        Ok(inner
            .bookings
            .values()
            .filter(|b| b.user_id == user_id && b.concert_id == concert_id && b.status.is_active())
            .cloned()
            .collect())
    }

    async fn create_booking(&self, new: NewBooking) -> Result<BookingDetails, StoreError> {
        self.stall(FailPoint::CreateBooking).await;
        let mut inner = self.inner.lock().await;
        inner.check(FailPoint::CreateBooking)?;

        if inner.bookings.contains_key(&new.id) {
            return Err(StoreError::Constraint(format!("booking {} already exists", new.id)));
        }
        if !inner.concerts.contains_key(&new.concert_id) {
            return Err(StoreError::NotFound(format!("concert {}", new.concert_id)));
        }
        for alloc in &new.allocations {
            let class = inner
                .classes
                .get(&alloc.ticket_class_id)
                .filter(|tc| tc.concert_id == new.concert_id)
                .ok_or_else(|| StoreError::NotFound(format!("ticket class {}", alloc.ticket_class_id)))?;
            if class.available_seats_in_class < alloc.quantity {
                return Err(StoreError::Constraint(format!(
                    "ticket class {} cannot give up {} more seats",
                    alloc.ticket_class_id, alloc.quantity
                )));
            }
        }

        let now = Utc::now();
        let mut seat_ids = Vec::new();
        for alloc in &new.allocations {
            if let Some(class) = inner.classes.get_mut(&alloc.ticket_class_id) {
                class.available_seats_in_class -= alloc.quantity;
                class.updated_at = now;
            }

            let wanted = usize::try_from(alloc.quantity).unwrap_or_default();
            let claimed: Vec<i64> = inner
                .seats
                .values()
                .filter(|s| s.ticket_class_id == alloc.ticket_class_id && s.status == SeatStatus::Available)
                .map(|s| s.id)
                .take(wanted)
                .collect();
            for id in &claimed {
                if let Some(seat) = inner.seats.get_mut(id) {
                    seat.status = SeatStatus::Reserved;
                    seat.user_id = Some(new.user_id);
                    seat.booking_id = Some(new.id);
                    seat.updated_at = now;
                }
            }
            let shortfall = wanted.saturating_sub(claimed.len());
            seat_ids.extend(claimed);

            for _ in 0..shortfall {
                let id = inner.next_id();
                let seat = Seat {
                    id,
                    concert_id: new.concert_id,
                    ticket_class_id: alloc.ticket_class_id,
                    seat_number: synthetic_seat_number(&alloc.class_name, new.id, seat_ids.len() + 1),
                    status: SeatStatus::Reserved,
                    user_id: Some(new.user_id),
                    booking_id: Some(new.id),
                    created_at: now,
                    updated_at: now,
                };
                inner.seats.insert(id, seat);
                seat_ids.push(id);
            }
        }

        let buyer_id = inner.next_id();
        inner.buyers.insert(
            new.id,
            Buyer {
                id: buyer_id,
                booking_id: new.id,
                full_name: new.buyer.full_name.clone(),
                phone_number: new.buyer.phone_number.clone(),
                email: new.buyer.email.clone(),
                national_id: new.buyer.national_id.clone(),
                created_at: now,
            },
        );
        if let Some(holder) = &new.ticket_holder {
            let holder_id = inner.next_id();
            inner.holders.insert(
                new.id,
                TicketHolder {
                    id: holder_id,
                    booking_id: new.id,
                    full_name: holder.full_name.clone(),
                    national_id: holder.national_id.clone(),
                    created_at: now,
                },
            );
        }

        inner.booking_seats.insert(new.id, seat_ids);
        inner.bookings.insert(
            new.id,
            Booking {
                id: new.id,
                user_id: new.user_id,
                concert_id: new.concert_id,
                total_price: new.total_price,
                status: BookingStatus::Pending,
                payment_id: None,
                expires_at: Some(new.expires_at),
                created_at: now,
                updated_at: now,
            },
        );
        inner.booking_order.push(new.id);

        inner
            .details(new.id)
            .ok_or_else(|| StoreError::NotFound(format!("booking {}", new.id)))
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<BookingDetails>, StoreError> {
        let inner = self.inner.lock().await;
        inner.check(FailPoint::GetBooking)?;
        Ok(inner.details(booking_id))
    }

    async fn list_user_bookings(&self, user_id: i64) -> Result<Vec<BookingDetails>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .booking_order
            .iter()
            .rev()
            .filter(|id| inner.bookings.get(*id).is_some_and(|b| b.user_id == user_id))
            .filter_map(|id| inner.details(*id))
            .collect())
    }

    async fn apply_transition(&self, update: TransitionUpdate) -> Result<(), StoreError> {
        self.stall(FailPoint::ApplyTransition).await;
        let mut inner = self.inner.lock().await;
        inner.check(FailPoint::ApplyTransition)?;
        if inner.failing_bookings.contains(&update.booking_id) {
            return Err(StoreError::Unavailable(format!(
                "injected failure for booking {}",
                update.booking_id
            )));
        }
        if !inner.bookings.contains_key(&update.booking_id) {
            return Err(StoreError::NotFound(format!("booking {}", update.booking_id)));
        }

        let now = Utc::now();
        let seat_ids = inner
            .booking_seats
            .get(&update.booking_id)
            .cloned()
            .unwrap_or_default();
        for id in seat_ids {
            let Some(seat) = inner.seats.get_mut(&id) else {
                continue;
            };
            if seat.booking_id != Some(update.booking_id) {
                continue;
            }
            seat.status = update.seat_status;
            if update.seat_status == SeatStatus::Available {
                seat.user_id = None;
                seat.booking_id = None;
            }
            seat.updated_at = now;
        }

        for (ticket_class_id, quantity) in &update.restored {
            if let Some(class) = inner.classes.get_mut(ticket_class_id) {
                let restored = i64::from(class.available_seats_in_class) + quantity;
                class.available_seats_in_class =
                    restored.min(i64::from(class.total_seats_in_class)) as i32;
                class.updated_at = now;
            }
        }

        if let Some(booking) = inner.bookings.get_mut(&update.booking_id) {
            booking.status = update.status;
            if update.payment_id.is_some() {
                booking.payment_id = update.payment_id;
            }
            booking.expires_at = None;
            booking.updated_at = now;
        }
        Ok(())
    }

    async fn expired_pending_bookings(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError> {
        let inner = self.inner.lock().await;
        inner.check(FailPoint::ExpiredScan)?;
        let mut expired: Vec<&Booking> = inner
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::Pending && b.expires_at.is_some_and(|at| at < now))
            .collect();
        expired.sort_by_key(|b| b.expires_at);
        Ok(expired.into_iter().map(|b| b.id).collect())
    }

    async fn count_available_seats(&self, ticket_class_id: i64) -> Result<i64, StoreError> {
        let inner = self.inner.lock().await;
        inner.check(FailPoint::CountSeats)?;
        Ok(inner
            .seats
            .values()
            .filter(|s| s.ticket_class_id == ticket_class_id && s.status == SeatStatus::Available)
            .count() as i64)
    }

    async fn get_concert(&self, concert_id: i64) -> Result<Option<ConcertWithClasses>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.concerts.get(&concert_id).map(|c| inner.with_classes(c)))
    }

    async fn list_concerts(&self) -> Result<Vec<ConcertWithClasses>, StoreError> {
        let inner = self.inner.lock().await;
        let mut concerts: Vec<ConcertWithClasses> =
            inner.concerts.values().map(|c| inner.with_classes(c)).collect();
        concerts.sort_by_key(|c| (c.concert.date, c.concert.id));
        Ok(concerts)
    }

    async fn concerts_by_status(
        &self,
        status: ConcertStatus,
    ) -> Result<Vec<ConcertWithClasses>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .concerts
            .values()
            .filter(|c| c.status == status)
            .map(|c| inner.with_classes(c))
            .collect())
    }

    async fn list_concert_seats(&self, concert_id: i64) -> Result<Vec<Seat>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .seats
            .values()
            .filter(|s| s.concert_id == concert_id)
            .cloned()
            .collect())
    }

    async fn create_concert(
        &self,
        request: &CreateConcertRequest,
    ) -> Result<ConcertWithClasses, StoreError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let concert_id = inner.next_id();
        let concert = Concert {
            id: concert_id,
            name: request.name.clone(),
            artist: request.artist.clone(),
            venue: request.venue.clone(),
            date: request.date,
            description: request.description.clone(),
            image_url: request.image_url.clone(),
            total_seats: request.total_seats(),
            status: ConcertStatus::PendingSeatCreation,
            created_at: now,
            updated_at: now,
        };
        inner.concerts.insert(concert_id, concert.clone());

        for tc in &request.ticket_classes {
            let id = inner.next_id();
            inner.classes.insert(
                id,
                TicketClass {
                    id,
                    concert_id,
                    name: tc.name.clone(),
                    price: tc.price,
                    total_seats_in_class: tc.total_seats_in_class,
                    available_seats_in_class: tc.total_seats_in_class,
                    created_at: now,
                    updated_at: now,
                },
            );
        }
        Ok(inner.with_classes(&concert))
    }

    async fn materialize_seats(
        &self,
        concert_id: i64,
        seats: Vec<NewSeat>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.concerts.contains_key(&concert_id) {
            return Err(StoreError::NotFound(format!("concert {concert_id}")));
        }

        let now = Utc::now();
        let taken: HashSet<(i64, String)> = inner
            .seats
            .values()
            .map(|s| (s.concert_id, s.seat_number.clone()))
            .collect();
        for new_seat in seats {
            if taken.contains(&(new_seat.concert_id, new_seat.seat_number.clone())) {
                continue;
            }
            let id = inner.next_id();
            inner.seats.insert(
                id,
                Seat {
                    id,
                    concert_id: new_seat.concert_id,
                    ticket_class_id: new_seat.ticket_class_id,
                    seat_number: new_seat.seat_number,
                    status: SeatStatus::Available,
                    user_id: None,
                    booking_id: None,
                    created_at: now,
                    updated_at: now,
                },
            );
        }

        for class in inner.classes.values_mut().filter(|tc| tc.concert_id == concert_id) {
            class.available_seats_in_class = class.total_seats_in_class;
            class.updated_at = now;
        }
        if let Some(concert) = inner.concerts.get_mut(&concert_id) {
            concert.status = ConcertStatus::Active;
            concert.updated_at = now;
        }
        Ok(())
    }

    async fn set_concert_status(
        &self,
        concert_id: i64,
        status: ConcertStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let concert = inner
            .concerts
            .get_mut(&concert_id)
            .ok_or_else(|| StoreError::NotFound(format!("concert {concert_id}")))?;
        concert.status = status;
        concert.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BuyerRequest, CreateTicketClassRequest};
    use crate::store::SeatAllocation;
    use rust_decimal::Decimal;

    async fn concert(store: &MemoryBookingStore, seats: i32) -> ConcertWithClasses {
        let request = CreateConcertRequest {
            name: "Summer Night".to_string(),
            artist: "The Band".to_string(),
            date: Utc::now(),
            venue: "Arena".to_string(),
            description: None,
            image_url: None,
            ticket_classes: vec![CreateTicketClassRequest {
                name: "GA".to_string(),
                price: Decimal::new(10000, 2),
                total_seats_in_class: seats,
            }],
        };
        store.create_concert(&request).await.unwrap()
    }

    fn new_booking(concert: &ConcertWithClasses, quantity: i32) -> NewBooking {
        let class = &concert.ticket_classes[0];
        NewBooking {
            id: Uuid::new_v4(),
            user_id: 1,
            concert_id: concert.concert.id,
            total_price: class.price * Decimal::from(quantity),
            expires_at: Utc::now(),
            allocations: vec![SeatAllocation {
                ticket_class_id: class.id,
                class_name: class.name.clone(),
                quantity,
            }],
            buyer: BuyerRequest {
                full_name: "Dewi Lestari".to_string(),
                phone_number: "081234567890".to_string(),
                email: "dewi@example.com".to_string(),
                national_id: "3174012345678901".to_string(),
            },
            ticket_holder: None,
        }
    }

    #[tokio::test]
    async fn test_booking_claims_materialized_seats_first() {
        let store = MemoryBookingStore::new();
        let concert = concert(&store, 3).await;
        let class = &concert.ticket_classes[0];
        let seats = (1..=2)
            .map(|n| NewSeat {
                concert_id: concert.concert.id,
                ticket_class_id: class.id,
                seat_number: format!("GA-S{n}"),
            })
            .collect();
        store.materialize_seats(concert.concert.id, seats).await.unwrap();

        let details = store.create_booking(new_booking(&concert, 3)).await.unwrap();
        let numbers: Vec<&str> = details.seats.iter().map(|s| s.seat_number.as_str()).collect();
        assert_eq!(&numbers[..2], &["GA-S1", "GA-S2"]);
        assert!(numbers[2].ends_with("-3"));
        assert_eq!(store.ticket_class(class.id).await.unwrap().available_seats_in_class, 0);
    }

    #[tokio::test]
    async fn test_rejected_booking_leaves_no_trace() {
        let store = MemoryBookingStore::new();
        let concert = concert(&store, 1).await;
        let err = store.create_booking(new_booking(&concert, 2)).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
        assert_eq!(store.booking_count().await, 0);
        assert_eq!(
            store
                .ticket_class(concert.ticket_classes[0].id)
                .await
                .unwrap()
                .available_seats_in_class,
            1
        );
    }

    #[tokio::test]
    async fn test_releasing_transition_restores_mirror_and_seats() {
        let store = MemoryBookingStore::new();
        let concert = concert(&store, 4).await;
        let class_id = concert.ticket_classes[0].id;
        let details = store.create_booking(new_booking(&concert, 2)).await.unwrap();

        store
            .apply_transition(TransitionUpdate {
                booking_id: details.booking.id,
                status: BookingStatus::Cancelled,
                payment_id: None,
                seat_status: SeatStatus::Available,
                restored: vec![(class_id, 2)],
            })
            .await
            .unwrap();

        let after = store.get_booking(details.booking.id).await.unwrap().unwrap();
        assert_eq!(after.booking.status, BookingStatus::Cancelled);
        assert!(after.booking.expires_at.is_none());
        assert_eq!(store.ticket_class(class_id).await.unwrap().available_seats_in_class, 4);
        assert_eq!(store.count_available_seats(class_id).await.unwrap(), 2);
    }
}
