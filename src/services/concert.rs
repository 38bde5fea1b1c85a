//! Concert catalog and background seat materialization.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::availability::AvailabilityService;
use super::error::BookingError;
use crate::counter::CounterStore;
use crate::models::seat::materialized_seat_number;
use crate::models::{
    ConcertResponse, ConcertStatus, ConcertWithClasses, CreateConcertRequest, NewSeat,
    SeatCreationMessage, SeatResponse,
};
use crate::queue::{QueueError, SeatQueue};
use crate::store::BookingStore;

const QUEUE_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct ConcertService {
    store: Arc<dyn BookingStore>,
    counters: Arc<dyn CounterStore>,
    queue: Arc<dyn SeatQueue>,
    availability: AvailabilityService,
}

impl ConcertService {
    pub fn new(
        store: Arc<dyn BookingStore>,
        counters: Arc<dyn CounterStore>,
        queue: Arc<dyn SeatQueue>,
        availability: AvailabilityService,
    ) -> Self {
        Self {
            store,
            counters,
            queue,
            availability,
        }
    }

    /// Stores the concert and queues its seat materialization. If the queue
    /// rejects the job the concert is marked failed.
    pub async fn create_concert(
        &self,
        request: CreateConcertRequest,
    ) -> Result<ConcertWithClasses, BookingError> {
        request.validate().map_err(BookingError::Validation)?;

        let mut concert = self.store.create_concert(&request).await?;
        let concert_id = concert.concert.id;
        self.seed_counters(&concert).await;

        match self.queue.publish(&SeatCreationMessage::from(&concert)).await {
            Ok(()) => info!(concert_id, "Seat creation queued"),
            Err(e) => {
                error!(concert_id, error = %e, "Failed to queue seat creation");
                self.store
                    .set_concert_status(concert_id, ConcertStatus::Failed)
                    .await?;
                concert.concert.status = ConcertStatus::Failed;
            }
        }
        Ok(concert)
    }

    pub async fn list_concerts(&self) -> Result<Vec<ConcertResponse>, BookingError> {
        let concerts = self.store.list_concerts().await?;
        let mut out = Vec::with_capacity(concerts.len());
        for concert in &concerts {
            let available = self.availability.for_catalog(concert).await;
            out.push(ConcertResponse::new(concert, &available));
        }
        Ok(out)
    }

    pub async fn get_concert(&self, concert_id: i64) -> Result<ConcertResponse, BookingError> {
        let concert = self
            .store
            .get_concert(concert_id)
            .await?
            .ok_or(BookingError::ConcertNotFound(concert_id))?;
        let available = self.availability.for_catalog(&concert).await;
        Ok(ConcertResponse::new(&concert, &available))
    }

    pub async fn concert_seats(&self, concert_id: i64) -> Result<Vec<SeatResponse>, BookingError> {
        let concert = self
            .store
            .get_concert(concert_id)
            .await?
            .ok_or(BookingError::ConcertNotFound(concert_id))?;
        let seats = self.store.list_concert_seats(concert_id).await?;

        Ok(seats
            .iter()
            .map(|seat| {
                let mut response = SeatResponse::from(seat);
                response.ticket_class_name = concert
                    .ticket_class(seat.ticket_class_id)
                    .map(|tc| tc.name.clone());
                response
            })
            .collect())
    }

    /// Materializes the seats described by `message`. Returns `false` when the
    /// concert no longer waits for seats.
    pub async fn process_seat_creation(
        &self,
        message: &SeatCreationMessage,
    ) -> Result<bool, BookingError> {
        let concert_id = message.concert_id;
        let concert = self
            .store
            .get_concert(concert_id)
            .await?
            .ok_or(BookingError::ConcertNotFound(concert_id))?;
        if concert.concert.status != ConcertStatus::PendingSeatCreation {
            info!(concert_id, status = %concert.concert.status, "Skipping seat creation");
            return Ok(false);
        }

        let seats: Vec<NewSeat> = message
            .ticket_classes
            .iter()
            .flat_map(|tc| {
                (1..=tc.total_seats_in_class).map(move |n| NewSeat {
                    concert_id,
                    ticket_class_id: tc.ticket_class_id,
                    seat_number: materialized_seat_number(&tc.name, n),
                })
            })
            .collect();
        let seat_count = seats.len();

        if let Err(e) = self.store.materialize_seats(concert_id, seats).await {
            error!(concert_id, error = %e, "Seat materialization failed");
            if let Err(mark) = self
                .store
                .set_concert_status(concert_id, ConcertStatus::Failed)
                .await
            {
                error!(concert_id, error = %mark, "Failed to mark concert as failed");
            }
            return Err(e.into());
        }

        self.seed_counters(&concert).await;
        info!(concert_id, seats = seat_count, "Concert seats materialized");
        Ok(true)
    }

    /// Re-queues concerts left waiting for seats by an earlier process.
    pub async fn recover_pending(&self) -> Result<usize, BookingError> {
        let pending = self
            .store
            .concerts_by_status(ConcertStatus::PendingSeatCreation)
            .await?;
        for concert in &pending {
            self.queue.publish(&SeatCreationMessage::from(concert)).await?;
        }
        if !pending.is_empty() {
            info!(count = pending.len(), "Re-queued pending seat creation");
        }
        Ok(pending.len())
    }

    /// Consumes seat creation jobs until `shutdown` flips to `true`.
    pub fn spawn_worker(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Seat creation worker started");
            while !*shutdown.borrow() {
                tokio::select! {
                    next = self.queue.next() => match next {
                        Ok(Some(message)) => {
                            if let Err(e) = self.process_seat_creation(&message).await {
                                error!(concert_id = message.concert_id, error = %e, "Seat creation job failed");
                            }
                        }
                        Ok(None) => {}
                        Err(QueueError::Closed) => break,
                        Err(e) => {
                            warn!(error = %e, "Seat queue read failed");
                            tokio::time::sleep(QUEUE_RETRY_DELAY).await;
                        }
                    },
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            info!("Seat creation worker stopped");
        })
    }

    async fn seed_counters(&self, concert: &ConcertWithClasses) {
        for tc in &concert.ticket_classes {
            if let Err(e) = self
                .counters
                .set(tc.id, i64::from(tc.total_seats_in_class))
                .await
            {
                warn!(ticket_class_id = tc.id, error = %e, "Failed to seed availability counter");
            }
        }
    }
}
