pub mod availability;
pub mod booking;
pub mod concert;
pub mod error;
pub mod payment;
pub mod reaper;
pub mod reservation;
pub mod transition;

pub use availability::AvailabilityService;
pub use booking::{BookingService, MAX_TICKETS_PER_BOOKING};
pub use concert::ConcertService;
pub use error::{BookingError, ReservationError};
pub use payment::{HttpPaymentNotifier, NotifyError, PaymentNotifier, PaymentRequest, RecordingNotifier};
pub use reaper::{ExpiryReaper, SweepReport};
pub use reservation::{ReservationEngine, MAX_CAS_ATTEMPTS};
pub use transition::{Transition, TransitionService};
