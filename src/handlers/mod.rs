use std::future::Future;
use std::time::Duration;

use uuid::Uuid;

use crate::services::BookingError;
use crate::utils::error::AppError;

pub mod bookings;
pub mod concerts;
pub mod health;
pub mod internal;

pub use bookings::{cancel_booking, create_booking, get_booking, my_bookings};
pub use concerts::{
    concert_availability, concert_seats, create_concert, get_concert, list_concerts,
};
pub use health::health_check;
pub use internal::update_booking_status;

pub const CREATE_BOOKING_DEADLINE: Duration = Duration::from_secs(15);
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(10);

/// Runs a service call under a deadline; running out becomes a 504.
pub async fn with_deadline<T, F>(deadline: Duration, operation: &str, fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, BookingError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result.map_err(AppError::from),
        Err(_) => Err(AppError::Timeout(format!(
            "{operation} exceeded {}s",
            deadline.as_secs()
        ))),
    }
}

/// Like [`with_deadline`], but the call runs on its own task. Running out of
/// time answers the caller with a 504 while the call carries on to its end,
/// compensation included.
pub async fn detached_with_deadline<T, F>(
    deadline: Duration,
    operation: &str,
    fut: F,
) -> Result<T, AppError>
where
    F: Future<Output = Result<T, BookingError>> + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::spawn(fut);
    match tokio::time::timeout(deadline, task).await {
        Ok(Ok(result)) => result.map_err(AppError::from),
        Ok(Err(e)) => Err(AppError::InternalServerError(format!(
            "{operation} task aborted: {e}"
        ))),
        Err(_) => {
            tracing::warn!(operation, "Deadline exceeded, call continues in the background");
            Err(AppError::Timeout(format!(
                "{operation} exceeded {}s",
                deadline.as_secs()
            )))
        }
    }
}

pub fn parse_booking_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw)
        .map_err(|_| AppError::ValidationError(format!("'{raw}' is not a valid booking id")))
}

pub fn parse_concert_id(raw: &str) -> Result<i64, AppError> {
    raw.parse()
        .map_err(|_| AppError::ValidationError(format!("'{raw}' is not a valid concert id")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_overrun_is_timeout() {
        let result: Result<(), AppError> = with_deadline(Duration::from_secs(1), "slow", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(AppError::Timeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_detached_call_outlives_deadline() {
        let finished = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = finished.clone();
        let result: Result<(), AppError> =
            detached_with_deadline(Duration::from_secs(1), "slow", async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                flag.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(AppError::Timeout(_))));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(finished.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn test_ids_are_validated() {
        assert!(parse_booking_id("not-a-uuid").is_err());
        assert!(parse_concert_id("12").is_ok());
        assert!(parse_concert_id("abc").is_err());
    }
}
