use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use super::{BookingStore, NewBooking, StoreError, TransitionUpdate};
use crate::models::seat::synthetic_seat_number;
use crate::models::{
    Booking, BookingDetails, BookingStatus, Buyer, Concert, ConcertStatus, ConcertWithClasses,
    CreateConcertRequest, NewSeat, Seat, SeatStatus, TicketClass, TicketHolder,
};

const CONCERT_COLUMNS: &str = "id, name, artist, venue, date, description, image_url, \
    total_seats, status, created_at, updated_at";

const TICKET_CLASS_COLUMNS: &str = "id, concert_id, name, price, total_seats_in_class, \
    available_seats_in_class, created_at, updated_at";

const SEAT_COLUMNS: &str = "id, concert_id, ticket_class_id, seat_number, status, user_id, \
    booking_id, created_at, updated_at";

const JOINED_SEAT_COLUMNS: &str = "s.id, s.concert_id, s.ticket_class_id, s.seat_number, \
    s.status, s.user_id, s.booking_id, s.created_at, s.updated_at";

const BOOKING_COLUMNS: &str = "id, user_id, concert_id, total_price, status, payment_id, \
    expires_at, created_at, updated_at";

const SEAT_BATCH_SIZE: usize = 200;

#[derive(Clone)]
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        info!("Connected to database");
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .map_err(sqlx::Error::from)?;
        info!("Migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

async fn load_classes(
    conn: &mut PgConnection,
    concert_id: i64,
) -> Result<Vec<TicketClass>, sqlx::Error> {
    let sql =
        format!("SELECT {TICKET_CLASS_COLUMNS} FROM ticket_classes WHERE concert_id = $1 ORDER BY id");
    sqlx::query_as::<_, TicketClass>(&sql)
        .bind(concert_id)
        .fetch_all(&mut *conn)
        .await
}

async fn attach_classes(
    conn: &mut PgConnection,
    concerts: Vec<Concert>,
) -> Result<Vec<ConcertWithClasses>, sqlx::Error> {
    let mut out = Vec::with_capacity(concerts.len());
    for concert in concerts {
        let ticket_classes = load_classes(conn, concert.id).await?;
        out.push(ConcertWithClasses {
            concert,
            ticket_classes,
        });
    }
    Ok(out)
}

async fn load_details(
    conn: &mut PgConnection,
    booking: Booking,
) -> Result<BookingDetails, sqlx::Error> {
    let seats_sql = format!(
        "SELECT {JOINED_SEAT_COLUMNS} FROM seats s \
         JOIN booking_seats bs ON bs.seat_id = s.id \
         WHERE bs.booking_id = $1 ORDER BY bs.position"
    );
    let seats = sqlx::query_as::<_, Seat>(&seats_sql)
        .bind(booking.id)
        .fetch_all(&mut *conn)
        .await?;

    let buyer = sqlx::query_as::<_, Buyer>(
        "SELECT id, booking_id, full_name, phone_number, email, national_id, created_at \
         FROM buyers WHERE booking_id = $1",
    )
    .bind(booking.id)
    .fetch_optional(&mut *conn)
    .await?;

    let ticket_holder = sqlx::query_as::<_, TicketHolder>(
        "SELECT id, booking_id, full_name, national_id, created_at \
         FROM ticket_holders WHERE booking_id = $1",
    )
    .bind(booking.id)
    .fetch_optional(&mut *conn)
    .await?;

    let (concert_name, concert_date) =
        sqlx::query_as::<_, (String, DateTime<Utc>)>("SELECT name, date FROM concerts WHERE id = $1")
            .bind(booking.concert_id)
            .fetch_one(&mut *conn)
            .await?;

    Ok(BookingDetails {
        booking,
        seats,
        buyer,
        ticket_holder,
        concert_name,
        concert_date,
    })
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn find_active_bookings(
        &self,
        user_id: i64,
        concert_id: i64,
    ) -> Result<Vec<Booking>, StoreError> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE user_id = $1 AND concert_id = $2 AND status IN ($3, $4)"
        );
        let bookings = sqlx::query_as::<_, Booking>(&sql)
            .bind(user_id)
            .bind(concert_id)
            .bind(BookingStatus::Pending.as_str())
            .bind(BookingStatus::Confirmed.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(bookings)
    }

    async fn create_booking(&self, new: NewBooking) -> Result<BookingDetails, StoreError> {
        let mut tx = self.pool.begin().await?;

        let insert_booking = format!(
            "INSERT INTO bookings (id, user_id, concert_id, total_price, status, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {BOOKING_COLUMNS}"
        );
        let booking = sqlx::query_as::<_, Booking>(&insert_booking)
            .bind(new.id)
            .bind(new.user_id)
            .bind(new.concert_id)
            .bind(new.total_price)
            .bind(BookingStatus::Pending.as_str())
            .bind(new.expires_at)
            .fetch_one(&mut *tx)
            .await?;

        let claim_seats = format!(
            "UPDATE seats SET status = $1, user_id = $2, booking_id = $3, updated_at = NOW() \
             WHERE id IN ( \
                 SELECT id FROM seats WHERE ticket_class_id = $4 AND status = $5 \
                 ORDER BY id LIMIT $6 FOR UPDATE SKIP LOCKED \
             ) RETURNING {SEAT_COLUMNS}"
        );
        let insert_seat = format!(
            "INSERT INTO seats (concert_id, ticket_class_id, seat_number, status, user_id, booking_id) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {SEAT_COLUMNS}"
        );

        let mut seats: Vec<Seat> = Vec::new();
        for alloc in &new.allocations {
            let mirror = sqlx::query(
                "UPDATE ticket_classes \
                 SET available_seats_in_class = available_seats_in_class - $2, updated_at = NOW() \
                 WHERE id = $1 AND concert_id = $3 AND available_seats_in_class >= $2",
            )
            .bind(alloc.ticket_class_id)
            .bind(alloc.quantity)
            .bind(new.concert_id)
            .execute(&mut *tx)
            .await?;
            if mirror.rows_affected() == 0 {
                return Err(StoreError::Constraint(format!(
                    "ticket class {} cannot give up {} more seats",
                    alloc.ticket_class_id, alloc.quantity
                )));
            }

            let mut claimed = sqlx::query_as::<_, Seat>(&claim_seats)
                .bind(SeatStatus::Reserved.as_str())
                .bind(new.user_id)
                .bind(new.id)
                .bind(alloc.ticket_class_id)
                .bind(SeatStatus::Available.as_str())
                .bind(i64::from(alloc.quantity))
                .fetch_all(&mut *tx)
                .await?;
            claimed.sort_by_key(|seat| seat.id);

            let wanted = usize::try_from(alloc.quantity).unwrap_or_default();
            let shortfall = wanted.saturating_sub(claimed.len());
            seats.extend(claimed);

            for _ in 0..shortfall {
                let seat_number = synthetic_seat_number(&alloc.class_name, new.id, seats.len() + 1);
                let seat = sqlx::query_as::<_, Seat>(&insert_seat)
                    .bind(new.concert_id)
                    .bind(alloc.ticket_class_id)
                    .bind(seat_number)
                    .bind(SeatStatus::Reserved.as_str())
                    .bind(new.user_id)
                    .bind(new.id)
                    .fetch_one(&mut *tx)
                    .await?;
                seats.push(seat);
            }
        }

        for (position, seat) in seats.iter().enumerate() {
            sqlx::query("INSERT INTO booking_seats (booking_id, seat_id, position) VALUES ($1, $2, $3)")
                .bind(new.id)
                .bind(seat.id)
                .bind(position as i32)
                .execute(&mut *tx)
                .await?;
        }

        let buyer = sqlx::query_as::<_, Buyer>(
            "INSERT INTO buyers (booking_id, full_name, phone_number, email, national_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, booking_id, full_name, phone_number, email, national_id, created_at",
        )
        .bind(new.id)
        .bind(&new.buyer.full_name)
        .bind(&new.buyer.phone_number)
        .bind(&new.buyer.email)
        .bind(&new.buyer.national_id)
        .fetch_one(&mut *tx)
        .await?;

        let ticket_holder = match &new.ticket_holder {
            Some(holder) => Some(
                sqlx::query_as::<_, TicketHolder>(
                    "INSERT INTO ticket_holders (booking_id, full_name, national_id) \
                     VALUES ($1, $2, $3) \
                     RETURNING id, booking_id, full_name, national_id, created_at",
                )
                .bind(new.id)
                .bind(&holder.full_name)
                .bind(&holder.national_id)
                .fetch_one(&mut *tx)
                .await?,
            ),
            None => None,
        };

        let (concert_name, concert_date) = sqlx::query_as::<_, (String, DateTime<Utc>)>(
            "SELECT name, date FROM concerts WHERE id = $1",
        )
        .bind(new.concert_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(BookingDetails {
            booking,
            seats,
            buyer: Some(buyer),
            ticket_holder,
            concert_name,
            concert_date,
        })
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<BookingDetails>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1");
        let booking = sqlx::query_as::<_, Booking>(&sql)
            .bind(booking_id)
            .fetch_optional(&mut *conn)
            .await?;

        match booking {
            Some(booking) => Ok(Some(load_details(&mut conn, booking).await?)),
            None => Ok(None),
        }
    }

    async fn list_user_bookings(&self, user_id: i64) -> Result<Vec<BookingDetails>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = $1 ORDER BY created_at DESC"
        );
        let bookings = sqlx::query_as::<_, Booking>(&sql)
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;

        let mut out = Vec::with_capacity(bookings.len());
        for booking in bookings {
            out.push(load_details(&mut conn, booking).await?);
        }
        Ok(out)
    }

    async fn apply_transition(&self, update: TransitionUpdate) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let seat_ids: Vec<i64> =
            sqlx::query_scalar("SELECT seat_id FROM booking_seats WHERE booking_id = $1")
                .bind(update.booking_id)
                .fetch_all(&mut *tx)
                .await?;

        let seat_update = match update.seat_status {
            SeatStatus::Available => {
                "UPDATE seats SET status = $1, user_id = NULL, booking_id = NULL, updated_at = NOW() \
                 WHERE id = ANY($2) AND booking_id = $3"
            }
            SeatStatus::Reserved | SeatStatus::Booked => {
                "UPDATE seats SET status = $1, updated_at = NOW() \
                 WHERE id = ANY($2) AND booking_id = $3"
            }
        };
        sqlx::query(seat_update)
            .bind(update.seat_status.as_str())
            .bind(seat_ids.as_slice())
            .bind(update.booking_id)
            .execute(&mut *tx)
            .await?;

        for (ticket_class_id, quantity) in &update.restored {
            sqlx::query(
                "UPDATE ticket_classes \
                 SET available_seats_in_class = LEAST(available_seats_in_class + $2::int, total_seats_in_class), \
                     updated_at = NOW() \
                 WHERE id = $1",
            )
            .bind(ticket_class_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;
        }

        let updated = sqlx::query(
            "UPDATE bookings \
             SET status = $2, payment_id = COALESCE($3, payment_id), expires_at = NULL, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(update.booking_id)
        .bind(update.status.as_str())
        .bind(update.payment_id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("booking {}", update.booking_id)));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn expired_pending_bookings(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM bookings WHERE status = $1 AND expires_at < $2 ORDER BY expires_at",
        )
        .bind(BookingStatus::Pending.as_str())
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn count_available_seats(&self, ticket_class_id: i64) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM seats WHERE ticket_class_id = $1 AND status = $2",
        )
        .bind(ticket_class_id)
        .bind(SeatStatus::Available.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn get_concert(&self, concert_id: i64) -> Result<Option<ConcertWithClasses>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("SELECT {CONCERT_COLUMNS} FROM concerts WHERE id = $1");
        let concert = sqlx::query_as::<_, Concert>(&sql)
            .bind(concert_id)
            .fetch_optional(&mut *conn)
            .await?;

        match concert {
            Some(concert) => {
                let ticket_classes = load_classes(&mut conn, concert.id).await?;
                Ok(Some(ConcertWithClasses {
                    concert,
                    ticket_classes,
                }))
            }
            None => Ok(None),
        }
    }

    async fn list_concerts(&self) -> Result<Vec<ConcertWithClasses>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("SELECT {CONCERT_COLUMNS} FROM concerts ORDER BY date, id");
        let concerts = sqlx::query_as::<_, Concert>(&sql)
            .fetch_all(&mut *conn)
            .await?;
        Ok(attach_classes(&mut conn, concerts).await?)
    }

    async fn concerts_by_status(
        &self,
        status: ConcertStatus,
    ) -> Result<Vec<ConcertWithClasses>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("SELECT {CONCERT_COLUMNS} FROM concerts WHERE status = $1 ORDER BY id");
        let concerts = sqlx::query_as::<_, Concert>(&sql)
            .bind(status.as_str())
            .fetch_all(&mut *conn)
            .await?;
        Ok(attach_classes(&mut conn, concerts).await?)
    }

    async fn list_concert_seats(&self, concert_id: i64) -> Result<Vec<Seat>, StoreError> {
        let sql = format!("SELECT {SEAT_COLUMNS} FROM seats WHERE concert_id = $1 ORDER BY id");
        let seats = sqlx::query_as::<_, Seat>(&sql)
            .bind(concert_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(seats)
    }

    async fn create_concert(
        &self,
        request: &CreateConcertRequest,
    ) -> Result<ConcertWithClasses, StoreError> {
        let mut tx = self.pool.begin().await?;

        let insert_concert = format!(
            "INSERT INTO concerts (name, artist, venue, date, description, image_url, total_seats, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {CONCERT_COLUMNS}"
        );
        let concert = sqlx::query_as::<_, Concert>(&insert_concert)
            .bind(&request.name)
            .bind(&request.artist)
            .bind(&request.venue)
            .bind(request.date)
            .bind(&request.description)
            .bind(&request.image_url)
            .bind(request.total_seats())
            .bind(ConcertStatus::PendingSeatCreation.as_str())
            .fetch_one(&mut *tx)
            .await?;

        let insert_class = format!(
            "INSERT INTO ticket_classes (concert_id, name, price, total_seats_in_class, available_seats_in_class) \
             VALUES ($1, $2, $3, $4, $4) RETURNING {TICKET_CLASS_COLUMNS}"
        );
        let mut ticket_classes = Vec::with_capacity(request.ticket_classes.len());
        for tc in &request.ticket_classes {
            let class = sqlx::query_as::<_, TicketClass>(&insert_class)
                .bind(concert.id)
                .bind(&tc.name)
                .bind(tc.price)
                .bind(tc.total_seats_in_class)
                .fetch_one(&mut *tx)
                .await?;
            ticket_classes.push(class);
        }

        tx.commit().await?;
        Ok(ConcertWithClasses {
            concert,
            ticket_classes,
        })
    }

    async fn materialize_seats(
        &self,
        concert_id: i64,
        seats: Vec<NewSeat>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for chunk in seats.chunks(SEAT_BATCH_SIZE) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO seats (concert_id, ticket_class_id, seat_number, status) ");
            builder.push_values(chunk, |mut row, seat| {
                row.push_bind(seat.concert_id)
                    .push_bind(seat.ticket_class_id)
                    .push_bind(seat.seat_number.clone())
                    .push_bind(SeatStatus::Available.as_str());
            });
            builder.push(" ON CONFLICT (concert_id, seat_number) DO NOTHING");
            builder.build().execute(&mut *tx).await?;
        }

        sqlx::query(
            "UPDATE ticket_classes SET available_seats_in_class = total_seats_in_class, updated_at = NOW() \
             WHERE concert_id = $1",
        )
        .bind(concert_id)
        .execute(&mut *tx)
        .await?;

        let activated = sqlx::query("UPDATE concerts SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(concert_id)
            .bind(ConcertStatus::Active.as_str())
            .execute(&mut *tx)
            .await?;
        if activated.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("concert {concert_id}")));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn set_concert_status(
        &self,
        concert_id: i64,
        status: ConcertStatus,
    ) -> Result<(), StoreError> {
        let updated = sqlx::query("UPDATE concerts SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(concert_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("concert {concert_id}")));
        }
        Ok(())
    }
}
