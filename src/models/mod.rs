pub mod booking;
pub mod buyer;
pub mod concert;
pub mod seat;

pub use booking::{
    Booking, BookingDetails, BookingResponse, BookingStatus, CreateBookingRequest,
    TicketQuantityByClass, UpdateBookingStatusRequest,
};
pub use buyer::{Buyer, BuyerRequest, TicketHolder, TicketHolderRequest};
pub use concert::{
    AvailabilitySource, ClassAvailability, Concert, ConcertAvailability, ConcertResponse,
    ConcertStatus, ConcertWithClasses, CreateConcertRequest, CreateTicketClassRequest,
    SeatCreationMessage, TicketClass, TicketClassMessage,
};
pub use seat::{NewSeat, Seat, SeatResponse, SeatStatus};
