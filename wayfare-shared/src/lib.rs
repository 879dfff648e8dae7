pub mod models;
pub mod pii;

pub use models::booking::{
    BookingRecord, BookingStatus, CachedBooking, CreateBookingRequest, FlightSegment,
    PassengerCounts, PassengerForm, PassengerRecord, PassengerType, PassengerUpdate,
    UpdateBookingRequest,
};
pub use models::events::{SeatSnapshot, StreamMessage};
pub use models::flight::{
    parse_timestamp, Airline, Airport, CabinClass, Flight, FlightStatus, SearchResults, TripType,
};
pub use models::user::{AppUser, PaymentMethod, UserProfile};
pub use pii::Masked;
