pub mod bookings;
pub mod cli;
pub mod client;
pub mod error;
pub mod flights;
pub mod payments;
pub mod seats;
pub mod users;

pub use client::{ApiClient, ApiRequest};
pub use error::{ApiError, ApiResult};
pub use flights::{search_flights, FlightSearchQuery};
pub use seats::{HttpSeatSource, SeatEvent, SeatFeed, SeatTracker, StreamError, StreamState};
pub use users::BackendIdentitySync;
