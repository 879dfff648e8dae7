use chrono::Utc;
use tracing::info;
use wayfare_core::resolve_price;
use wayfare_results::Itinerary;
use wayfare_shared::{
    BookingRecord, BookingStatus, CabinClass, CachedBooking, CreateBookingRequest, PassengerCounts,
    PassengerForm, PassengerType, UpdateBookingRequest,
};

use crate::client::{ApiClient, ApiRequest};
use crate::error::{ApiError, ApiResult};

/// Fare for the whole party. Infants travel on a lap and are not charged.
pub fn quote_total(itinerary: &Itinerary, cabin: CabinClass, passengers: &PassengerCounts) -> f64 {
    let per_seat = resolve_price(&itinerary.outbound, cabin)
        + itinerary.inbound.as_ref().map_or(0.0, |f| resolve_price(f, cabin));
    per_seat * passengers.seated() as f64
}

pub fn booking_request(
    itinerary: &Itinerary,
    cabin: CabinClass,
    passengers: Vec<PassengerForm>,
    counts: &PassengerCounts,
    payment_method_id: Option<String>,
) -> ApiResult<CreateBookingRequest> {
    if passengers.is_empty() {
        return Err(ApiError::Validation("at least one passenger is required".into()));
    }
    if passengers.len() as u32 != counts.total() {
        return Err(ApiError::Validation(format!(
            "expected {} passengers, got {}",
            counts.total(),
            passengers.len()
        )));
    }
    if let Some(p) = passengers
        .iter()
        .find(|p| p.first_name.trim().is_empty() || p.last_name.trim().is_empty())
    {
        return Err(ApiError::Validation(format!("passenger name incomplete: {:?}", p.first_name)));
    }

    Ok(CreateBookingRequest {
        flight_id: itinerary.outbound.id.clone(),
        return_flight_id: itinerary.inbound.as_ref().map(|f| f.id.clone()),
        passengers,
        cabin_class: cabin,
        payment_method_id,
        total_amount: quote_total(itinerary, cabin, counts),
    })
}

pub async fn list_bookings(client: &ApiClient) -> ApiResult<Vec<BookingRecord>> {
    client.execute(&ApiRequest::get("/bookings")).await
}

pub async fn get_booking(client: &ApiClient, id: &str) -> ApiResult<BookingRecord> {
    client.execute(&ApiRequest::get("/bookings").segment(id)).await
}

pub async fn create_booking(client: &ApiClient, request: &CreateBookingRequest) -> ApiResult<BookingRecord> {
    if request.passengers.is_empty() {
        return Err(ApiError::Validation("at least one passenger is required".into()));
    }
    let booking: BookingRecord = client.execute(&ApiRequest::post("/bookings").json(request)?).await?;
    info!(booking_id = %booking.id, "Booking created");
    Ok(booking)
}

pub async fn update_booking(client: &ApiClient, request: &UpdateBookingRequest) -> ApiResult<BookingRecord> {
    if request.passengers.is_empty() {
        return Err(ApiError::Validation("at least one passenger is required".into()));
    }
    client
        .execute(&ApiRequest::put("/bookings").segment(request.id.as_str()).json(request)?)
        .await
}

pub async fn cancel_booking(client: &ApiClient, id: &str) -> ApiResult<()> {
    client.execute_empty(&ApiRequest::delete("/bookings").segment(id)).await?;
    info!(booking_id = %id, "Booking cancelled");
    Ok(())
}

/// Compact cache entry for a backend booking. `None` when the booking has no
/// outbound segment with flight details.
pub fn cache_entry(record: &BookingRecord) -> Option<CachedBooking> {
    let outbound = record.flights.iter().find(|s| !s.is_return)?;
    let flight = outbound.flight.as_ref()?;
    let inbound = record
        .flights
        .iter()
        .find(|s| s.is_return)
        .and_then(|s| s.flight.as_ref());

    let mut passengers = PassengerCounts { adult: 0, child: 0, infant: 0 };
    for p in &record.passengers {
        match p.passenger_type {
            PassengerType::Adult => passengers.adult += 1,
            PassengerType::Child => passengers.child += 1,
            PassengerType::Infant => passengers.infant += 1,
        }
    }

    let status = if record.status.eq_ignore_ascii_case("cancelled") {
        BookingStatus::Cancelled
    } else {
        BookingStatus::Confirmed
    };
    let booking_date = if record.booking_date.is_empty() {
        Utc::now().to_rfc3339()
    } else {
        record.booking_date.clone()
    };

    Some(CachedBooking {
        id: record.id.clone(),
        flight_number: flight.flight_number.clone(),
        from: flight.departure_airport_id.clone(),
        to: flight.arrival_airport_id.clone(),
        departure_date: flight.departure_time.clone(),
        return_date: inbound.map(|f| f.departure_time.clone()),
        passengers,
        cabin_class: outbound.cabin_class,
        status,
        price: record.total_amount,
        booking_date,
    })
}
