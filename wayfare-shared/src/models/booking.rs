use serde::{Deserialize, Serialize};

use super::flight::{CabinClass, Flight};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PassengerType {
    Adult,
    Child,
    Infant,
}

/// Passenger headcount chosen on the search form
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PassengerCounts {
    pub adult: u32,
    pub child: u32,
    pub infant: u32,
}

impl Default for PassengerCounts {
    fn default() -> Self {
        Self { adult: 1, child: 0, infant: 0 }
    }
}

impl PassengerCounts {
    pub fn total(&self) -> u32 {
        self.adult + self.child + self.infant
    }

    /// Passengers occupying a seat (infants travel on a lap).
    pub fn seated(&self) -> u32 {
        self.adult + self.child
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PassengerForm {
    pub first_name: String,
    pub last_name: String,
    pub nationality: String,
    #[serde(rename = "type")]
    pub passenger_type: PassengerType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub flight_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_flight_id: Option<String>,
    pub passengers: Vec<PassengerForm>,
    pub cabin_class: CabinClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method_id: Option<String>,
    pub total_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassengerUpdate {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub nationality: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookingRequest {
    pub id: String,
    pub passengers: Vec<PassengerUpdate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PassengerRecord {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub passport_number: Option<String>,
    #[serde(default)]
    pub passport_expiry: Option<String>,
    pub passenger_type: PassengerType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlightSegment {
    pub id: String,
    #[serde(default)]
    pub booking_id: String,
    pub flight_id: String,
    pub cabin_class: CabinClass,
    pub fare_amount: f64,
    #[serde(default)]
    pub is_return: bool,
    #[serde(default)]
    pub flight: Option<Flight>,
}

/// A booking as the backend returns it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub total_amount: f64,
    pub status: String,
    #[serde(default)]
    pub booking_date: String,
    #[serde(default)]
    pub payment_status: String,
    #[serde(default)]
    pub ticket_url: Option<String>,
    #[serde(default)]
    pub flights: Vec<FlightSegment>,
    #[serde(default)]
    pub passengers: Vec<PassengerRecord>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

/// Compact booking kept in the local bookings cache
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CachedBooking {
    pub id: String,
    pub flight_number: String,
    pub from: String,
    pub to: String,
    pub departure_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date: Option<String>,
    pub passengers: PassengerCounts,
    pub cabin_class: CabinClass,
    pub status: BookingStatus,
    pub price: f64,
    pub booking_date: String,
}

impl CachedBooking {
    pub fn is_active(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_booking_wire_format() {
        let req = CreateBookingRequest {
            flight_id: "F1".to_string(),
            return_flight_id: None,
            passengers: vec![PassengerForm {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                nationality: "GB".to_string(),
                passenger_type: PassengerType::Adult,
            }],
            cabin_class: CabinClass::PremiumEconomy,
            payment_method_id: Some("pm_1".to_string()),
            total_amount: 630.0,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["flightId"], "F1");
        assert_eq!(value["cabinClass"], "PREMIUM_ECONOMY");
        assert_eq!(value["passengers"][0]["type"], "ADULT");
        assert!(value.get("returnFlightId").is_none());
    }

    #[test]
    fn test_booking_record_minimal_payload() {
        let json = r#"{ "id": "b1", "totalAmount": 420.5, "status": "CONFIRMED" }"#;
        let booking: BookingRecord = serde_json::from_str(json).unwrap();
        assert_eq!(booking.id, "b1");
        assert!(booking.flights.is_empty());
        assert!(booking.ticket_url.is_none());
    }
}
