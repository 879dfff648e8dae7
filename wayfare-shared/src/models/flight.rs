use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fare and capacity tier on a flight
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CabinClass {
    #[default]
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl CabinClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CabinClass::Economy => "ECONOMY",
            CabinClass::PremiumEconomy => "PREMIUM_ECONOMY",
            CabinClass::Business => "BUSINESS",
            CabinClass::First => "FIRST",
        }
    }
}

impl fmt::Display for CabinClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CabinClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "economy" => Ok(CabinClass::Economy),
            "premium" | "premium_economy" => Ok(CabinClass::PremiumEconomy),
            "business" => Ok(CabinClass::Business),
            "first" => Ok(CabinClass::First),
            other => Err(format!("unknown cabin class: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightStatus {
    #[default]
    Scheduled,
    Delayed,
    Departed,
    InAir,
    Landed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TripType {
    #[default]
    OneWay,
    RoundTrip,
}

impl FromStr for TripType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "oneway" => Ok(TripType::OneWay),
            "roundtrip" => Ok(TripType::RoundTrip),
            other => Err(format!("unknown trip type: {}", other)),
        }
    }
}

impl fmt::Display for TripType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TripType::OneWay => f.write_str("oneWay"),
            TripType::RoundTrip => f.write_str("roundTrip"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Airport {
    pub id: String,
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Airline {
    pub id: String,
    pub code: String,
    #[serde(default)]
    pub name: String,
}

/// A single scheduled segment as returned by the search API.
///
/// Timestamps are kept as the raw strings the backend sent so that a
/// malformed value degrades to "fails every time bound" instead of failing
/// the whole search response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Flight {
    pub id: String,
    #[serde(default)]
    pub flight_number: String,
    #[serde(default)]
    pub airline_id: String,
    #[serde(default)]
    pub departure_airport_id: String,
    #[serde(default)]
    pub arrival_airport_id: String,
    pub departure_time: String,
    pub arrival_time: String,

    #[serde(default)]
    pub economy_capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub premium_economy_capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_class_capacity: Option<u32>,

    #[serde(default)]
    pub economy_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub premium_economy_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_class_price: Option<f64>,

    #[serde(default)]
    pub status: FlightStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub airline: Option<Airline>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_airport: Option<Airport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival_airport: Option<Airport>,
}

impl Flight {
    pub fn departure_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.departure_time)
    }

    pub fn arrival_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.arrival_time)
    }

    /// Scheduled block time in milliseconds, if both timestamps parse.
    pub fn duration_ms(&self) -> Option<i64> {
        Some((self.arrival_at()? - self.departure_at()?).num_milliseconds())
    }

    /// Explicit fare for a cabin, without any estimate.
    pub fn listed_price(&self, cabin: CabinClass) -> Option<f64> {
        match cabin {
            CabinClass::Economy => self.economy_price,
            CabinClass::PremiumEconomy => self.premium_economy_price,
            CabinClass::Business => self.business_price,
            CabinClass::First => self.first_class_price,
        }
    }

    pub fn capacity(&self, cabin: CabinClass) -> Option<u32> {
        match cabin {
            CabinClass::Economy => self.economy_capacity,
            CabinClass::PremiumEconomy => self.premium_economy_capacity,
            CabinClass::Business => self.business_capacity,
            CabinClass::First => self.first_class_capacity,
        }
    }

    /// "JFK → LHR" style label, falling back to airport ids.
    pub fn route_label(&self) -> String {
        let from = self
            .departure_airport
            .as_ref()
            .map(|a| a.code.as_str())
            .unwrap_or(self.departure_airport_id.as_str());
        let to = self
            .arrival_airport
            .as_ref()
            .map(|a| a.code.as_str())
            .unwrap_or(self.arrival_airport_id.as_str());
        format!("{} → {}", from, to)
    }
}

/// Outbound and return legs of one search response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    #[serde(default)]
    pub outbound_flights: Vec<Flight>,
    #[serde(default)]
    pub return_flights: Vec<Flight>,
}

impl SearchResults {
    pub fn is_round_trip(&self) -> bool {
        !self.return_flights.is_empty()
    }
}

/// Parses an ISO-8601 timestamp. Offsets are honoured; a timestamp without
/// an offset is read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .ok()
        .map(|naive| naive.and_utc())
}
