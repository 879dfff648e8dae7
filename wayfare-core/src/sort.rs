use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use wayfare_shared::{CabinClass, Flight};

use crate::pricing::resolve_price;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Price,
    Departure,
    Duration,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "price" => Ok(SortKey::Price),
            "departure" | "departure-time" => Ok(SortKey::Departure),
            "duration" => Ok(SortKey::Duration),
            other => Err(format!("unknown sort key: {}", other)),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::Price => f.write_str("price"),
            SortKey::Departure => f.write_str("departure"),
            SortKey::Duration => f.write_str("duration"),
        }
    }
}

impl SortKey {
    pub fn compare(&self, a: &Flight, b: &Flight, cabin: CabinClass) -> Ordering {
        match self {
            SortKey::Price => resolve_price(a, cabin).total_cmp(&resolve_price(b, cabin)),
            SortKey::Departure => missing_last(a.departure_at(), b.departure_at()),
            SortKey::Duration => missing_last(a.duration_ms(), b.duration_ms()),
        }
    }
}

// Unparsable timestamps sort after every parsable one.
fn missing_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Ascending, stable: flights with equal keys keep their input order.
pub fn sort_flights(flights: &mut [Flight], key: SortKey, cabin: CabinClass) {
    flights.sort_by(|a, b| key.compare(a, b, cabin));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flight(id: &str, price: f64, dep: &str, arr: &str) -> Flight {
        Flight {
            id: id.to_string(),
            departure_time: dep.to_string(),
            arrival_time: arr.to_string(),
            economy_capacity: Some(100),
            economy_price: Some(price),
            ..Default::default()
        }
    }

    fn ids(flights: &[Flight]) -> Vec<&str> {
        flights.iter().map(|f| f.id.as_str()).collect()
    }

    #[test]
    fn test_price_and_departure_orders() {
        let mut flights = vec![
            flight("A", 300.0, "2024-12-25T10:00:00Z", "2024-12-25T12:00:00Z"),
            flight("B", 100.0, "2024-12-25T14:00:00Z", "2024-12-25T16:00:00Z"),
        ];
        sort_flights(&mut flights, SortKey::Price, CabinClass::Economy);
        assert_eq!(ids(&flights), vec!["B", "A"]);

        sort_flights(&mut flights, SortKey::Departure, CabinClass::Economy);
        assert_eq!(ids(&flights), vec!["A", "B"]);
    }

    #[test]
    fn test_duration_order() {
        let mut flights = vec![
            flight("LONG", 1.0, "2024-12-25T10:00:00Z", "2024-12-25T20:00:00Z"),
            flight("SHORT", 1.0, "2024-12-25T11:00:00Z", "2024-12-25T12:15:00Z"),
            flight("MID", 1.0, "2024-12-25T09:00:00Z", "2024-12-25T13:00:00Z"),
        ];
        sort_flights(&mut flights, SortKey::Duration, CabinClass::Economy);
        assert_eq!(ids(&flights), vec!["SHORT", "MID", "LONG"]);
    }

    #[test]
    fn test_price_sort_is_stable_and_idempotent() {
        let mut flights = vec![
            flight("A", 200.0, "2024-12-25T10:00:00Z", "2024-12-25T12:00:00Z"),
            flight("B", 100.0, "2024-12-25T11:00:00Z", "2024-12-25T12:00:00Z"),
            flight("C", 200.0, "2024-12-25T08:00:00Z", "2024-12-25T12:00:00Z"),
            flight("D", 100.0, "2024-12-25T07:00:00Z", "2024-12-25T12:00:00Z"),
        ];
        sort_flights(&mut flights, SortKey::Price, CabinClass::Economy);
        assert_eq!(ids(&flights), vec!["B", "D", "A", "C"]);

        let once = flights.clone();
        sort_flights(&mut flights, SortKey::Price, CabinClass::Economy);
        assert_eq!(flights, once);
    }

    #[test]
    fn test_price_sort_uses_cabin() {
        let mut cheap_economy = flight("A", 100.0, "2024-12-25T10:00:00Z", "2024-12-25T12:00:00Z");
        cheap_economy.first_class_price = Some(2000.0);
        let pricier_economy = flight("B", 300.0, "2024-12-25T10:00:00Z", "2024-12-25T12:00:00Z");

        let mut flights = vec![cheap_economy, pricier_economy];
        // B resolves to 300 * 4 = 1200 in first
        sort_flights(&mut flights, SortKey::Price, CabinClass::First);
        assert_eq!(ids(&flights), vec!["B", "A"]);
    }

    #[test]
    fn test_unparsable_departure_sorts_last() {
        let mut flights = vec![
            flight("BROKEN", 1.0, "soon", "later"),
            flight("LATE", 1.0, "2024-12-25T22:00:00Z", "2024-12-25T23:00:00Z"),
            flight("EARLY", 1.0, "2024-12-25T06:00:00Z", "2024-12-25T07:00:00Z"),
        ];
        sort_flights(&mut flights, SortKey::Departure, CabinClass::Economy);
        assert_eq!(ids(&flights), vec!["EARLY", "LATE", "BROKEN"]);
    }

    #[test]
    fn test_sort_key_parsing() {
        assert_eq!("Departure".parse::<SortKey>().unwrap(), SortKey::Departure);
        assert_eq!(serde_json::to_string(&SortKey::Duration).unwrap(), "\"duration\"");
        assert!("fastest".parse::<SortKey>().is_err());
    }
}
