use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wayfare_shared::{CabinClass, Flight};

use crate::pricing::resolve_price;
use crate::{CoreError, CoreResult};

/// Inclusive timestamp window
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// An unparsable timestamp never falls inside a range.
    pub fn contains(&self, at: Option<DateTime<Utc>>) -> bool {
        match at {
            Some(at) => self.start <= at && at <= self.end,
            None => false,
        }
    }
}

/// User-chosen bounds on the result list. Every field is optional and an
/// absent field places no constraint on its dimension.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_time_range: Option<TimeRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival_time_range: Option<TimeRange>,
    /// Minutes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration: Option<u32>,
    /// Cabin used to resolve prices for the price bounds (economy when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cabin_class: Option<CabinClass>,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        *self == FilterCriteria::default()
    }

    pub fn price_cabin(&self) -> CabinClass {
        self.cabin_class.unwrap_or(CabinClass::Economy)
    }

    /// Form-level checks run before criteria are handed to the engine.
    pub fn validate(&self) -> CoreResult<()> {
        for (name, bound) in [("minPrice", self.min_price), ("maxPrice", self.max_price)] {
            if let Some(value) = bound {
                if !value.is_finite() || value < 0.0 {
                    return Err(CoreError::ValidationError(format!(
                        "{} must be a non-negative number",
                        name
                    )));
                }
            }
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(CoreError::ValidationError(format!(
                    "minPrice {} exceeds maxPrice {}",
                    min, max
                )));
            }
        }
        for (name, range) in [
            ("departureTimeRange", self.departure_time_range),
            ("arrivalTimeRange", self.arrival_time_range),
        ] {
            if let Some(range) = range {
                if range.start > range.end {
                    return Err(CoreError::ValidationError(format!(
                        "{} starts after it ends",
                        name
                    )));
                }
            }
        }
        Ok(())
    }

    /// True iff the flight satisfies every bound that is set.
    pub fn matches(&self, flight: &Flight) -> bool {
        let price = resolve_price(flight, self.price_cabin());

        if let Some(min) = self.min_price {
            if price < min {
                return false;
            }
        }
        if let Some(max) = self.max_price {
            if price > max {
                return false;
            }
        }

        if let Some(range) = &self.departure_time_range {
            if !range.contains(flight.departure_at()) {
                return false;
            }
        }
        if let Some(range) = &self.arrival_time_range {
            if !range.contains(flight.arrival_at()) {
                return false;
            }
        }

        if let Some(max_minutes) = self.max_duration {
            match flight.duration_ms() {
                Some(ms) => {
                    if ms as f64 / 60_000.0 > max_minutes as f64 {
                        return false;
                    }
                }
                None => return false,
            }
        }

        true
    }

    pub fn apply(&self, flights: &[Flight]) -> Vec<Flight> {
        flights.iter().filter(|f| self.matches(f)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn flight(id: &str, dep: &str, arr: &str, economy: f64) -> Flight {
        Flight {
            id: id.to_string(),
            departure_time: dep.to_string(),
            arrival_time: arr.to_string(),
            economy_capacity: Some(100),
            economy_price: Some(economy),
            ..Default::default()
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 25, h, m, 0).unwrap()
    }

    #[test]
    fn test_empty_criteria_accepts_everything() {
        let criteria = FilterCriteria::default();
        assert!(criteria.is_empty());
        assert!(criteria.matches(&flight("F1", "2024-12-25T10:00:00Z", "2024-12-25T12:00:00Z", 100.0)));
        assert!(criteria.matches(&flight("F2", "garbage", "garbage", 0.0)));
    }

    #[test]
    fn test_max_duration_excludes_long_flights() {
        let criteria = FilterCriteria { max_duration: Some(120), ..Default::default() };
        let long = flight("F1", "2024-12-25T10:00:00Z", "2024-12-25T12:30:00Z", 10.0);
        let exact = flight("F2", "2024-12-25T10:00:00Z", "2024-12-25T12:00:00Z", 9999.0);
        assert!(!criteria.matches(&long));
        assert!(criteria.matches(&exact));
    }

    #[test]
    fn test_price_bounds_use_filter_cabin() {
        let f = flight("F1", "2024-12-25T10:00:00Z", "2024-12-25T12:00:00Z", 100.0);
        let economy = FilterCriteria { max_price: Some(200.0), ..Default::default() };
        assert!(economy.matches(&f));

        let business = FilterCriteria {
            max_price: Some(200.0),
            cabin_class: Some(CabinClass::Business),
            ..Default::default()
        };
        // 100 * 2.5
        assert!(!business.matches(&f));

        let min = FilterCriteria { min_price: Some(100.0), ..Default::default() };
        assert!(min.matches(&f));
        let min = FilterCriteria { min_price: Some(100.01), ..Default::default() };
        assert!(!min.matches(&f));
    }

    #[test]
    fn test_time_ranges_are_inclusive() {
        let f = flight("F1", "2024-12-25T10:00:00Z", "2024-12-25T12:00:00Z", 100.0);
        let criteria = FilterCriteria {
            departure_time_range: Some(TimeRange::new(at(10, 0), at(11, 0))),
            arrival_time_range: Some(TimeRange::new(at(11, 0), at(12, 0))),
            ..Default::default()
        };
        assert!(criteria.matches(&f));

        let late = FilterCriteria {
            departure_time_range: Some(TimeRange::new(at(10, 1), at(18, 0))),
            ..Default::default()
        };
        assert!(!late.matches(&f));
    }

    #[test]
    fn test_malformed_timestamps_fail_time_bounds() {
        let broken = flight("F1", "25/12/2024 10:00", "2024-12-25T12:00:00Z", 100.0);
        let by_departure = FilterCriteria {
            departure_time_range: Some(TimeRange::new(at(0, 0), at(23, 59))),
            ..Default::default()
        };
        assert!(!by_departure.matches(&broken));

        let by_duration = FilterCriteria { max_duration: Some(10_000), ..Default::default() };
        assert!(!by_duration.matches(&broken));

        // A bound on another dimension is unaffected
        let by_arrival = FilterCriteria {
            arrival_time_range: Some(TimeRange::new(at(0, 0), at(23, 59))),
            ..Default::default()
        };
        assert!(by_arrival.matches(&broken));
    }

    #[test]
    fn test_validate() {
        assert!(FilterCriteria::default().validate().is_ok());
        let inverted = FilterCriteria { min_price: Some(500.0), max_price: Some(100.0), ..Default::default() };
        assert!(matches!(inverted.validate(), Err(CoreError::ValidationError(_))));
        let negative = FilterCriteria { max_price: Some(-1.0), ..Default::default() };
        assert!(negative.validate().is_err());
        let backwards = FilterCriteria {
            arrival_time_range: Some(TimeRange::new(at(12, 0), at(11, 0))),
            ..Default::default()
        };
        assert!(backwards.validate().is_err());
    }

    #[test]
    fn test_wire_format() {
        let json = r#"{
            "minPrice": 50,
            "departureTimeRange": { "start": "2024-12-25T06:00:00Z", "end": "2024-12-25T12:00:00Z" },
            "maxDuration": 120,
            "cabinClass": "BUSINESS"
        }"#;
        let criteria: FilterCriteria = serde_json::from_str(json).unwrap();
        assert_eq!(criteria.min_price, Some(50.0));
        assert_eq!(criteria.max_price, None);
        assert_eq!(criteria.price_cabin(), CabinClass::Business);
        assert_eq!(criteria.departure_time_range.unwrap().start, at(6, 0));
    }
}
