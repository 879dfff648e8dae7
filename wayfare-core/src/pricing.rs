use wayfare_shared::{CabinClass, Flight};

/// Estimate multipliers applied to the economy fare when a cabin has no
/// listed price of its own.
pub const PREMIUM_ECONOMY_MULTIPLIER: f64 = 1.5;
pub const BUSINESS_MULTIPLIER: f64 = 2.5;
pub const FIRST_MULTIPLIER: f64 = 4.0;

/// Price used for filtering and sorting a flight under a cabin class.
///
/// A listed, non-zero fare wins. Otherwise the economy fare is scaled by the
/// cabin's multiplier; a missing or zero economy fare resolves to `0.0`.
pub fn resolve_price(flight: &Flight, cabin: CabinClass) -> f64 {
    let economy = flight.economy_price.unwrap_or(0.0);
    if let Some(listed) = flight.listed_price(cabin).filter(|p| *p != 0.0) {
        return listed;
    }
    match cabin {
        CabinClass::Economy => economy,
        CabinClass::PremiumEconomy => economy * PREMIUM_ECONOMY_MULTIPLIER,
        CabinClass::Business => economy * BUSINESS_MULTIPLIER,
        CabinClass::First => economy * FIRST_MULTIPLIER,
    }
}

/// Seats offered in a cabin. There is no estimate for capacity.
pub fn resolve_capacity(flight: &Flight, cabin: CabinClass) -> u32 {
    flight.capacity(cabin).unwrap_or(0)
}

/// A cabin counts as offered on a flight only when it has both a price and
/// seats.
pub fn passes_availability_gate(flight: &Flight, cabin: CabinClass) -> bool {
    let price = resolve_price(flight, cabin);
    price.is_finite() && price != 0.0 && resolve_capacity(flight, cabin) > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flight(economy: Option<f64>, business: Option<f64>) -> Flight {
        Flight {
            id: "F1".to_string(),
            departure_time: "2024-12-25T10:00:00Z".to_string(),
            arrival_time: "2024-12-25T12:00:00Z".to_string(),
            economy_capacity: Some(150),
            economy_price: economy,
            business_price: business,
            ..Default::default()
        }
    }

    #[test]
    fn test_listed_price_wins() {
        let f = flight(Some(100.0), Some(900.0));
        assert_eq!(resolve_price(&f, CabinClass::Business), 900.0);
        assert_eq!(resolve_price(&f, CabinClass::Economy), 100.0);
    }

    #[test]
    fn test_multiplier_estimates() {
        let f = flight(Some(100.0), None);
        assert_eq!(resolve_price(&f, CabinClass::PremiumEconomy), 150.0);
        assert_eq!(resolve_price(&f, CabinClass::Business), 250.0);
        assert_eq!(resolve_price(&f, CabinClass::First), 400.0);
    }

    #[test]
    fn test_zero_listed_price_falls_back_to_estimate() {
        let f = flight(Some(100.0), Some(0.0));
        assert_eq!(resolve_price(&f, CabinClass::Business), 250.0);
    }

    #[test]
    fn test_missing_economy_resolves_to_zero() {
        let f = flight(None, None);
        assert_eq!(resolve_price(&f, CabinClass::First), 0.0);
        let f = flight(Some(0.0), None);
        assert_eq!(resolve_price(&f, CabinClass::PremiumEconomy), 0.0);
    }

    #[test]
    fn test_resolved_price_positive_iff_some_fare_is_set() {
        for (economy, business) in [
            (None, None),
            (Some(0.0), None),
            (Some(0.0), Some(0.0)),
            (None, Some(500.0)),
            (Some(80.0), None),
            (Some(80.0), Some(0.0)),
        ] {
            let f = flight(economy, business);
            let expected = business.map_or(false, |p| p != 0.0) || economy.map_or(false, |p| p != 0.0);
            assert_eq!(resolve_price(&f, CabinClass::Business) > 0.0, expected, "{:?}/{:?}", economy, business);
        }
    }

    #[test]
    fn test_availability_gate() {
        let mut f = flight(Some(100.0), Some(900.0));
        assert!(passes_availability_gate(&f, CabinClass::Economy));
        // Business is priced but has no seats
        assert!(!passes_availability_gate(&f, CabinClass::Business));
        f.business_capacity = Some(12);
        assert!(passes_availability_gate(&f, CabinClass::Business));
        f.business_capacity = Some(0);
        assert!(!passes_availability_gate(&f, CabinClass::Business));

        let unpriced = flight(None, None);
        assert!(!passes_availability_gate(&unpriced, CabinClass::Economy));
    }
}
