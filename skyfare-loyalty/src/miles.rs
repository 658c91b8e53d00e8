use skyfare_shared::CabinClass;

/// Deterministic mile accrual for a flight purchase.
///
/// With a known distance the award is distance-based:
/// economy 1.0, business 1.5, first 2.0 miles per km.
/// Without one it falls back to price-based accrual:
/// economy 10%, business 15%, first 20% of the fare.
/// Both paths floor the result.
pub fn calculate_flight_miles(price: i64, cabin: CabinClass, distance_km: Option<f64>) -> i64 {
    if let Some(distance) = distance_km {
        let multiplier = match cabin {
            CabinClass::Economy => 1.0,
            CabinClass::Business => 1.5,
            CabinClass::First => 2.0,
        };
        return (distance * multiplier).floor() as i64;
    }

    let rate = match cabin {
        CabinClass::Economy => 0.10,
        CabinClass::Business => 0.15,
        CabinClass::First => 0.20,
    };
    (price as f64 * rate).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_based_accrual() {
        assert_eq!(calculate_flight_miles(1000, CabinClass::Economy, None), 100);
        assert_eq!(calculate_flight_miles(1000, CabinClass::Business, None), 150);
        assert_eq!(calculate_flight_miles(1000, CabinClass::First, None), 200);
        // Flooring, not rounding.
        assert_eq!(calculate_flight_miles(999, CabinClass::Economy, None), 99);
    }

    #[test]
    fn test_distance_based_accrual() {
        assert_eq!(calculate_flight_miles(1000, CabinClass::Economy, Some(2500.0)), 2500);
        assert_eq!(calculate_flight_miles(1000, CabinClass::Business, Some(2500.0)), 3750);
        assert_eq!(calculate_flight_miles(1000, CabinClass::First, Some(2500.5)), 5001);
    }

    #[test]
    fn test_pure_and_monotonic() {
        let a = calculate_flight_miles(1234, CabinClass::Business, Some(812.7));
        let b = calculate_flight_miles(1234, CabinClass::Business, Some(812.7));
        assert_eq!(a, b);

        let mut last = 0;
        for price in [0i64, 10, 100, 1_000, 10_000, 100_000] {
            let miles = calculate_flight_miles(price, CabinClass::Economy, None);
            assert!(miles >= last);
            last = miles;
        }

        let mut last = 0;
        for distance in [0.0f64, 50.0, 500.0, 5_000.0] {
            let miles = calculate_flight_miles(0, CabinClass::Economy, Some(distance));
            assert!(miles >= last);
            last = miles;
        }
    }
}
