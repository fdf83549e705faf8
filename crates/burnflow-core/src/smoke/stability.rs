/// Pasquill-Gifford stability classification.
///
/// Class is determined by surface wind, insolation (proxied by cloud cover
/// and local hour of day), and day/night. Where the classic table lists a
/// pair (A-B, B-C, C-D), the later class is used.
use crate::domain::StabilityClass;

/// Local hours treated as daytime for insolation purposes.
const DAY_START_HOUR: u32 = 6;
const DAY_END_HOUR: u32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Insolation {
    /// Day, cloud cover < 25%.
    Strong,
    /// Day, 25-50%.
    Moderate,
    /// Day, > 50%.
    Slight,
    /// Night, cloud cover < 50%.
    NightClear,
    NightCloudy,
}

fn insolation(cloud_cover_pct: f64, hour_of_day: u32) -> Insolation {
    let is_day = (DAY_START_HOUR..DAY_END_HOUR).contains(&hour_of_day);
    if is_day {
        if cloud_cover_pct < 25.0 {
            Insolation::Strong
        } else if cloud_cover_pct <= 50.0 {
            Insolation::Moderate
        } else {
            Insolation::Slight
        }
    } else if cloud_cover_pct < 50.0 {
        Insolation::NightClear
    } else {
        Insolation::NightCloudy
    }
}

/// Classify stability from wind speed (mph), cloud cover, and local hour.
///
/// Zero, negative, or non-finite wind defaults to neutral D.
pub fn classify_stability(
    wind_speed_mph: f64,
    cloud_cover_pct: f64,
    hour_of_day: u32,
) -> StabilityClass {
    use StabilityClass::*;

    if !wind_speed_mph.is_finite() || wind_speed_mph <= 0.0 {
        return D;
    }

    let sun = insolation(cloud_cover_pct, hour_of_day);

    // Rows: wind bands. Ambiguous pairs already resolved to the later class.
    if wind_speed_mph < 2.0 {
        match sun {
            Insolation::Strong => A,
            Insolation::Moderate => B, // A-B
            Insolation::Slight => B,
            Insolation::NightClear | Insolation::NightCloudy => F,
        }
    } else if wind_speed_mph < 3.0 {
        match sun {
            Insolation::Strong => B, // A-B
            Insolation::Moderate => B,
            Insolation::Slight => C,
            Insolation::NightClear => F,
            Insolation::NightCloudy => E,
        }
    } else if wind_speed_mph < 5.0 {
        match sun {
            Insolation::Strong => B,
            Insolation::Moderate => C, // B-C
            Insolation::Slight => C,
            Insolation::NightClear => E,
            Insolation::NightCloudy => D,
        }
    } else if wind_speed_mph < 6.0 {
        match sun {
            Insolation::Strong => C,
            Insolation::Moderate => D, // C-D
            Insolation::Slight => D,
            Insolation::NightClear | Insolation::NightCloudy => D,
        }
    } else {
        match sun {
            Insolation::Strong => C,
            Insolation::Moderate | Insolation::Slight => D,
            Insolation::NightClear | Insolation::NightCloudy => D,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use StabilityClass::*;

    #[rstest]
    #[case(1.0, 10.0, 12, A)] // calm, strong sun
    #[case(1.0, 40.0, 12, B)] // calm, moderate sun: A-B resolves to B
    #[case(2.5, 10.0, 12, B)] // A-B resolves to B
    #[case(4.0, 40.0, 12, C)] // B-C resolves to C
    #[case(4.0, 80.0, 12, C)]
    #[case(5.5, 40.0, 12, D)] // C-D resolves to D
    #[case(8.0, 10.0, 12, C)]
    #[case(8.0, 40.0, 12, D)]
    fn test_daytime_classes(
        #[case] wind: f64,
        #[case] cloud: f64,
        #[case] hour: u32,
        #[case] expected: StabilityClass,
    ) {
        assert_eq!(classify_stability(wind, cloud, hour), expected);
    }

    #[rstest]
    #[case(1.0, 10.0, 2, F)] // clear night, calm
    #[case(2.5, 80.0, 2, E)] // cloudy night
    #[case(4.0, 10.0, 23, E)]
    #[case(4.0, 80.0, 23, D)]
    #[case(8.0, 10.0, 2, D)]
    fn test_night_classes(
        #[case] wind: f64,
        #[case] cloud: f64,
        #[case] hour: u32,
        #[case] expected: StabilityClass,
    ) {
        assert_eq!(classify_stability(wind, cloud, hour), expected);
    }

    #[test]
    fn test_degenerate_wind_defaults_to_neutral() {
        assert_eq!(classify_stability(0.0, 10.0, 12), D);
        assert_eq!(classify_stability(-3.0, 10.0, 12), D);
        assert_eq!(classify_stability(f64::NAN, 10.0, 12), D);
    }

    #[test]
    fn test_result_is_always_a_valid_class() {
        for wind in [0.0, 1.0, 2.0, 3.0, 5.0, 6.0, 12.0] {
            for cloud in [0.0, 30.0, 60.0, 100.0] {
                for hour in [0, 6, 12, 18, 23] {
                    let class = classify_stability(wind, cloud, hour);
                    assert!(class.index() < 6);
                }
            }
        }
    }
}
