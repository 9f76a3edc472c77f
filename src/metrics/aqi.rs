//! US EPA Air Quality Index from particulate concentrations.

/// (concentration low, concentration high, index low, index high)
type Breakpoint = (f64, f64, f64, f64);

const PM25_BREAKPOINTS: [Breakpoint; 7] = [
    (0.0, 12.0, 0.0, 50.0),
    (12.1, 35.4, 51.0, 100.0),
    (35.5, 55.4, 101.0, 150.0),
    (55.5, 150.4, 151.0, 200.0),
    (150.5, 250.4, 201.0, 300.0),
    (250.5, 350.4, 301.0, 400.0),
    (350.5, 500.4, 401.0, 500.0),
];

const PM10_BREAKPOINTS: [Breakpoint; 7] = [
    (0.0, 54.0, 0.0, 50.0),
    (55.0, 154.0, 51.0, 100.0),
    (155.0, 254.0, 101.0, 150.0),
    (255.0, 354.0, 151.0, 200.0),
    (355.0, 424.0, 201.0, 300.0),
    (425.0, 504.0, 301.0, 400.0),
    (505.0, 604.0, 401.0, 500.0),
];

/// Highest index the scale defines.
pub const AQI_MAX: i64 = 500;

fn index_for(concentration: f64, table: &[Breakpoint]) -> i64 {
    if concentration <= 0.0 {
        return 0;
    }
    table
        .iter()
        .find(|(c_lo, c_hi, _, _)| concentration >= *c_lo && concentration <= *c_hi)
        .map(|(c_lo, c_hi, i_lo, i_hi)| {
            ((i_hi - i_lo) / (c_hi - c_lo) * (concentration - c_lo) + i_lo).round() as i64
        })
        .unwrap_or(AQI_MAX)
}

/// PM2.5 sub-index; the concentration is truncated to 0.1 µg/m³.
pub fn pm25_index(pm25: f64) -> i64 {
    index_for((pm25 * 10.0).floor() / 10.0, &PM25_BREAKPOINTS)
}

/// PM10 sub-index; the concentration is truncated to 1 µg/m³.
pub fn pm10_index(pm10: f64) -> i64 {
    index_for(pm10.floor(), &PM10_BREAKPOINTS)
}

/// Overall AQI: the worse of the PM2.5 and PM10 sub-indices.
pub fn us_epa(pm25: f64, pm10: f64) -> i64 {
    pm25_index(pm25).max(pm10_index(pm10))
}
