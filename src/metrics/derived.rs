//! Values derived from the raw readings: compensation, trends and the
//! plain-language descriptions shown on the dashboard.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::ops::{Add, Div};

/// Divisor applied to the CPU/sensor temperature gap.
pub const COMPENSATION_FACTOR: f64 = 2.25;
/// CPU temperature samples averaged for compensation.
pub const CPU_SMOOTHING: usize = 5;
/// Pressure samples kept for the trend regression.
pub const PRESSURE_SAMPLES: usize = 1000;

/// Barometer-style description of pressure in hPa.
pub fn describe_pressure(pressure: f64) -> &'static str {
    if pressure < 970.0 {
        "storm"
    } else if pressure < 990.0 {
        "rain"
    } else if pressure < 1010.0 {
        "change"
    } else if pressure < 1030.0 {
        "good"
    } else {
        "dry"
    }
}

/// Comfortable humidity is strictly between 30% and 70%.
pub fn describe_humidity(humidity: f64) -> &'static str {
    if humidity > 30.0 && humidity < 70.0 {
        "good"
    } else {
        "bad"
    }
}

pub fn describe_light(lux: f64) -> &'static str {
    if lux < 50.0 {
        "dark"
    } else if lux < 100.0 {
        "dim"
    } else if lux < 500.0 {
        "light"
    } else {
        "bright"
    }
}

/// AQI category. Exactly 0 and 50 fall between the bands and read as "?".
pub fn describe_aqi(aqi: i64) -> &'static str {
    match aqi {
        i64::MIN..=-1 => "???",
        1..=49 => "Good",
        51..=100 => "OK",
        101..=150 => "Poor",
        151..=200 => "Bad",
        201..=300 => "Very Bad",
        301.. => "XXX",
        _ => "?",
    }
}

/// Background colour for an AQI value; black when off the scale.
pub fn aqi_to_color(aqi: i64) -> [u8; 3] {
    match aqi {
        0..=50 => [0, 128, 0],
        51..=100 => [192, 192, 0],
        101..=150 => [192, 128, 0],
        151..=200 => [192, 0, 0],
        201..=300 => [128, 0, 128],
        301..=500 => [128, 0, 0],
        _ => [0, 0, 0],
    }
}

/// Re-derive relative humidity at the compensated temperature through the dewpoint.
pub fn correct_humidity(humidity: f64, temperature: f64, corrected_temperature: f64) -> f64 {
    let dewpoint = temperature - (100.0 - humidity) / 5.0;
    (100.0 - 5.0 * (corrected_temperature - dewpoint)).min(100.0)
}

/// Format an integer with comma thousands separators.
pub fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        grouped.push('-');
    }
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

/// Removes heat leaking from the Pi's SoC into the board's temperature sensor.
#[derive(Debug, Clone)]
pub struct TemperatureCompensator {
    factor: f64,
    cpu_temps: VecDeque<f64>,
}

impl TemperatureCompensator {
    /// Seed the smoothing window with the first CPU reading.
    pub fn new(initial_cpu: f64) -> Self {
        Self::with_factor(COMPENSATION_FACTOR, CPU_SMOOTHING, initial_cpu)
    }

    pub fn with_factor(factor: f64, smoothing: usize, initial_cpu: f64) -> Self {
        Self {
            factor,
            cpu_temps: std::iter::repeat(initial_cpu).take(smoothing.max(1)).collect(),
        }
    }

    /// Slide the window forward by one CPU reading.
    pub fn push_cpu(&mut self, cpu: f64) {
        self.cpu_temps.pop_front();
        self.cpu_temps.push_back(cpu);
    }

    pub fn average_cpu(&self) -> f64 {
        self.cpu_temps.iter().sum::<f64>() / self.cpu_temps.len() as f64
    }

    pub fn compensate(&self, raw: f64) -> f64 {
        raw - (self.average_cpu() - raw) / self.factor
    }
}

/// Result of feeding one pressure sample to [`PressureTrend`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureAnalysis {
    pub mean: f64,
    pub change_per_hour: f64,
    pub trend: String,
}

/// Least-squares pressure tendency over a sliding window.
#[derive(Debug, Clone)]
pub struct PressureTrend {
    capacity: usize,
    pressures: VecDeque<f64>,
    times: VecDeque<f64>,
    trend: String,
}

impl Default for PressureTrend {
    fn default() -> Self {
        Self::with_capacity(PRESSURE_SAMPLES)
    }
}

impl PressureTrend {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            pressures: VecDeque::with_capacity(capacity + 1),
            times: VecDeque::with_capacity(capacity + 1),
            trend: "-".to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.pressures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pressures.is_empty()
    }

    /// Add a sample taken at `t` (seconds) and report mean, hourly change and
    /// trend arrow. The trend stays "-" until the window has filled; after
    /// that a weak fit (r² ≤ 0.5) keeps the previous arrow.
    pub fn analyse(&mut self, pressure: f64, t: f64) -> PressureAnalysis {
        if self.pressures.len() > self.capacity {
            self.pressures.pop_front();
            self.times.pop_front();
            self.pressures.push_back(pressure);
            self.times.push_back(t);

            let (slope, r_squared) = self.regression();
            let change_per_hour = slope * 3600.0;

            if r_squared > 0.5 {
                let arrow = if change_per_hour > 0.5 {
                    ">"
                } else if change_per_hour < -0.5 {
                    "<"
                } else {
                    "-"
                };
                self.trend = if arrow != "-" && change_per_hour.abs() > 3.0 {
                    arrow.repeat(2)
                } else {
                    arrow.to_string()
                };
            }

            PressureAnalysis {
                mean: self.mean_pressure(),
                change_per_hour,
                trend: self.trend.clone(),
            }
        } else {
            self.pressures.push_back(pressure);
            self.times.push_back(t);
            self.trend = "-".to_string();
            PressureAnalysis {
                mean: self.mean_pressure(),
                change_per_hour: 0.0,
                trend: self.trend.clone(),
            }
        }
    }

    fn mean_pressure(&self) -> f64 {
        self.pressures.iter().sum::<f64>() / self.pressures.len() as f64
    }

    /// Returns (slope per second, r²). Times are centred to keep the sums small.
    fn regression(&self) -> (f64, f64) {
        let n = self.pressures.len() as f64;
        let mean_t = self.times.iter().sum::<f64>() / n;
        let mean_p = self.mean_pressure();

        let (mut sxy, mut sxx) = (0.0, 0.0);
        for (t, p) in self.times.iter().zip(self.pressures.iter()) {
            sxy += (t - mean_t) * (p - mean_p);
            sxx += (t - mean_t).powi(2);
        }
        if sxx == 0.0 {
            return (0.0, 0.0);
        }
        let slope = sxy / sxx;
        let intercept = mean_p - slope * mean_t;

        let residuals: Vec<f64> = self
            .times
            .iter()
            .zip(self.pressures.iter())
            .map(|(t, p)| slope * t + intercept - p)
            .collect();
        let variance = population_variance(self.pressures.iter().copied());
        if variance == 0.0 {
            return (slope, 0.0);
        }
        let r_squared = 1.0 - population_variance(residuals.into_iter()) / variance;
        (slope, r_squared)
    }
}

fn population_variance(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let n = values.clone().count() as f64;
    let mean = values.clone().sum::<f64>() / n;
    values.map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

/// A temperature tagged with its unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Temperature {
    Celsius(f64),
    Fahrenheit(f64),
}

impl Temperature {
    pub fn to_celsius(self) -> Self {
        match self {
            Temperature::Celsius(_) => self,
            Temperature::Fahrenheit(f) => Temperature::Celsius((f - 32.0) * 5.0 / 9.0),
        }
    }

    pub fn to_fahrenheit(self) -> Self {
        match self {
            Temperature::Celsius(c) => Temperature::Fahrenheit(c * 9.0 / 5.0 + 32.0),
            Temperature::Fahrenheit(_) => self,
        }
    }

    pub fn value(self) -> f64 {
        match self {
            Temperature::Celsius(v) | Temperature::Fahrenheit(v) => v,
        }
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Temperature::Celsius(v) => write!(f, "{}°C", v),
            Temperature::Fahrenheit(v) => write!(f, "{}°F", v),
        }
    }
}

/// Sums in the left operand's unit.
impl Add for Temperature {
    type Output = Temperature;

    fn add(self, other: Temperature) -> Temperature {
        match self {
            Temperature::Celsius(v) => Temperature::Celsius(v + other.to_celsius().value()),
            Temperature::Fahrenheit(v) => Temperature::Fahrenheit(v + other.to_fahrenheit().value()),
        }
    }
}

impl Div<f64> for Temperature {
    type Output = Temperature;

    fn div(self, divisor: f64) -> Temperature {
        match self {
            Temperature::Celsius(v) => Temperature::Celsius(v / divisor),
            Temperature::Fahrenheit(v) => Temperature::Fahrenheit(v / divisor),
        }
    }
}
