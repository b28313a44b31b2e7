//! Weather snapshot synthesis.
//!
//! Values follow a latitude band, the season at the capture date, and the
//! local solar hour. The reported condition is derived from the sampled cloud
//! cover and precipitation, so the two always agree.

use crate::config::SeasonBias;
use crate::random::{normal, round_to, SimRng};
use crate::sky::{solar_position, sun_times};
use crate::topology::GeoPoint;
use chrono::{DateTime, Datelike, Duration, DurationRound, Timelike, Utc};
use rand::Rng;
use serde::Serialize;
use std::f64::consts::PI;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherCondition {
    pub id: u16,
    pub main: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherState {
    pub observed_timestamp: DateTime<Utc>,
    /// Degrees Fahrenheit
    pub temperature: f64,
    pub feels_like: f64,
    /// Percent
    pub humidity: u8,
    pub dew_point: f64,
    /// hPa
    pub pressure: f64,
    /// mph
    pub wind_speed: f64,
    pub wind_gust: f64,
    /// Degrees clockwise from north
    pub wind_direction: u16,
    /// Cloud cover percent
    pub clouds: u8,
    /// Meters
    pub visibility: u32,
    pub uvi: f64,
    /// Precipitation over the last hour, mm
    pub precipitation_mm: f64,
    pub conditions: WeatherCondition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sunrise: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sunset: Option<DateTime<Utc>>,
    pub units: String,
}

impl WeatherState {
    pub fn is_precipitating(&self) -> bool {
        self.precipitation_mm > 0.0
    }
}

struct Climate {
    mean_f: f64,
    seasonal_amplitude_f: f64,
    diurnal_amplitude_f: f64,
    cloud_mean: f64,
    wetness: f64,
}

fn climate_for(latitude: f64) -> Climate {
    let abs_lat = latitude.abs();
    if abs_lat < 23.5 {
        Climate {
            mean_f: 79.0,
            seasonal_amplitude_f: 4.0,
            diurnal_amplitude_f: 6.0,
            cloud_mean: 50.0,
            wetness: 0.35,
        }
    } else if abs_lat < 55.0 {
        Climate {
            mean_f: 62.0 - (abs_lat - 23.5) * 0.6,
            seasonal_amplitude_f: 18.0,
            diurnal_amplitude_f: 10.0,
            cloud_mean: 40.0,
            wetness: 0.25,
        }
    } else {
        Climate {
            mean_f: 25.0,
            seasonal_amplitude_f: 28.0,
            diurnal_amplitude_f: 6.0,
            cloud_mean: 60.0,
            wetness: 0.20,
        }
    }
}

/// +1 at the local midsummer, -1 at midwinter.
fn season_factor(ts: DateTime<Utc>, latitude: f64) -> f64 {
    let northern = -(2.0 * PI * (ts.ordinal() as f64 - 15.0) / 365.25).cos();
    if latitude >= 0.0 {
        northern
    } else {
        -northern
    }
}

fn local_solar_hour(ts: DateTime<Utc>, location: GeoPoint) -> f64 {
    let utc_hour = ts.hour() as f64 + ts.minute() as f64 / 60.0;
    (utc_hour + location.lon / 15.0).rem_euclid(24.0)
}

fn condition(id: u16, main: &str, description: &str, icon: &str, daylight: bool) -> WeatherCondition {
    WeatherCondition {
        id,
        main: main.to_string(),
        description: description.to_string(),
        icon: format!("{}{}", icon, if daylight { 'd' } else { 'n' }),
    }
}

fn classify(temperature: f64, clouds: u8, precipitation_mm: f64, daylight: bool) -> WeatherCondition {
    if precipitation_mm > 0.0 {
        if temperature <= 32.0 {
            return if precipitation_mm < 2.5 {
                condition(600, "Snow", "light snow", "13", daylight)
            } else {
                condition(601, "Snow", "snow", "13", daylight)
            };
        }
        if precipitation_mm >= 7.6 && temperature >= 75.0 {
            return condition(211, "Thunderstorm", "thunderstorm", "11", daylight);
        }
        return match precipitation_mm {
            p if p < 2.5 => condition(500, "Rain", "light rain", "10", daylight),
            p if p < 7.6 => condition(501, "Rain", "moderate rain", "10", daylight),
            _ => condition(502, "Rain", "heavy intensity rain", "10", daylight),
        };
    }

    match clouds {
        0..=10 => condition(800, "Clear", "clear sky", "01", daylight),
        11..=24 => condition(801, "Clouds", "few clouds", "02", daylight),
        25..=50 => condition(802, "Clouds", "scattered clouds", "03", daylight),
        51..=84 => condition(803, "Clouds", "broken clouds", "04", daylight),
        _ => condition(804, "Clouds", "overcast clouds", "04", daylight),
    }
}

fn dew_point_f(temperature_f: f64, humidity: f64) -> f64 {
    let t = (temperature_f - 32.0) * 5.0 / 9.0;
    let (a, b) = (17.27, 237.7);
    let gamma = a * t / (b + t) + (humidity.max(1.0) / 100.0).ln();
    let dew_c = b * gamma / (a - gamma);
    dew_c * 9.0 / 5.0 + 32.0
}

fn feels_like_f(temperature: f64, humidity: f64, wind_mph: f64) -> f64 {
    if temperature <= 50.0 && wind_mph > 3.0 {
        let v = wind_mph.powf(0.16);
        35.74 + 0.6215 * temperature - 35.75 * v + 0.4275 * temperature * v
    } else if temperature >= 80.0 {
        let (t, r) = (temperature, humidity);
        -42.379 + 2.04901523 * t + 10.14333127 * r
            - 0.22475541 * t * r
            - 0.00683783 * t * t
            - 0.05481717 * r * r
            + 0.00122874 * t * t * r
            + 0.00085282 * t * r * r
            - 0.00000199 * t * t * r * r
    } else {
        temperature
    }
}

/// Sample a weather snapshot for the capture time and place.
///
/// Deterministic for a given random state.
pub fn weather(ts: DateTime<Utc>, location: GeoPoint, bias: &SeasonBias, rng: &mut SimRng) -> WeatherState {
    let climate = climate_for(location.lat);
    let season = season_factor(ts, location.lat);
    let solar_hour = local_solar_hour(ts, location);
    let diurnal = (2.0 * PI * (solar_hour - 15.0) / 24.0).cos();

    let temperature = climate.mean_f
        + climate.seasonal_amplitude_f * season
        + climate.diurnal_amplitude_f * diurnal
        + bias.temperature_offset_f
        + normal(rng, 0.0, 3.5);

    let mut clouds = normal(rng, climate.cloud_mean, 30.0).clamp(0.0, 100.0);
    let precipitation_chance =
        (((clouds - 65.0) / 35.0).max(0.0) * climate.wetness * 2.5 * bias.precipitation_scale).clamp(0.0, 0.95);

    let precipitation_mm = if rng.gen_bool(precipitation_chance) {
        clouds = clouds.max(75.0);
        let u: f64 = rng.gen_range(f64::EPSILON..1.0);
        round_to((-u.ln() * 2.5).max(0.1), 1)
    } else {
        0.0
    };
    let clouds = clouds.round() as u8;

    let humidity = (35.0 + clouds as f64 * 0.35 + if precipitation_mm > 0.0 { 20.0 } else { 0.0 }
        - diurnal * 10.0
        + normal(rng, 0.0, 8.0))
    .clamp(8.0, 100.0);

    let wind_speed = (normal(rng, 6.0, 4.0).abs() + if precipitation_mm > 0.0 { 4.0 } else { 0.0 }).min(45.0);
    let wind_gust = wind_speed * rng.gen_range(1.2..1.8);
    let pressure = 1015.0 - clouds as f64 * 0.08 - if precipitation_mm > 0.0 { 6.0 } else { 0.0 }
        + normal(rng, 0.0, 4.0);

    let visibility = if precipitation_mm >= 7.6 {
        rng.gen_range(1_000..4_000)
    } else if precipitation_mm > 0.0 {
        rng.gen_range(4_000..9_000)
    } else {
        10_000
    };

    let (elevation, _) = solar_position(ts, location);
    let daylight = elevation > -0.833;
    let uvi = if elevation > 0.0 {
        11.0 * elevation.to_radians().sin() * (1.0 - 0.75 * clouds as f64 / 100.0)
    } else {
        0.0
    };

    let temperature = round_to(temperature, 1);
    let times = sun_times(ts, location);
    let observed_timestamp = ts.duration_trunc(Duration::minutes(10)).unwrap_or(ts);

    WeatherState {
        observed_timestamp,
        temperature,
        feels_like: round_to(feels_like_f(temperature, humidity, wind_speed), 1),
        humidity: humidity.round() as u8,
        dew_point: round_to(dew_point_f(temperature, humidity), 1),
        pressure: pressure.round(),
        wind_speed: round_to(wind_speed, 1),
        wind_gust: round_to(wind_gust, 1),
        wind_direction: rng.gen_range(0..360),
        clouds,
        visibility,
        uvi: round_to(uvi, 1),
        precipitation_mm,
        conditions: classify(temperature, clouds, precipitation_mm, daylight),
        sunrise: times.sunrise,
        sunset: times.sunset,
        units: "imperial".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::rng_from_seed;
    use chrono::TimeZone;

    const RANCH: GeoPoint = GeoPoint {
        lon: -99.607781,
        lat: 30.990075,
    };

    fn sample(ts: DateTime<Utc>, loc: GeoPoint, seed: u64) -> WeatherState {
        weather(ts, loc, &SeasonBias::default(), &mut rng_from_seed(seed))
    }

    #[test]
    fn test_same_seed_same_weather() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 14, 16, 5, 0).unwrap();
        assert_eq!(sample(ts, RANCH, 99), sample(ts, RANCH, 99));
    }

    #[test]
    fn test_condition_consistent_with_values() {
        let mut ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for seed in 0..2_000u64 {
            let loc = if seed % 3 == 0 { GeoPoint { lon: 20.0, lat: 68.0 } } else { RANCH };
            let w = sample(ts, loc, seed);
            match w.conditions.main.as_str() {
                "Rain" | "Thunderstorm" => {
                    assert!(w.precipitation_mm > 0.0);
                    assert!(w.temperature > 32.0);
                }
                "Snow" => {
                    assert!(w.precipitation_mm > 0.0);
                    assert!(w.temperature <= 32.0);
                }
                "Clear" => {
                    assert_eq!(w.precipitation_mm, 0.0);
                    assert!(w.clouds <= 10);
                }
                "Clouds" => {
                    assert_eq!(w.precipitation_mm, 0.0);
                    assert!(w.clouds > 10);
                }
                other => panic!("unexpected condition {other}"),
            }
            assert!(w.humidity <= 100);
            assert!(w.wind_gust >= w.wind_speed);
            ts += Duration::minutes(263);
        }
    }

    #[test]
    fn test_summer_warmer_than_winter() {
        let summer = Utc.with_ymd_and_hms(2024, 7, 15, 20, 0, 0).unwrap();
        let winter = Utc.with_ymd_and_hms(2024, 1, 15, 20, 0, 0).unwrap();
        let avg = |ts| (0..200).map(|s| sample(ts, RANCH, s).temperature).sum::<f64>() / 200.0;
        assert!(avg(summer) > avg(winter) + 20.0);

        let south = GeoPoint { lon: 149.1, lat: -35.3 };
        let avg_south = |ts| (0..200).map(|s| sample(ts, south, s).temperature).sum::<f64>() / 200.0;
        assert!(avg_south(winter) > avg_south(summer));
    }

    #[test]
    fn test_night_icon_and_no_uv() {
        let night = Utc.with_ymd_and_hms(2024, 7, 15, 8, 0, 0).unwrap();
        let w = sample(night, RANCH, 5);
        assert!(w.conditions.icon.ends_with('n'));
        assert_eq!(w.uvi, 0.0);
    }

    #[test]
    fn test_precipitation_scale_zero_disables_precipitation() {
        let bias = SeasonBias {
            temperature_offset_f: 0.0,
            precipitation_scale: 0.0,
        };
        let ts = Utc.with_ymd_and_hms(2024, 4, 2, 12, 0, 0).unwrap();
        for seed in 0..300 {
            let w = weather(ts, RANCH, &bias, &mut rng_from_seed(seed));
            assert_eq!(w.precipitation_mm, 0.0);
        }
    }

    #[test]
    fn test_sunrise_matches_astronomy() {
        let ts = Utc.with_ymd_and_hms(2024, 10, 3, 14, 0, 0).unwrap();
        let w = sample(ts, RANCH, 1);
        let sky = crate::sky::astronomy(ts, RANCH);
        assert_eq!(w.sunrise, sky.sun.sunrise);
        assert_eq!(w.sunset, sky.sun.sunset);
    }
}
