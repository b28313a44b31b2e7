//! Sun and moon state for a timestamp and location.
//!
//! Pure and deterministic: no random source is involved, so the same
//! `(timestamp, location)` always yields the same state. Solar geometry uses
//! the NOAA fractional-year approximation; the moon is modelled from the
//! synodic and anomalistic month lengths.

use crate::random::round_to;
use crate::topology::GeoPoint;
use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Timelike, Utc};
use serde::Serialize;
use std::f64::consts::PI;

const SYNODIC_MONTH_DAYS: f64 = 29.530_588_853;
const ANOMALISTIC_MONTH_DAYS: f64 = 27.554_550;
/// Zenith of the sun's upper limb at rise/set, including refraction.
const SUNRISE_ZENITH_DEG: f64 = 90.833;
const LUNAR_DAY_HOURS: f64 = 24.84;

fn reference_new_moon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 6, 18, 14, 0).single().unwrap_or_default()
}

fn reference_perigee() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 19, 9, 0, 0).single().unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SunPosition {
    Dawn,
    Day,
    Dusk,
    Night,
}

impl SunPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            SunPosition::Dawn => "dawn",
            SunPosition::Day => "day",
            SunPosition::Dusk => "dusk",
            SunPosition::Night => "night",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MoonPhase {
    #[serde(rename = "New Moon")]
    New,
    #[serde(rename = "Waxing Crescent")]
    WaxingCrescent,
    #[serde(rename = "First Quarter")]
    FirstQuarter,
    #[serde(rename = "Waxing Gibbous")]
    WaxingGibbous,
    #[serde(rename = "Full Moon")]
    Full,
    #[serde(rename = "Waning Gibbous")]
    WaningGibbous,
    #[serde(rename = "Last Quarter")]
    LastQuarter,
    #[serde(rename = "Waning Crescent")]
    WaningCrescent,
}

impl MoonPhase {
    const ORDER: [MoonPhase; 8] = [
        MoonPhase::New,
        MoonPhase::WaxingCrescent,
        MoonPhase::FirstQuarter,
        MoonPhase::WaxingGibbous,
        MoonPhase::Full,
        MoonPhase::WaningGibbous,
        MoonPhase::LastQuarter,
        MoonPhase::WaningCrescent,
    ];

    /// Phase for a fraction of the synodic month in `[0, 1)`.
    pub fn from_fraction(fraction: f64) -> Self {
        let index = ((fraction * 8.0) + 0.5).floor() as usize % 8;
        Self::ORDER[index]
    }

    /// Kebab-case tag, e.g. `full-moon`.
    pub fn slug(&self) -> &'static str {
        match self {
            MoonPhase::New => "new-moon",
            MoonPhase::WaxingCrescent => "waxing-crescent",
            MoonPhase::FirstQuarter => "first-quarter",
            MoonPhase::WaxingGibbous => "waxing-gibbous",
            MoonPhase::Full => "full-moon",
            MoonPhase::WaningGibbous => "waning-gibbous",
            MoonPhase::LastQuarter => "last-quarter",
            MoonPhase::WaningCrescent => "waning-crescent",
        }
    }
}

/// Rise/set times for the local solar day containing a timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunTimes {
    /// `None` during polar night or midnight sun
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
    pub solar_noon: DateTime<Utc>,
    /// Sun never rises (true) or never sets (false) when rise/set are absent
    pub polar_night: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SunState {
    pub position: SunPosition,
    /// Degrees above the horizon
    pub altitude: f64,
    /// Degrees clockwise from north
    pub azimuth: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sunrise: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sunset: Option<DateTime<Utc>>,
    pub solar_noon: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoonState {
    pub phase: MoonPhase,
    /// Illuminated fraction in `[0, 1]`
    pub illumination: f64,
    pub days_since_new_moon: f64,
    pub altitude: f64,
    pub azimuth: f64,
    pub distance_km: f64,
    pub transit: DateTime<Utc>,
    pub moonrise: DateTime<Utc>,
    pub moonset: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeedingWindow {
    pub start_timestamp: DateTime<Utc>,
    pub end_timestamp: DateTime<Utc>,
}

impl FeedingWindow {
    fn around(center: DateTime<Utc>, half_width: Duration) -> Self {
        Self {
            start_timestamp: center - half_width,
            end_timestamp: center + half_width,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start_timestamp && ts <= self.end_timestamp
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedingTimes {
    pub major: Vec<FeedingWindow>,
    pub minor: Vec<FeedingWindow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AstronomicalState {
    pub sun: SunState,
    pub moon: MoonState,
    pub feeding: FeedingTimes,
}

/// Solar declination (radians) and equation of time (minutes) at `ts`.
fn solar_geometry(ts: DateTime<Utc>) -> (f64, f64) {
    let days_in_year = if is_leap_year(ts.year()) { 366.0 } else { 365.0 };
    let hour = ts.hour() as f64 + ts.minute() as f64 / 60.0 + ts.second() as f64 / 3600.0;
    let gamma = 2.0 * PI / days_in_year * (ts.ordinal() as f64 - 1.0 + (hour - 12.0) / 24.0);

    let eqtime = 229.18
        * (0.000075 + 0.001868 * gamma.cos()
            - 0.032077 * gamma.sin()
            - 0.014615 * (2.0 * gamma).cos()
            - 0.040849 * (2.0 * gamma).sin());

    let decl = 0.006918 - 0.399912 * gamma.cos() + 0.070257 * gamma.sin()
        - 0.006758 * (2.0 * gamma).cos()
        + 0.000907 * (2.0 * gamma).sin()
        - 0.002697 * (3.0 * gamma).cos()
        + 0.00148 * (3.0 * gamma).sin();

    (decl, eqtime)
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Elevation and azimuth (degrees) of a body with the given declination and
/// hour angle, seen from `lat_deg`.
fn horizontal(lat_deg: f64, decl: f64, hour_angle_deg: f64) -> (f64, f64) {
    let lat = lat_deg.to_radians();
    let ha = hour_angle_deg.to_radians();
    let cos_zenith = (lat.sin() * decl.sin() + lat.cos() * decl.cos() * ha.cos()).clamp(-1.0, 1.0);
    let elevation = 90.0 - cos_zenith.acos().to_degrees();
    let azimuth = (ha.sin().atan2(ha.cos() * lat.sin() - decl.tan() * lat.cos()).to_degrees() + 180.0)
        .rem_euclid(360.0);
    (elevation, azimuth)
}

fn minutes_of_day(ts: DateTime<Utc>) -> f64 {
    ts.hour() as f64 * 60.0 + ts.minute() as f64 + ts.second() as f64 / 60.0
}

fn solar_hour_angle(ts: DateTime<Utc>, location: GeoPoint, eqtime: f64) -> f64 {
    let true_solar_minutes = minutes_of_day(ts) + eqtime + 4.0 * location.lon;
    true_solar_minutes / 4.0 - 180.0
}

/// Solar elevation and azimuth in degrees.
pub fn solar_position(ts: DateTime<Utc>, location: GeoPoint) -> (f64, f64) {
    let (decl, eqtime) = solar_geometry(ts);
    horizontal(location.lat, decl, solar_hour_angle(ts, location, eqtime))
}

fn minutes_after(base: DateTime<Utc>, minutes: f64) -> DateTime<Utc> {
    base + Duration::milliseconds((minutes * 60_000.0).round() as i64)
}

/// Sunrise, sunset and solar noon for the local solar day containing `ts`.
pub fn sun_times(ts: DateTime<Utc>, location: GeoPoint) -> SunTimes {
    // Local mean solar time runs 4 minutes ahead per degree east.
    let solar_offset = Duration::milliseconds((location.lon * 240_000.0).round() as i64);
    let local_date = (ts + solar_offset).date_naive();
    let midnight = Utc.from_utc_datetime(&local_date.and_time(NaiveTime::MIN));

    let approx_noon = minutes_after(midnight, 720.0 - 4.0 * location.lon);
    let (decl, eqtime) = solar_geometry(approx_noon);
    let noon_minutes = 720.0 - 4.0 * location.lon - eqtime;
    let solar_noon = minutes_after(midnight, noon_minutes);

    let lat = location.lat.to_radians();
    let cos_ha = SUNRISE_ZENITH_DEG.to_radians().cos() / (lat.cos() * decl.cos())
        - lat.tan() * decl.tan();

    if !cos_ha.is_finite() || cos_ha > 1.0 || cos_ha < -1.0 {
        return SunTimes {
            sunrise: None,
            sunset: None,
            solar_noon,
            polar_night: !cos_ha.is_finite() || cos_ha > 1.0,
        };
    }

    let ha_deg = cos_ha.acos().to_degrees();
    SunTimes {
        sunrise: Some(minutes_after(midnight, noon_minutes - 4.0 * ha_deg)),
        sunset: Some(minutes_after(midnight, noon_minutes + 4.0 * ha_deg)),
        solar_noon,
        polar_night: false,
    }
}

/// Bucket a timestamp using the rise/set times of its own solar day.
pub fn classify_sun_position(ts: DateTime<Utc>, times: &SunTimes) -> SunPosition {
    match (times.sunrise, times.sunset) {
        (Some(rise), Some(set)) => {
            if ts >= rise - Duration::minutes(45) && ts < rise + Duration::minutes(30) {
                SunPosition::Dawn
            } else if ts >= rise + Duration::minutes(30) && ts < set - Duration::minutes(30) {
                SunPosition::Day
            } else if ts >= set - Duration::minutes(30) && ts < set + Duration::minutes(45) {
                SunPosition::Dusk
            } else {
                SunPosition::Night
            }
        }
        _ if times.polar_night => SunPosition::Night,
        _ => SunPosition::Day,
    }
}

fn moon_state(ts: DateTime<Utc>, location: GeoPoint, times: &SunTimes) -> MoonState {
    let days_since_reference = (ts - reference_new_moon()).num_seconds() as f64 / 86_400.0;
    let age = days_since_reference.rem_euclid(SYNODIC_MONTH_DAYS);
    let fraction = age / SYNODIC_MONTH_DAYS;
    let illumination = (1.0 - (2.0 * PI * fraction).cos()) / 2.0;

    // The moon trails the sun by `fraction` of a lunar day.
    let transit = times.solar_noon
        + Duration::milliseconds((fraction * LUNAR_DAY_HOURS * 3_600_000.0) as i64);
    let half_arc = Duration::minutes(6 * 60 + 12);

    let (sun_decl, eqtime) = solar_geometry(ts);
    let moon_decl = sun_decl * (2.0 * PI * fraction).cos();
    let hour_angle = solar_hour_angle(ts, location, eqtime) - fraction * 360.0;
    let (altitude, azimuth) = horizontal(location.lat, moon_decl, hour_angle);

    let days_since_perigee = (ts - reference_perigee()).num_seconds() as f64 / 86_400.0;
    let anomaly = 2.0 * PI * days_since_perigee.rem_euclid(ANOMALISTIC_MONTH_DAYS) / ANOMALISTIC_MONTH_DAYS;
    let distance_km = 385_001.0 - 20_905.0 * anomaly.cos();

    MoonState {
        phase: MoonPhase::from_fraction(fraction),
        illumination: round_to(illumination, 3),
        days_since_new_moon: round_to(age, 2),
        altitude: round_to(altitude, 2),
        azimuth: round_to(azimuth, 2),
        distance_km: distance_km.round(),
        transit,
        moonrise: transit - half_arc,
        moonset: transit + half_arc,
    }
}

fn feeding_times(times: &SunTimes, moon: &MoonState) -> FeedingTimes {
    let hour = Duration::hours(1);
    let half_hour = Duration::minutes(30);
    let (rise, set) = match (times.sunrise, times.sunset) {
        (Some(rise), Some(set)) => (rise, set),
        _ => (times.solar_noon - Duration::hours(6), times.solar_noon + Duration::hours(6)),
    };
    let underfoot = moon.transit + Duration::minutes((LUNAR_DAY_HOURS * 30.0) as i64);

    FeedingTimes {
        major: vec![FeedingWindow::around(rise, hour), FeedingWindow::around(set, hour)],
        minor: vec![
            FeedingWindow::around(moon.transit, half_hour),
            FeedingWindow::around(underfoot, half_hour),
        ],
    }
}

/// Sun, moon and solunar feeding state at `ts` for `location`.
pub fn astronomy(ts: DateTime<Utc>, location: GeoPoint) -> AstronomicalState {
    let times = sun_times(ts, location);
    let (altitude, azimuth) = solar_position(ts, location);
    let moon = moon_state(ts, location, &times);
    let feeding = feeding_times(&times, &moon);

    AstronomicalState {
        sun: SunState {
            position: classify_sun_position(ts, &times),
            altitude: round_to(altitude, 2),
            azimuth: round_to(azimuth, 2),
            sunrise: times.sunrise,
            sunset: times.sunset,
            solar_noon: times.solar_noon,
        },
        moon,
        feeding,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RANCH: GeoPoint = GeoPoint {
        lon: -99.607781,
        lat: 30.990075,
    };

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_texas_summer_sunrise_and_sunset() {
        // Central Texas, June 21: sunrise ~11:30 UTC, sunset ~01:40 UTC next day.
        let times = sun_times(at(2024, 6, 21, 18, 0), RANCH);
        let rise = times.sunrise.unwrap();
        let set = times.sunset.unwrap();
        assert_eq!(rise.date_naive(), at(2024, 6, 21, 0, 0).date_naive());
        assert!((rise - at(2024, 6, 21, 11, 30)).num_minutes().abs() < 20, "sunrise {rise}");
        assert!((set - at(2024, 6, 22, 1, 40)).num_minutes().abs() < 20, "sunset {set}");
        assert!(rise < times.solar_noon && times.solar_noon < set);
    }

    #[test]
    fn test_bucket_never_night_between_sunrise_and_sunset() {
        let mut ts = at(2024, 1, 1, 0, 0);
        let end = at(2024, 12, 31, 0, 0);
        let locations = [
            RANCH,
            GeoPoint { lon: 151.2, lat: -33.9 },
            GeoPoint { lon: 0.0, lat: 0.0 },
            GeoPoint { lon: 24.9, lat: 60.2 },
        ];
        while ts < end {
            for loc in locations {
                let state = astronomy(ts, loc);
                if let (Some(rise), Some(set)) = (state.sun.sunrise, state.sun.sunset) {
                    if ts > rise && ts < set {
                        assert_ne!(state.sun.position, SunPosition::Night, "{ts} at {loc:?}");
                    }
                    if ts < rise - Duration::minutes(45) || ts >= set + Duration::minutes(45) {
                        assert_eq!(state.sun.position, SunPosition::Night, "{ts} at {loc:?}");
                    }
                }
            }
            ts += Duration::minutes(317);
        }
    }

    #[test]
    fn test_timestamp_falls_within_its_solar_day() {
        let mut ts = at(2024, 3, 1, 0, 0);
        for _ in 0..500 {
            let times = sun_times(ts, RANCH);
            let offset = (ts - times.solar_noon).num_minutes().abs();
            assert!(offset <= 12 * 60 + 20, "{ts}: {offset} minutes from solar noon");
            ts += Duration::minutes(97);
        }
    }

    #[test]
    fn test_noon_is_day_and_midnight_is_night() {
        let noon = sun_times(at(2024, 9, 10, 18, 0), RANCH).solar_noon;
        assert_eq!(astronomy(noon, RANCH).sun.position, SunPosition::Day);
        assert!(astronomy(noon, RANCH).sun.altitude > 40.0);
        let midnight = noon + Duration::hours(12);
        assert_eq!(astronomy(midnight, RANCH).sun.position, SunPosition::Night);
        assert!(astronomy(midnight, RANCH).sun.altitude < 0.0);
    }

    #[test]
    fn test_polar_cases() {
        let svalbard = GeoPoint { lon: 15.6, lat: 78.2 };
        let winter = astronomy(at(2024, 12, 21, 12, 0), svalbard);
        assert!(winter.sun.sunrise.is_none());
        assert_eq!(winter.sun.position, SunPosition::Night);

        let summer = astronomy(at(2024, 6, 21, 0, 0), svalbard);
        assert!(summer.sun.sunset.is_none());
        assert_eq!(summer.sun.position, SunPosition::Day);
    }

    #[test]
    fn test_known_full_and_new_moons() {
        // Full moon 2024-04-23 23:49 UTC, new moon 2024-04-08 18:21 UTC.
        let full = astronomy(at(2024, 4, 23, 23, 0), RANCH);
        assert_eq!(full.moon.phase, MoonPhase::Full);
        assert!(full.moon.illumination > 0.97);

        let new = astronomy(at(2024, 4, 8, 18, 0), RANCH);
        assert_eq!(new.moon.phase, MoonPhase::New);
        assert!(new.moon.illumination < 0.03);
    }

    #[test]
    fn test_moon_distance_is_plausible() {
        let mut ts = at(2024, 1, 1, 0, 0);
        for _ in 0..60 {
            let d = astronomy(ts, RANCH).moon.distance_km;
            assert!((356_000.0..=407_000.0).contains(&d));
            ts += Duration::hours(13);
        }
    }

    #[test]
    fn test_feeding_windows_are_ordered() {
        let state = astronomy(at(2024, 5, 5, 15, 0), RANCH);
        assert_eq!(state.feeding.major.len(), 2);
        assert_eq!(state.feeding.minor.len(), 2);
        for w in state.feeding.major.iter().chain(state.feeding.minor.iter()) {
            assert!(w.start_timestamp < w.end_timestamp);
        }
        let rise = state.sun.sunrise.unwrap();
        assert!(state.feeding.major[0].contains(rise));
    }

    #[test]
    fn test_identical_inputs_identical_output() {
        let ts = at(2024, 7, 4, 3, 21);
        assert_eq!(astronomy(ts, RANCH), astronomy(ts, RANCH));
    }

    #[test]
    fn test_phase_from_fraction_boundaries() {
        assert_eq!(MoonPhase::from_fraction(0.0), MoonPhase::New);
        assert_eq!(MoonPhase::from_fraction(0.99), MoonPhase::New);
        assert_eq!(MoonPhase::from_fraction(0.25), MoonPhase::FirstQuarter);
        assert_eq!(MoonPhase::from_fraction(0.5), MoonPhase::Full);
        assert_eq!(MoonPhase::from_fraction(0.75), MoonPhase::LastQuarter);
    }
}
