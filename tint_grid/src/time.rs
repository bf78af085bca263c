//! CF-convention time decoding for the `time` coordinate.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

use crate::dataset::{AttrValue, Dataset};

/// Name of the time dimension and its coordinate variable.
pub const TIME_DIM: &str = "time";

/// `strftime` pattern used for timestamps in output filenames.
pub const STAMP_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Debug, Error, PartialEq)]
pub enum TimeError {
    #[error("dataset has no `{0}` coordinate")]
    MissingCoordinate(String),
    #[error("coordinate `{0}` has no units attribute")]
    MissingUnits(String),
    #[error("unsupported time units `{0}`")]
    BadUnits(String),
    #[error("coordinate `{0}` holds no valid time values")]
    NoValues(String),
    #[error("time value {0} is outside the representable range")]
    OutOfRange(f64),
    #[error("calendar `{0}` is not supported (expected standard, gregorian or proleptic_gregorian)")]
    UnsupportedCalendar(String),
}

/// Calendars whose day counts map onto real instants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Calendar {
    /// Julian before 1582-10-15, Gregorian from then on.
    #[default]
    Standard,
    ProlepticGregorian,
}

impl FromStr for Calendar {
    type Err = TimeError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "standard" | "gregorian" => Ok(Calendar::Standard),
            "proleptic_gregorian" => Ok(Calendar::ProlepticGregorian),
            _ => Err(TimeError::UnsupportedCalendar(name.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Days,
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
    Microseconds,
}

impl TimeUnit {
    fn from_token(token: &str) -> Option<Self> {
        let unit = match token.to_ascii_lowercase().as_str() {
            "days" | "day" | "d" => TimeUnit::Days,
            "hours" | "hour" | "hrs" | "hr" | "h" => TimeUnit::Hours,
            "minutes" | "minute" | "mins" | "min" => TimeUnit::Minutes,
            "seconds" | "second" | "secs" | "sec" | "s" => TimeUnit::Seconds,
            "milliseconds" | "millisecond" | "msecs" | "msec" | "ms" => TimeUnit::Milliseconds,
            "microseconds" | "microsecond" | "usecs" | "usec" | "us" => TimeUnit::Microseconds,
            _ => return None,
        };
        Some(unit)
    }

    fn seconds(self) -> f64 {
        match self {
            TimeUnit::Days => 86_400.0,
            TimeUnit::Hours => 3_600.0,
            TimeUnit::Minutes => 60.0,
            TimeUnit::Seconds => 1.0,
            TimeUnit::Milliseconds => 1e-3,
            TimeUnit::Microseconds => 1e-6,
        }
    }
}

/// Parsed `<unit> since <reference>` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfTimeUnits {
    pub unit: TimeUnit,
    /// Reference instant, already converted to the proleptic Gregorian calendar.
    pub epoch: DateTime<Utc>,
}

impl CfTimeUnits {
    /// Parses `units` with the reference date read in `calendar`.
    pub fn parse_in(units: &str, calendar: Calendar) -> Result<Self, TimeError> {
        let bad = || TimeError::BadUnits(units.to_string());
        let (unit, reference) = units.trim().split_once(" since ").ok_or_else(bad)?;
        let unit = TimeUnit::from_token(unit.trim()).ok_or_else(bad)?;
        let mut epoch = parse_reference(reference).ok_or_else(bad)?;
        if calendar == Calendar::Standard && before_gregorian_reform(&epoch) {
            epoch = julian_to_gregorian(epoch).ok_or_else(bad)?;
        }
        Ok(Self { unit, epoch })
    }

    pub fn decode(&self, value: f64) -> Result<DateTime<Utc>, TimeError> {
        let out_of_range = || TimeError::OutOfRange(value);
        let seconds = value * self.unit.seconds();
        if !seconds.is_finite() || seconds.abs() >= i64::MAX as f64 {
            return Err(out_of_range());
        }
        let whole = seconds.trunc();
        let nanos = ((seconds - whole) * 1e9).round() as i64;
        let offset = Duration::try_seconds(whole as i64)
            .and_then(|offset| offset.checked_add(&Duration::nanoseconds(nanos)))
            .ok_or_else(out_of_range)?;
        self.epoch
            .checked_add_signed(offset)
            .ok_or_else(out_of_range)
    }
}

impl FromStr for CfTimeUnits {
    type Err = TimeError;

    fn from_str(units: &str) -> Result<Self, Self::Err> {
        Self::parse_in(units, Calendar::Standard)
    }
}

/// The `standard` calendar switches to Gregorian on 1582-10-15.
fn before_gregorian_reform(stamp: &DateTime<Utc>) -> bool {
    (stamp.year(), stamp.month(), stamp.day()) < (1582, 10, 15)
}

/// Reads the calendar fields of `stamp` as a Julian date.
fn julian_to_gregorian(stamp: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let date = stamp.date_naive();
    let a = (14 - i64::from(date.month())) / 12;
    let year = i64::from(date.year()) + 4800 - a;
    let month = i64::from(date.month()) + 12 * a - 3;
    let julian_day =
        i64::from(date.day()) + (153 * month + 2) / 5 + 365 * year + year / 4 - 32_083;
    // Julian day number of 0000-12-31 (proleptic Gregorian).
    let days_from_ce = i32::try_from(julian_day - 1_721_425).ok()?;
    let converted = NaiveDate::from_num_days_from_ce_opt(days_from_ce)?;
    Some(Utc.from_utc_datetime(&converted.and_time(stamp.time())))
}

fn parse_reference(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(stamp) = DateTime::parse_from_rfc3339(text) {
        return Some(stamp.with_timezone(&Utc));
    }

    let naive = text
        .trim_end_matches('Z')
        .trim_end_matches("UTC")
        .trim_end_matches("utc")
        .trim();
    const FORMATS: [&str; 6] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for format in FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(naive, format) {
            return Some(Utc.from_utc_datetime(&parsed));
        }
    }

    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| Utc.from_utc_datetime(&midnight))
}

/// Earliest and latest instants of the named time coordinate.
///
/// Non-finite entries and entries equal to `_FillValue` or `missing_value`
/// are ignored. Packed values are unpacked with `scale_factor`/`add_offset`,
/// and the `calendar` attribute selects how the reference date is read.
pub fn time_bounds(
    dataset: &Dataset,
    name: &str,
) -> Result<(DateTime<Utc>, DateTime<Utc>), TimeError> {
    let variable = dataset
        .variable(name)
        .ok_or_else(|| TimeError::MissingCoordinate(name.to_string()))?;
    let calendar = match variable.attribute("calendar").and_then(AttrValue::as_text) {
        Some(calendar) => calendar.parse()?,
        None => Calendar::default(),
    };
    let units = variable
        .attribute("units")
        .and_then(AttrValue::as_text)
        .ok_or_else(|| TimeError::MissingUnits(name.to_string()))?;
    let units = CfTimeUnits::parse_in(units, calendar)?;
    let number = |key: &str| variable.attribute(key).and_then(AttrValue::as_number);
    let scale = number("scale_factor").unwrap_or(1.0);
    let offset = number("add_offset").unwrap_or(0.0);

    let fills: Vec<f64> = ["_FillValue", "missing_value"]
        .into_iter()
        .filter_map(number)
        .collect();

    let mut bounds: Option<(f64, f64)> = None;
    for &packed in &variable.data {
        if !packed.is_finite() || fills.contains(&packed) {
            continue;
        }
        let value = packed * scale + offset;
        bounds = Some(match bounds {
            Some((lo, hi)) => (lo.min(value), hi.max(value)),
            None => (value, value),
        });
    }

    let (lo, hi) = bounds.ok_or_else(|| TimeError::NoValues(name.to_string()))?;
    Ok((units.decode(lo)?, units.decode(hi)?))
}

pub fn format_stamp(instant: &DateTime<Utc>) -> String {
    instant.format(STAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Variable;

    fn utc(text: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(text).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn parses_common_reference_spellings() {
        let epoch = utc("2017-07-04T00:00:00Z");
        for units in [
            "seconds since 2017-07-04",
            "seconds since 2017-07-04 00:00:00",
            "seconds since 2017-07-04T00:00:00Z",
            "seconds since 2017-07-04 00:00:00 UTC",
            "seconds since 2017-07-04T00:00:00+00:00",
            "s since 2017-07-04 00:00",
        ] {
            let parsed: CfTimeUnits = units.parse().unwrap();
            assert_eq!(parsed.epoch, epoch, "{units}");
            assert_eq!(parsed.unit, TimeUnit::Seconds, "{units}");
        }
    }

    #[test]
    fn rejects_units_without_a_reference() {
        assert!(matches!(
            "seconds".parse::<CfTimeUnits>(),
            Err(TimeError::BadUnits(_))
        ));
        assert!(matches!(
            "fortnights since 2017-07-04".parse::<CfTimeUnits>(),
            Err(TimeError::BadUnits(_))
        ));
    }

    #[test]
    fn decodes_offsets_in_each_unit() {
        let hours: CfTimeUnits = "hours since 2017-07-04 00:00:00".parse().unwrap();
        assert_eq!(hours.decode(8.5).unwrap(), utc("2017-07-04T08:30:00Z"));

        let days: CfTimeUnits = "days since 1970-01-01".parse().unwrap();
        assert_eq!(days.decode(1.0).unwrap(), utc("1970-01-02T00:00:00Z"));

        let millis: CfTimeUnits = "milliseconds since 2017-07-04T08:00:00Z".parse().unwrap();
        assert_eq!(millis.decode(1500.0).unwrap(), utc("2017-07-04T08:00:01.5Z"));
    }

    #[test]
    fn bounds_skip_fill_values() {
        let mut ds = Dataset::new();
        ds.add_dimension(TIME_DIM, 4).unwrap();
        ds.add_variable(
            Variable::coordinate(TIME_DIM, vec![3600.0, -9999.0, 0.0, f64::NAN])
                .with_attribute(
                    "units",
                    AttrValue::Text("seconds since 2017-07-04 08:00:00".into()),
                )
                .with_attribute("_FillValue", AttrValue::Numbers(vec![-9999.0])),
        )
        .unwrap();

        let (start, end) = time_bounds(&ds, TIME_DIM).unwrap();
        assert_eq!(format_stamp(&start), "20170704080000");
        assert_eq!(format_stamp(&end), "20170704090000");
    }

    #[test]
    fn bounds_require_units_and_values() {
        let mut ds = Dataset::new();
        ds.add_dimension(TIME_DIM, 1).unwrap();
        ds.add_variable(Variable::coordinate(TIME_DIM, vec![f64::NAN]))
            .unwrap();
        assert_eq!(
            time_bounds(&ds, TIME_DIM),
            Err(TimeError::MissingUnits(TIME_DIM.into()))
        );
        assert_eq!(
            time_bounds(&Dataset::new(), TIME_DIM),
            Err(TimeError::MissingCoordinate(TIME_DIM.into()))
        );
    }

    #[test]
    fn stamps_truncate_sub_second_parts() {
        assert_eq!(
            format_stamp(&utc("2017-07-04T08:00:59.900Z")),
            "20170704080059"
        );
    }

    fn days_between(from: (i32, u32, u32), to: (i32, u32, u32)) -> f64 {
        let day = |(y, m, d): (i32, u32, u32)| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        (day(to) - day(from)).num_days() as f64
    }

    #[test]
    fn decodes_offsets_centuries_from_the_reference() {
        let days = days_between((1, 1, 1), (2017, 7, 4));
        let proleptic =
            CfTimeUnits::parse_in("days since 0001-01-01 00:00:00", Calendar::ProlepticGregorian)
                .unwrap();
        assert_eq!(
            proleptic.decode(days + 0.5).unwrap(),
            utc("2017-07-04T12:00:00Z")
        );

        let hours = days_between((1800, 1, 1), (2017, 7, 4)) * 24.0 + 8.0;
        let units: CfTimeUnits = "hours since 1800-01-01".parse().unwrap();
        assert_eq!(units.decode(hours).unwrap(), utc("2017-07-04T08:00:00Z"));
    }

    #[test]
    fn standard_calendar_reads_early_references_as_julian() {
        let units: CfTimeUnits = "days since 1582-10-04".parse().unwrap();
        assert_eq!(units.epoch, utc("1582-10-14T00:00:00Z"));
        assert_eq!(units.decode(1.0).unwrap(), utc("1582-10-15T00:00:00Z"));

        // Julian 0001-01-01 is two days before its proleptic Gregorian namesake.
        let days = days_between((1, 1, 1), (2017, 7, 4));
        let units: CfTimeUnits = "days since 0001-01-01".parse().unwrap();
        assert_eq!(units.decode(days).unwrap(), utc("2017-07-02T00:00:00Z"));

        let modern: CfTimeUnits = "days since 1582-10-15".parse().unwrap();
        assert_eq!(modern.epoch, utc("1582-10-15T00:00:00Z"));
    }

    #[test]
    fn huge_offsets_are_out_of_range() {
        let units: CfTimeUnits = "days since 1970-01-01".parse().unwrap();
        assert_eq!(units.decode(1e300), Err(TimeError::OutOfRange(1e300)));
        assert!(matches!(
            units.decode(f64::INFINITY),
            Err(TimeError::OutOfRange(_))
        ));
    }

    fn time_coordinate(values: Vec<f64>) -> Variable {
        Variable::coordinate(TIME_DIM, values).with_attribute(
            "units",
            AttrValue::Text("hours since 2017-07-04 00:00:00".into()),
        )
    }

    fn with_time(variable: Variable) -> Dataset {
        let mut ds = Dataset::new();
        ds.add_dimension(TIME_DIM, variable.data.len()).unwrap();
        ds.add_variable(variable).unwrap();
        ds
    }

    #[test]
    fn calendar_attribute_is_honoured() {
        for name in ["standard", "gregorian", "proleptic_gregorian", "Gregorian"] {
            let ds = with_time(
                time_coordinate(vec![8.0])
                    .with_attribute("calendar", AttrValue::Text(name.into())),
            );
            let (start, _) = time_bounds(&ds, TIME_DIM).unwrap();
            assert_eq!(format_stamp(&start), "20170704080000", "{name}");
        }

        for name in ["noleap", "360_day", "julian"] {
            let ds = with_time(
                time_coordinate(vec![8.0])
                    .with_attribute("calendar", AttrValue::Text(name.into())),
            );
            assert_eq!(
                time_bounds(&ds, TIME_DIM),
                Err(TimeError::UnsupportedCalendar(name.into()))
            );
        }
    }

    #[test]
    fn packed_coordinates_are_unpacked_before_decoding() {
        let ds = with_time(
            time_coordinate(vec![4.0, -1.0, 2.0])
                .with_attribute("scale_factor", AttrValue::Numbers(vec![0.5]))
                .with_attribute("add_offset", AttrValue::Numbers(vec![7.0]))
                .with_attribute("_FillValue", AttrValue::Numbers(vec![-1.0])),
        );
        let (start, end) = time_bounds(&ds, TIME_DIM).unwrap();
        assert_eq!(format_stamp(&start), "20170704080000");
        assert_eq!(format_stamp(&end), "20170704090000");
    }
}
