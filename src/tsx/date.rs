//! Date values for `new Date(..)` and the built-in `dayjs` module.
//!
//! All dates are interpreted in UTC so builds do not depend on the machine's
//! timezone.

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime, TimeDelta, Timelike, Utc};
use std::fmt;

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday",
];

/// Which API the value was created through; decides method names and
/// string conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFlavor {
    Js,
    Dayjs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateValue {
    /// `None` for an invalid date.
    pub time: Option<DateTime<Utc>>,
    pub flavor: DateFlavor,
}

/// Units accepted by `diff`, `add` and `subtract`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Unit {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "ms" | "millisecond" | "milliseconds" => Self::Millisecond,
            "s" | "second" | "seconds" => Self::Second,
            "m" | "minute" | "minutes" => Self::Minute,
            "h" | "hour" | "hours" => Self::Hour,
            "d" | "day" | "days" => Self::Day,
            "w" | "week" | "weeks" => Self::Week,
            "M" | "month" | "months" => Self::Month,
            "y" | "year" | "years" => Self::Year,
            _ => return None,
        })
    }

    const fn millis(self) -> Option<f64> {
        Some(match self {
            Self::Millisecond => 1.0,
            Self::Second => 1_000.0,
            Self::Minute => 60_000.0,
            Self::Hour => 3_600_000.0,
            Self::Day => 86_400_000.0,
            Self::Week => 604_800_000.0,
            Self::Month | Self::Year => return None,
        })
    }
}

/// Parse the string forms dates take in frontmatter and templates.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .or_else(|_| NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d"))
        .ok()?;
    date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc())
}

pub fn from_timestamp_ms(ms: f64) -> Option<DateTime<Utc>> {
    if !ms.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis(ms.trunc() as i64)
}

impl DateValue {
    pub const fn new(time: Option<DateTime<Utc>>, flavor: DateFlavor) -> Self {
        Self { time, flavor }
    }

    pub fn now(flavor: DateFlavor) -> Self {
        Self::new(Some(Utc::now()), flavor)
    }

    pub const fn is_valid(&self) -> bool {
        self.time.is_some()
    }

    pub fn timestamp_ms(&self) -> f64 {
        self.time.map_or(f64::NAN, |t| t.timestamp_millis() as f64)
    }

    pub fn to_iso_string(&self) -> Option<String> {
        self.time
            .map(|t| t.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
    }

    /// Calendar field accessor shared by `getFullYear()` / `year()` etc.
    pub fn field(&self, name: &str) -> f64 {
        let Some(t) = self.time else {
            return f64::NAN;
        };
        let value = match name {
            "year" => t.year(),
            "month" => t.month0() as i32,
            "date" => t.day() as i32,
            "day" => t.weekday().num_days_from_sunday() as i32,
            "hour" => t.hour() as i32,
            "minute" => t.minute() as i32,
            "second" => t.second() as i32,
            "millisecond" => (t.timestamp_subsec_millis()) as i32,
            _ => return f64::NAN,
        };
        f64::from(value)
    }

    /// `a.diff(b, unit, float)`: `a - b` expressed in `unit`.
    pub fn diff(&self, other: &Self, unit: Unit, float: bool) -> f64 {
        let (Some(a), Some(b)) = (self.time, other.time) else {
            return f64::NAN;
        };
        let value = match unit.millis() {
            Some(ms) => (a - b).num_milliseconds() as f64 / ms,
            None => {
                let months = month_diff(a, b);
                if unit == Unit::Year { months / 12.0 } else { months }
            }
        };
        if float { value } else { value.trunc() + 0.0 }
    }

    pub fn add(&self, amount: f64, unit: Unit) -> Self {
        let time = self.time.and_then(|t| {
            let amount = amount.trunc() as i64;
            match unit {
                Unit::Month | Unit::Year => {
                    let months = if unit == Unit::Year { amount * 12 } else { amount };
                    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
                    if months >= 0 {
                        t.checked_add_months(magnitude)
                    } else {
                        t.checked_sub_months(magnitude)
                    }
                }
                _ => {
                    let ms = unit.millis().unwrap_or(1.0) as i64;
                    t.checked_add_signed(TimeDelta::try_milliseconds(amount.checked_mul(ms)?)?)
                }
            }
        });
        Self::new(time, self.flavor)
    }

    /// `startOf(unit)`: truncate to the beginning of the unit.
    pub fn start_of(&self, unit: Unit) -> Self {
        let time = self.time.and_then(|t| {
            let date = t.date_naive();
            let day = |d: NaiveDate| d.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
            match unit {
                Unit::Millisecond => Some(t),
                Unit::Second => t.with_nanosecond(0),
                Unit::Minute => t.with_nanosecond(0)?.with_second(0),
                Unit::Hour => t.with_nanosecond(0)?.with_second(0)?.with_minute(0),
                Unit::Day => day(date),
                Unit::Week => {
                    let offset = u64::from(date.weekday().num_days_from_sunday());
                    day(date.checked_sub_days(chrono::Days::new(offset))?)
                }
                Unit::Month => day(date.with_day(1)?),
                Unit::Year => day(NaiveDate::from_ymd_opt(date.year(), 1, 1)?),
            }
        });
        Self::new(time, self.flavor)
    }

    /// Render a dayjs format template (`YYYY-MM-DD`, `MMMM D, YYYY`, `[at] HH:mm`).
    pub fn format(&self, template: Option<&str>) -> String {
        let Some(t) = self.time else {
            return "Invalid Date".to_owned();
        };
        let template = template.unwrap_or("YYYY-MM-DDTHH:mm:ssZ");
        let mut out = String::with_capacity(template.len() + 8);
        let mut rest = template;

        const TOKENS: &[&str] = &[
            "YYYY", "YY", "MMMM", "MMM", "MM", "M", "DD", "D", "dddd", "ddd", "dd", "d", "HH",
            "H", "hh", "h", "mm", "m", "ss", "s", "SSS", "A", "a", "ZZ", "Z",
        ];

        while let Some(c) = rest.chars().next() {
            if c == '[' {
                match rest.find(']') {
                    Some(end) => {
                        out.push_str(&rest[1..end]);
                        rest = &rest[end + 1..];
                    }
                    None => {
                        out.push_str(&rest[1..]);
                        rest = "";
                    }
                }
                continue;
            }
            let Some(token) = TOKENS.iter().find(|token| rest.starts_with(**token)) else {
                out.push(c);
                rest = &rest[c.len_utf8()..];
                continue;
            };
            let hour12 = match t.hour() % 12 {
                0 => 12,
                h => h,
            };
            let weekday = t.weekday().num_days_from_sunday() as usize;
            let piece = match *token {
                "YYYY" => format!("{:04}", t.year()),
                "YY" => format!("{:02}", t.year().rem_euclid(100)),
                "MMMM" => MONTH_NAMES[t.month0() as usize].to_owned(),
                "MMM" => MONTH_NAMES[t.month0() as usize][..3].to_owned(),
                "MM" => format!("{:02}", t.month()),
                "M" => t.month().to_string(),
                "DD" => format!("{:02}", t.day()),
                "D" => t.day().to_string(),
                "dddd" => WEEKDAY_NAMES[weekday].to_owned(),
                "ddd" => WEEKDAY_NAMES[weekday][..3].to_owned(),
                "dd" => WEEKDAY_NAMES[weekday][..2].to_owned(),
                "d" => weekday.to_string(),
                "HH" => format!("{:02}", t.hour()),
                "H" => t.hour().to_string(),
                "hh" => format!("{hour12:02}"),
                "h" => hour12.to_string(),
                "mm" => format!("{:02}", t.minute()),
                "m" => t.minute().to_string(),
                "ss" => format!("{:02}", t.second()),
                "s" => t.second().to_string(),
                "SSS" => format!("{:03}", t.timestamp_subsec_millis()),
                "A" => (if t.hour() < 12 { "AM" } else { "PM" }).to_owned(),
                "a" => (if t.hour() < 12 { "am" } else { "pm" }).to_owned(),
                "ZZ" => "+0000".to_owned(),
                _ => "+00:00".to_owned(),
            };
            out.push_str(&piece);
            rest = &rest[token.len()..];
        }
        out
    }

    /// `Date.prototype.toLocaleDateString()` in the `en-US` locale.
    pub fn to_locale_date_string(&self) -> String {
        self.time.map_or_else(
            || "Invalid Date".to_owned(),
            |t| format!("{}/{}/{}", t.month(), t.day(), t.year()),
        )
    }

    /// `Date.prototype.toDateString()`: `Wed Jan 03 2024`.
    pub fn to_date_string(&self) -> String {
        self.time.map_or_else(
            || "Invalid Date".to_owned(),
            |t| t.format("%a %b %d %Y").to_string(),
        )
    }
}

/// Whole and fractional months between two instants, `a - b`.
fn month_diff(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    if a < b {
        return -month_diff(b, a);
    }
    let whole = (a.year() - b.year()) * 12 + (a.month() as i32 - b.month() as i32);
    let whole = u32::try_from(whole).unwrap_or(0);
    let mut anchor_months = whole;
    let mut anchor = b.checked_add_months(Months::new(whole)).unwrap_or(b);
    if anchor > a && anchor_months > 0 {
        anchor_months -= 1;
        anchor = b.checked_add_months(Months::new(anchor_months)).unwrap_or(b);
    }
    let next = anchor.checked_add_months(Months::new(1)).unwrap_or(anchor);
    let span = (next - anchor).num_milliseconds() as f64;
    let fraction = if span > 0.0 {
        (a - anchor).num_milliseconds() as f64 / span
    } else {
        0.0
    };
    f64::from(anchor_months) + fraction
}

impl fmt::Display for DateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(t) = self.time else {
            return f.write_str("Invalid Date");
        };
        match self.flavor {
            DateFlavor::Js => write!(f, "{}", t.format("%a %b %d %Y %H:%M:%S GMT+0000")),
            DateFlavor::Dayjs => write!(f, "{}", t.format("%a, %d %b %Y %H:%M:%S GMT")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dayjs(s: &str) -> DateValue {
        DateValue::new(parse_date(s), DateFlavor::Dayjs)
    }

    #[test]
    fn test_parse_date_forms() {
        assert!(parse_date("2024-01-15").is_some());
        assert!(parse_date("2024-01-15T10:30:00Z").is_some());
        assert!(parse_date("2024-01-15T10:30:00+02:00").is_some());
        assert!(parse_date("2024-01-15 10:30").is_some());
        assert!(parse_date("2024/01/15").is_some());
        assert!(parse_date("2024-03").is_some());
        assert!(parse_date("not a date").is_none());
        assert_eq!(
            parse_date("2024-01-15T10:30:00+02:00"),
            parse_date("2024-01-15T08:30:00Z")
        );
    }

    #[test]
    fn test_format_tokens() {
        let d = dayjs("2024-03-05T14:07:09Z");
        assert_eq!(d.format(Some("YYYY-MM-DD")), "2024-03-05");
        assert_eq!(d.format(Some("MMMM D, YYYY")), "March 5, 2024");
        assert_eq!(d.format(Some("ddd MMM DD")), "Tue Mar 05");
        assert_eq!(d.format(Some("h:mm A")), "2:07 PM");
        assert_eq!(d.format(Some("[Posted] YY")), "Posted 24");
        assert_eq!(d.format(None), "2024-03-05T14:07:09+00:00");
    }

    #[test]
    fn test_invalid_date() {
        let d = dayjs("garbage");
        assert!(!d.is_valid());
        assert_eq!(d.format(Some("YYYY")), "Invalid Date");
        assert!(d.timestamp_ms().is_nan());
        assert!(d.diff(&dayjs("2024-01-01"), Unit::Day, false).is_nan());
    }

    #[test]
    fn test_diff_units() {
        let a = dayjs("2024-03-01");
        let b = dayjs("2024-01-01");
        assert_eq!(a.diff(&b, Unit::Day, false), 60.0);
        assert_eq!(b.diff(&a, Unit::Day, false), -60.0);
        assert_eq!(a.diff(&b, Unit::Month, false), 2.0);
        assert_eq!(a.diff(&b, Unit::Year, false), 0.0);
        assert_eq!(a.diff(&b, Unit::Millisecond, false), 60.0 * 86_400_000.0);
        assert_eq!(dayjs("2024-01-31").diff(&dayjs("2024-01-01"), Unit::Month, false), 0.0);
    }

    #[test]
    fn test_add_months_and_days() {
        let d = dayjs("2024-01-31");
        assert_eq!(d.add(1.0, Unit::Month).format(Some("YYYY-MM-DD")), "2024-02-29");
        assert_eq!(d.add(-1.0, Unit::Day).format(Some("YYYY-MM-DD")), "2024-01-30");
        assert_eq!(d.add(1.0, Unit::Year).format(Some("YYYY-MM-DD")), "2025-01-31");
    }

    #[test]
    fn test_start_of() {
        let d = dayjs("2024-03-14T15:09:26Z");
        assert_eq!(
            d.start_of(Unit::Day).to_iso_string().as_deref(),
            Some("2024-03-14T00:00:00.000Z")
        );
        assert_eq!(
            d.start_of(Unit::Month).to_iso_string().as_deref(),
            Some("2024-03-01T00:00:00.000Z")
        );
        // 2024-03-14 is a Thursday
        assert_eq!(
            d.start_of(Unit::Week).to_iso_string().as_deref(),
            Some("2024-03-10T00:00:00.000Z")
        );
        assert_eq!(
            d.start_of(Unit::Hour).to_iso_string().as_deref(),
            Some("2024-03-14T15:00:00.000Z")
        );
    }

    #[test]
    fn test_js_strings() {
        let d = DateValue::new(parse_date("2024-01-03"), DateFlavor::Js);
        assert_eq!(d.to_iso_string().as_deref(), Some("2024-01-03T00:00:00.000Z"));
        assert_eq!(d.to_locale_date_string(), "1/3/2024");
        assert_eq!(d.to_date_string(), "Wed Jan 03 2024");
        assert_eq!(d.field("month"), 0.0);
        assert_eq!(d.field("day"), 3.0);
    }
}
