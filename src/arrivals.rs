// TfL unified API, line arrivals:
// https://api.tfl.gov.uk/Line/dlr/Arrivals
// yields a flat JSON array of "Prediction" objects, one per (train, station)
// pair, with no paging and no auth needed at this request rate.
extern crate anyhow;
extern crate chrono;
extern crate chrono_tz;
extern crate reqwest;
extern crate serde_json;

use anyhow::Context;
use crate::result;

pub const DLR_ARRIVALS_URL: &str = "https://api.tfl.gov.uk/Line/dlr/Arrivals";

const USER_AGENT: &str = concat!("dlrmap/", env!("CARGO_PKG_VERSION"));
const INVALID_TIMESTAMP: &str = "Invalid Date";

pub type FetchFn = Box<dyn FnMut(&str) -> result::DlrMapResult<String> + Send>;

#[derive(Debug, Clone, PartialEq)]
pub enum RawTimestamp {
    Missing,
    EpochMillis(f64),
    Text(String),
}

impl Default for RawTimestamp {
    fn default() -> RawTimestamp {
        return RawTimestamp::Missing;
    }
}

// Largest |millis| a date may be, +/- 100,000,000 days around the epoch.
const MAX_EPOCH_MILLIS: f64 = 8.64e15;

/// A prediction as shown on the map: the raw timestamp has been turned into
/// a wall-clock string, everything else is passed through.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Arrival {
    pub id: String,
    pub station_name: String,
    pub direction: String,
    pub platform_name: String,
    pub destination_name: String,
    pub timestamp: String,
    pub time_to_station: f64,
    pub expected_arrival: String,
}

impl Arrival {
    pub fn is_inbound(&self) -> bool {
        return self.direction == "inbound";
    }
}

/// Formats as e.g. "03:03:09 PM" in `tz`. Unparseable input becomes
/// "Invalid Date" rather than an error.
pub fn format_timestamp(raw: &RawTimestamp, tz: chrono_tz::Tz) -> String {
    use chrono::TimeZone;

    let instant = match *raw {
        RawTimestamp::Missing => None,
        RawTimestamp::EpochMillis(millis) if millis.is_finite() && millis.abs() <= MAX_EPOCH_MILLIS =>
            chrono::Utc.timestamp_millis_opt(millis.trunc() as i64).single(),
        RawTimestamp::EpochMillis(_) => None,
        RawTimestamp::Text(ref text) => parse_text_timestamp(text.trim(), tz),
    };

    return match instant {
        Some(instant) => instant.with_timezone(&tz).format("%I:%M:%S %p").to_string(),
        None => INVALID_TIMESTAMP.to_string(),
    };
}

fn parse_text_timestamp(text: &str, tz: chrono_tz::Tz) -> Option<chrono::DateTime<chrono::Utc>> {
    use chrono::TimeZone;

    if let Ok(with_offset) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(with_offset.with_timezone(&chrono::Utc));
    }

    // A bare date is midnight UTC.
    if let Ok(date) = chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(chrono::Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }

    // No offset: read as wall-clock time in the display zone. Across a
    // fall-back transition the first of the two instants is used.
    let naive = chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
        .ok()?;
    return tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&chrono::Utc));
}

// Field readers for one Prediction object. A field of the wrong type never
// fails the record; it degrades the same way a loosely typed client would.
fn text_field(prediction: &serde_json::Value, name: &str) -> String {
    return match prediction.get(name) {
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(serde_json::Value::Number(number)) => number.to_string(),
        Some(serde_json::Value::Bool(flag)) => flag.to_string(),
        _ => String::new(),
    };
}

// null counts as zero, anything that isn't a number (or a numeric string)
// is NaN.
fn seconds_field(prediction: &serde_json::Value, name: &str) -> f64 {
    return match prediction.get(name) {
        Some(serde_json::Value::Null) => 0.0,
        Some(serde_json::Value::Number(number)) => number.as_f64().unwrap_or(std::f64::NAN),
        Some(serde_json::Value::Bool(flag)) => if *flag { 1.0 } else { 0.0 },
        Some(serde_json::Value::String(text)) if text.trim().is_empty() => 0.0,
        Some(serde_json::Value::String(text)) => text.trim().parse().unwrap_or(std::f64::NAN),
        _ => std::f64::NAN,
    };
}

fn timestamp_field(prediction: &serde_json::Value, name: &str) -> RawTimestamp {
    return match prediction.get(name) {
        None => RawTimestamp::Missing,
        Some(serde_json::Value::Null) => RawTimestamp::EpochMillis(0.0),
        Some(serde_json::Value::Number(number)) =>
            RawTimestamp::EpochMillis(number.as_f64().unwrap_or(std::f64::NAN)),
        Some(serde_json::Value::String(text)) => RawTimestamp::Text(text.clone()),
        Some(_) => RawTimestamp::Missing,
    };
}

// Everything else in a Prediction ($type, naptanId, timing, ...) is ignored.
fn normalize(prediction: &serde_json::Value, tz: chrono_tz::Tz) -> Arrival {
    return Arrival{
        id: text_field(prediction, "id"),
        station_name: text_field(prediction, "stationName"),
        direction: text_field(prediction, "direction"),
        platform_name: text_field(prediction, "platformName"),
        destination_name: text_field(prediction, "destinationName"),
        timestamp: format_timestamp(&timestamp_field(prediction, "timestamp"), tz),
        time_to_station: seconds_field(prediction, "timeToStation"),
        expected_arrival: text_field(prediction, "expectedArrival"),
    };
}

/// Only a body that isn't a JSON array is an error. Individual records are
/// read field by field, so one odd prediction can't hide the others.
pub fn parse_arrivals(response_body: &str, tz: chrono_tz::Tz) -> result::DlrMapResult<Vec<Arrival>> {
    let predictions: Vec<serde_json::Value> = serde_json::from_str(response_body)
        .context("while parsing arrivals json")?;

    return Ok(predictions.iter().map(|p| normalize(p, tz)).collect());
}

pub fn fetch_arrivals(url: &str, tz: chrono_tz::Tz, fetch_fn: &mut FetchFn) -> result::DlrMapResult<Vec<Arrival>> {
    let response_body = fetch_fn(url)?;
    return parse_arrivals(&response_body, tz);
}

pub fn real_fetch(url: &str) -> result::DlrMapResult<String> {
    debug!("Fetching {}", url);

    let client = reqwest::blocking::Client::new();
    let response = client.get(url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .with_context(|| format!("while fetching url: {}", url))?
        .error_for_status()?;

    return Ok(response.text()?);
}
