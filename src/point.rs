use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::sensor::{DecodedTopic, FieldValue, Reading};

pub const LOCATION_TAG: &str = "location";

/// One time-series sample in InfluxDB's data model.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,

    pub tags: BTreeMap<String, String>,

    pub fields: BTreeMap<String, FieldValue>,

    /// `None` lets the server assign its own receive time.
    pub timestamp: Option<DateTime<Utc>>,
}

impl Point {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp: None,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Serializes the point as a single line of InfluxDB line protocol with
    /// nanosecond precision.
    pub fn to_line_protocol(&self) -> String {
        let mut line = escape(&self.measurement, &[',', ' ']);

        for (key, value) in &self.tags {
            line.push(',');
            line.push_str(&escape(key, &[',', '=', ' ']));
            line.push('=');
            line.push_str(&escape(value, &[',', '=', ' ']));
        }

        for (i, (key, value)) in self.fields.iter().enumerate() {
            line.push(if i == 0 { ' ' } else { ',' });
            line.push_str(&escape(key, &[',', '=', ' ']));
            line.push('=');
            match value {
                FieldValue::Float(v) => {
                    let _ = write!(line, "{v}");
                }
                FieldValue::Integer(v) => {
                    let _ = write!(line, "{v}i");
                }
            }
        }

        if let Some(nanos) = self.timestamp.and_then(|t| t.timestamp_nanos_opt()) {
            let _ = write!(line, " {nanos}");
        }

        line
    }
}

fn escape(s: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Maps a decoded reading to its point: fixed measurement per sensor type,
/// a `location` tag with the sensor name and a single
/// `<sensor_name>_<suffix>` field.
pub fn build_point(topic: &DecodedTopic, reading: &Reading) -> Point {
    let spec = topic.sensor_type.spec();

    Point::new(spec.measurement)
        .tag(LOCATION_TAG, topic.sensor_name.as_str())
        .field(
            format!("{}_{}", topic.sensor_name, spec.field_suffix),
            reading.value,
        )
}
