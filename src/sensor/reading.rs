use std::fmt;

use crate::error::ConvertError;
use crate::sensor::SensorType;

/// Numeric value stored in a point field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Integer(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Fahrenheit,
    Percent,
    Hectopascal,
    Dimensionless,
}

impl Unit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Fahrenheit => "°F",
            Unit::Percent => "%",
            Unit::Hectopascal => "hPa",
            Unit::Dimensionless => "",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub sensor_type: SensorType,

    pub value: FieldValue,

    pub unit: Unit,
}

/// Parses a raw payload according to the sensor type's conversion rule.
pub fn convert(sensor_type: SensorType, payload: &[u8]) -> Result<Reading, ConvertError> {
    let text = std::str::from_utf8(payload)?;
    let spec = sensor_type.spec();

    let value = (spec.convert)(text)?;

    Ok(Reading {
        sensor_type,
        value,
        unit: spec.unit,
    })
}

/// `F = C * 9/5 + 32`, rounded half-up to two decimal places.
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    round_half_up_2dp(celsius * 9.0 / 5.0 + 32.0)
}

fn round_half_up_2dp(v: f64) -> f64 {
    (v * 100.0 + 0.5).floor() / 100.0
}

pub(crate) fn parse_celsius_as_fahrenheit(text: &str) -> Result<FieldValue, ConvertError> {
    let celsius = parse_finite(text)?;

    Ok(FieldValue::Float(celsius_to_fahrenheit(celsius)))
}

pub(crate) fn parse_float(text: &str) -> Result<FieldValue, ConvertError> {
    Ok(FieldValue::Float(parse_finite(text)?))
}

pub(crate) fn parse_integer(text: &str) -> Result<FieldValue, ConvertError> {
    let v = text
        .trim()
        .parse::<i64>()
        .map_err(|_| ConvertError::Parse(text.to_owned()))?;

    Ok(FieldValue::Integer(v))
}

// NaN and infinities parse fine but cannot be written to InfluxDB.
fn parse_finite(text: &str) -> Result<f64, ConvertError> {
    match text.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ConvertError::Parse(text.to_owned())),
    }
}
