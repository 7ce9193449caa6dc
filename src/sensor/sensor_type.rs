use std::str::FromStr;

use crate::error::{ConvertError, DecodeError};
use crate::sensor::{FieldValue, Unit, parse_celsius_as_fahrenheit, parse_float, parse_integer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorType {
    Temperature = 0,
    Humidity = 1,
    Pressure = 2,
    RawMoisture = 3,
}

/// Everything that differs between sensor categories.
#[derive(Debug)]
pub struct SensorSpec {
    pub sensor_type: SensorType,

    /// First topic segment, e.g. `temperature_degC`.
    pub category: &'static str,

    pub topic_filter: &'static str,

    pub measurement: &'static str,

    /// Appended to `<sensor_name>_` to form the field key.
    pub field_suffix: &'static str,

    /// Human-readable name used in log lines.
    pub label: &'static str,

    pub unit: Unit,

    pub convert: fn(&str) -> Result<FieldValue, ConvertError>,
}

// Indexed by the `SensorType` discriminant.
static SENSOR_SPECS: [SensorSpec; 4] = [
    SensorSpec {
        sensor_type: SensorType::Temperature,
        category: "temperature_degC",
        topic_filter: "temperature_degC/#",
        measurement: "room_temp",
        field_suffix: "temp_degF",
        label: "Temperature",
        unit: Unit::Fahrenheit,
        convert: parse_celsius_as_fahrenheit,
    },
    SensorSpec {
        sensor_type: SensorType::Humidity,
        category: "humidity_pct",
        topic_filter: "humidity_pct/#",
        measurement: "room_humidity",
        field_suffix: "humidity_pct",
        label: "Humidity",
        unit: Unit::Percent,
        convert: parse_float,
    },
    SensorSpec {
        sensor_type: SensorType::Pressure,
        category: "pressure_hpa",
        topic_filter: "pressure_hpa/#",
        measurement: "room_pressure",
        field_suffix: "pressure_hpa",
        label: "Pressure",
        unit: Unit::Hectopascal,
        convert: parse_float,
    },
    SensorSpec {
        sensor_type: SensorType::RawMoisture,
        category: "raw_moisture_sensor",
        topic_filter: "raw_moisture_sensor/#",
        measurement: "plant_raw_moisture_reading",
        field_suffix: "raw_moisture_reading",
        label: "Raw moisture reading",
        unit: Unit::Dimensionless,
        convert: parse_integer,
    },
];

/// Subscriptions issued on every (re)connect, one per sensor type.
pub fn topic_filters() -> impl ExactSizeIterator<Item = &'static str> {
    SENSOR_SPECS.iter().map(|spec| spec.topic_filter)
}

impl SensorType {
    pub const ALL: [SensorType; 4] = [
        SensorType::Temperature,
        SensorType::Humidity,
        SensorType::Pressure,
        SensorType::RawMoisture,
    ];

    pub fn spec(self) -> &'static SensorSpec {
        &SENSOR_SPECS[self as usize]
    }

    pub fn as_str(&self) -> &'static str {
        self.spec().category
    }
}

impl FromStr for SensorType {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SENSOR_SPECS
            .iter()
            .find(|spec| spec.category == s)
            .map(|spec| spec.sensor_type)
            .ok_or_else(|| DecodeError::UnknownCategory(s.to_owned()))
    }
}
