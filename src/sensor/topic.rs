use crate::error::DecodeError;
use crate::sensor::SensorType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTopic {
    pub sensor_type: SensorType,

    pub sensor_name: String,
}

/// Splits `<category>/<sensor_name>` into its parts.
///
/// Anything other than exactly two non-empty segments, or a sensor name
/// holding a backslash or control character, is
/// [`DecodeError::UnexpectedFormat`]; a well-formed topic whose category is
/// not one of the known sensor types is [`DecodeError::UnknownCategory`].
pub fn decode_topic(topic: &str) -> Result<DecodedTopic, DecodeError> {
    let mut segments = topic.split('/');

    let (Some(category), Some(sensor_name), None) =
        (segments.next(), segments.next(), segments.next())
    else {
        return Err(DecodeError::UnexpectedFormat(topic.to_owned()));
    };

    if category.is_empty() || !is_valid_sensor_name(sensor_name) {
        return Err(DecodeError::UnexpectedFormat(topic.to_owned()));
    }

    let sensor_type = category.parse::<SensorType>()?;

    Ok(DecodedTopic {
        sensor_type,
        sensor_name: sensor_name.to_owned(),
    })
}

// The name ends up as a line-protocol tag value and field key, where a line
// break splits the point and a backslash escapes the next separator.
fn is_valid_sensor_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(|c| c == '\\' || c.is_control())
}
