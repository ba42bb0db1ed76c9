// SRT timecodes: HH:MM:SS,mmm
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimecodeError {
    #[error("expected HH:MM:SS,mmm but found {count} colon-separated fields in '{input}'")]
    FieldCount { input: String, count: usize },

    #[error("missing comma between seconds and milliseconds in '{0}'")]
    MissingComma(String),

    #[error("invalid number '{field}' in '{input}'")]
    InvalidNumber { input: String, field: String },

    #[error("{unit} out of range in '{input}'")]
    OutOfRange { input: String, unit: &'static str },
}

/// Parse an `HH:MM:SS,mmm` timecode.
pub fn parse(text: &str) -> Result<Duration, TimecodeError> {
    let input = text.trim();
    let fields: Vec<&str> = input.split(':').collect();
    if fields.len() != 3 {
        return Err(TimecodeError::FieldCount {
            input: input.to_string(),
            count: fields.len(),
        });
    }

    let (seconds, millis) = fields[2]
        .split_once(',')
        .ok_or_else(|| TimecodeError::MissingComma(input.to_string()))?;

    let hours = parse_field(input, fields[0])?;
    let minutes = parse_field(input, fields[1])?;
    let seconds = parse_field(input, seconds)?;
    let millis = parse_field(input, millis)?;

    if minutes >= 60 {
        return Err(out_of_range(input, "minutes"));
    }
    if seconds >= 60 {
        return Err(out_of_range(input, "seconds"));
    }
    if millis >= 1000 {
        return Err(out_of_range(input, "milliseconds"));
    }

    let total_secs = hours
        .checked_mul(3600)
        .and_then(|secs| secs.checked_add(minutes * 60 + seconds))
        .ok_or_else(|| out_of_range(input, "hours"))?;

    Ok(Duration::from_secs(total_secs) + Duration::from_millis(millis))
}

/// Render a duration as a zero-padded `HH:MM:SS,mmm` timecode.
pub fn format(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let millis = d.subsec_millis();
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}

fn parse_field(input: &str, field: &str) -> Result<u64, TimecodeError> {
    let invalid = || TimecodeError::InvalidNumber {
        input: input.to_string(),
        field: field.to_string(),
    };

    // u64::from_str would also accept a leading '+'
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    field.parse().map_err(|_| invalid())
}

fn out_of_range(input: &str, unit: &'static str) -> TimecodeError {
    TimecodeError::OutOfRange {
        input: input.to_string(),
        unit,
    }
}
