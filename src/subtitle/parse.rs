// SRT parsing
use super::timecode::{self, TimecodeError};
use super::Cue;
use crate::error::{ResubError, Result};
use std::time::Duration;
use tracing::debug;

enum State {
    ExpectIndex,
    ExpectTimecode { index: u64, line: usize },
    CollectText(Cue),
}

/// Parse SRT text into cues, preserving file order.
///
/// A blank line only separates entries; a cue ends when the next index
/// line or the end of input is reached.
pub fn parse(input: &str) -> Result<Vec<Cue>> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut cues = Vec::new();
    let mut state = State::ExpectIndex;

    for (offset, raw) in input.lines().enumerate() {
        let line_no = offset + 1;
        let line = raw.trim();

        state = match state {
            State::ExpectIndex => {
                if line.is_empty() {
                    State::ExpectIndex
                } else if is_index(line) {
                    State::ExpectTimecode {
                        index: parse_index(line, line_no)?,
                        line: line_no,
                    }
                } else {
                    return Err(parse_error(
                        line_no,
                        format!("expected cue index, found '{line}'"),
                    ));
                }
            }
            State::ExpectTimecode { index, line: at } => {
                if line.is_empty() {
                    State::ExpectTimecode { index, line: at }
                } else if line.contains("-->") {
                    let (start, end) = parse_timing(line, line_no)?;
                    State::CollectText(Cue {
                        index,
                        start,
                        end,
                        text: Vec::new(),
                    })
                } else {
                    return Err(parse_error(
                        line_no,
                        format!("expected timecode line with '-->', found '{line}'"),
                    ));
                }
            }
            State::CollectText(mut cue) => {
                if is_index(line) {
                    cues.push(cue);
                    State::ExpectTimecode {
                        index: parse_index(line, line_no)?,
                        line: line_no,
                    }
                } else if line.contains("-->") {
                    return Err(parse_error(
                        line_no,
                        format!("unexpected timecode line inside cue {}", cue.index),
                    ));
                } else {
                    if !line.is_empty() {
                        cue.text.push(line.to_string());
                    }
                    State::CollectText(cue)
                }
            }
        };
    }

    match state {
        State::ExpectIndex => {}
        State::ExpectTimecode { index, line } => {
            return Err(parse_error(
                line,
                format!("cue {index} has no timecode line"),
            ));
        }
        State::CollectText(cue) => cues.push(cue),
    }

    debug!("Parsed {} cues", cues.len());
    Ok(cues)
}

fn is_index(line: &str) -> bool {
    !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit())
}

fn parse_index(line: &str, line_no: usize) -> Result<u64> {
    let index: u64 = line
        .parse()
        .map_err(|e| parse_error(line_no, format!("invalid cue index '{line}': {e}")))?;
    if index == 0 {
        return Err(parse_error(line_no, "cue index must be positive".to_string()));
    }
    Ok(index)
}

fn parse_timing(line: &str, line_no: usize) -> Result<(Duration, Duration)> {
    let (start, end) = line
        .split_once("-->")
        .ok_or_else(|| parse_error(line_no, "timecode line lacks '-->'".to_string()))?;

    let timecode_error = |source: TimecodeError| ResubError::Timecode {
        line: line_no,
        source,
    };
    let start = timecode::parse(start).map_err(timecode_error)?;
    let end = timecode::parse(end).map_err(timecode_error)?;

    if end < start {
        return Err(parse_error(
            line_no,
            format!(
                "cue ends at {} before it starts at {}",
                timecode::format(end),
                timecode::format(start)
            ),
        ));
    }

    Ok((start, end))
}

fn parse_error(line: usize, message: String) -> ResubError {
    ResubError::Parse { line, message }
}
