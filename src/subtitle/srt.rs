// SRT subtitle format
use tracing::warn;

use super::{timecode, Cue};

/// Serialize cues as SRT, one text line per cue.
///
/// Every entry, including the last, is followed by a blank line.
pub fn write(cues: &[Cue]) -> String {
    cues.iter()
        .map(|cue| {
            let text = single_line(&cue.text);
            if reads_as_structure(&text) {
                warn!(
                    "Cue {}: text {:?} will not parse back as cue text",
                    cue.index, text
                );
            }
            format!(
                "{}\n{} --> {}\n{}\n\n",
                cue.index,
                timecode::format(cue.start),
                timecode::format(cue.end),
                text
            )
        })
        .collect()
}

/// Flatten text into one line so it cannot be mistaken for an index or separator.
fn single_line(text: &[String]) -> String {
    text.iter()
        .flat_map(|line| line.lines())
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A digits-only line reads as an index and `-->` as a timing line.
fn reads_as_structure(line: &str) -> bool {
    let is_index = !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit());
    is_index || line.contains("-->")
}
