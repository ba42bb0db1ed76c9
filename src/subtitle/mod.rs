pub mod parse;
pub mod srt;
pub mod timecode;

pub use parse::parse;
pub use srt::write;

use std::time::Duration;

/// One subtitle entry as it appears in the source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    pub index: u64,
    pub start: Duration,
    pub end: Duration,
    pub text: Vec<String>,
}

impl Cue {
    /// Get the duration of this cue.
    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }

    /// A copy of this cue carrying a single recognized line instead of its original text.
    pub fn with_text(&self, text: impl Into<String>) -> Cue {
        Cue {
            index: self.index,
            start: self.start,
            end: self.end,
            text: vec![text.into()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_text_keeps_timing() {
        let cue = Cue {
            index: 7,
            start: Duration::from_millis(1000),
            end: Duration::from_millis(2500),
            text: vec!["Bonjour".to_string(), "tout le monde".to_string()],
        };

        let updated = cue.with_text("Salut");
        assert_eq!(updated.index, 7);
        assert_eq!(updated.start, cue.start);
        assert_eq!(updated.end, cue.end);
        assert_eq!(updated.text, vec!["Salut".to_string()]);
        assert_eq!(updated.duration(), Duration::from_millis(1500));
    }
}
