/// Clip range timecodes.
///
/// A timecode is `mm:ss` or `hh:mm:ss`. Parsing only checks the grammar;
/// `to_seconds` additionally rejects minute/second components of 60 or more.
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::TimecodeError;

static TIMECODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{1,2}:[0-9]{2}(?::[0-9]{2})?$").unwrap()
});

/// A validated timecode. Keeps the text the user typed so filenames
/// can be derived from it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Timecode {
    raw: String,
}

impl Timecode {
    /// Parse a timecode, trimming surrounding whitespace first.
    pub fn parse(input: &str) -> Result<Self, TimecodeError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(TimecodeError::Empty);
        }
        if !TIMECODE_RE.is_match(trimmed) {
            return Err(TimecodeError::InvalidFormat(trimmed.to_string()));
        }
        Ok(Self { raw: trimmed.to_string() })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Total seconds. Fails when minutes or seconds are >= 60.
    pub fn to_seconds(&self) -> Result<u32, TimecodeError> {
        let parts = self
            .raw
            .split(':')
            .map(str::parse::<u32>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| TimecodeError::InvalidFormat(self.raw.clone()))?;

        let (hours, minutes, seconds) = match parts.as_slice() {
            [m, s] => (0, *m, *s),
            [h, m, s] => (*h, *m, *s),
            _ => return Err(TimecodeError::InvalidFormat(self.raw.clone())),
        };

        if minutes >= 60 || seconds >= 60 {
            return Err(TimecodeError::OutOfRange(self.raw.clone()));
        }

        Ok(hours * 3600 + minutes * 60 + seconds)
    }

    /// The timecode with `:` replaced by `_`, safe for filenames.
    pub fn file_safe(&self) -> String {
        self.raw.replace(':', "_")
    }
}

impl FromStr for Timecode {
    type Err = TimecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
