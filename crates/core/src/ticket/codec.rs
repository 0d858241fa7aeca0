//! Human-visible ticket references embedded in staff-chat messages.
//!
//! A reference looks like `#T000042 <marker>`: the `#T` prefix, the ticket id
//! zero-padded to six digits, one space, then the locale marker string. The
//! marker terminates the digits, so a reference can sit inside a longer
//! sentence without being confused with other numbers.

use regex_lite::Regex;

use super::TicketId;

/// Literal prefix of every ticket token.
pub const TOKEN_PREFIX: &str = "#T";

/// Minimum number of digits in a token.
pub const TOKEN_WIDTH: usize = 6;

/// Encodes ticket ids into tokens and finds them again in free text.
#[derive(Debug, Clone)]
pub struct TicketCodec {
    marker: String,
    pattern: Regex,
}

impl TicketCodec {
    /// Build a codec for the given locale marker.
    pub fn new(marker: impl Into<String>) -> Result<Self, regex_lite::Error> {
        let marker = marker.into();
        let pattern = Regex::new(&format!(
            r"{}(\d+) {}",
            regex_lite::escape(TOKEN_PREFIX),
            regex_lite::escape(&marker)
        ))?;
        Ok(Self { marker, pattern })
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// `#T` followed by the zero-padded id.
    pub fn encode(&self, id: TicketId) -> String {
        format!("{}{:0width$}", TOKEN_PREFIX, id.get(), width = TOKEN_WIDTH)
    }

    /// The full wire token: encoded id, a space, and the marker.
    pub fn reference(&self, id: TicketId) -> String {
        format!("{} {}", self.encode(id), self.marker)
    }

    /// Find the first token in `text` and return its id.
    ///
    /// Returns `None` when there is no well-formed token or the digits do not
    /// fit an id.
    pub fn decode(&self, text: &str) -> Option<TicketId> {
        let captures = self.pattern.captures(text)?;
        let digits = captures.get(1)?.as_str();
        digits.parse::<i64>().ok().map(TicketId)
    }
}
