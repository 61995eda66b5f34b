//! Delimiter model
//!
//! The loader never guesses a schema; the only format knowledge it needs is
//! which byte separates fields within a line.

use serde::{Deserialize, Serialize};

/// Supported field delimiters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    #[default]
    Comma,
    Tab,
    Pipe,
    Semicolon,
}

impl Delimiter {
    /// Get the character for this delimiter
    pub fn char(self) -> char {
        match self {
            Delimiter::Comma => ',',
            Delimiter::Tab => '\t',
            Delimiter::Pipe => '|',
            Delimiter::Semicolon => ';',
        }
    }

    /// Get the delimiter as the single byte the csv reader expects
    pub fn byte(self) -> u8 {
        self.char() as u8
    }

    /// Detect delimiter from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "tsv" => Delimiter::Tab,
            "psv" => Delimiter::Pipe,
            _ => Delimiter::Comma,
        }
    }

    /// Parse a user-supplied name (`comma`, `tab`, `pipe`, `semicolon`)
    /// or the literal delimiter character.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "comma" | "," => Some(Delimiter::Comma),
            "tab" | "\t" | "\\t" => Some(Delimiter::Tab),
            "pipe" | "|" => Some(Delimiter::Pipe),
            "semicolon" | ";" => Some(Delimiter::Semicolon),
            _ => None,
        }
    }
}

impl std::fmt::Display for Delimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Delimiter::Comma => "comma",
            Delimiter::Tab => "tab",
            Delimiter::Pipe => "pipe",
            Delimiter::Semicolon => "semicolon",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delimiter_from_extension() {
        assert_eq!(Delimiter::from_extension("csv"), Delimiter::Comma);
        assert_eq!(Delimiter::from_extension("CSV"), Delimiter::Comma);
        assert_eq!(Delimiter::from_extension("tsv"), Delimiter::Tab);
        assert_eq!(Delimiter::from_extension("psv"), Delimiter::Pipe);
    }

    #[test]
    fn test_delimiter_from_name() {
        assert_eq!(Delimiter::from_name("Tab"), Some(Delimiter::Tab));
        assert_eq!(Delimiter::from_name(";"), Some(Delimiter::Semicolon));
        assert_eq!(Delimiter::from_name("pipe"), Some(Delimiter::Pipe));
        assert_eq!(Delimiter::from_name("colon"), None);
    }

    #[test]
    fn test_delimiter_display_matches_name() {
        for delim in [
            Delimiter::Comma,
            Delimiter::Tab,
            Delimiter::Pipe,
            Delimiter::Semicolon,
        ] {
            assert_eq!(Delimiter::from_name(&delim.to_string()), Some(delim));
        }
    }
}
