use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LexicaError;

/// Stylistic hint passed to the suggestion prompt.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
pub enum Tone {
    #[default]
    Conversational,
    Formal,
    Poetic,
    Technical,
    Humorous,
    Concise,
}

impl Tone {
    pub const ALL: [Tone; 6] = [
        Tone::Conversational,
        Tone::Formal,
        Tone::Poetic,
        Tone::Technical,
        Tone::Humorous,
        Tone::Concise,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Tone::Conversational => "Conversational",
            Tone::Formal => "Formal",
            Tone::Poetic => "Poetic",
            Tone::Technical => "Technical",
            Tone::Humorous => "Humorous",
            Tone::Concise => "Concise",
        }
    }

    /// Parses a submitted form field. Blank means "use the default".
    pub fn from_field(raw: Option<&str>) -> Result<Tone, LexicaError> {
        match raw.map(str::trim).filter(|value| !value.is_empty()) {
            None => Ok(Tone::default()),
            Some(value) => value.parse(),
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Tone {
    type Err = LexicaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Tone::ALL
            .iter()
            .copied()
            .find(|tone| tone.label().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| LexicaError::validation("Invalid tone selected."))
    }
}
