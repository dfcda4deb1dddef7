//! Response shapes the model must produce.
//!
//! Each shape has two halves: a provider-facing JSON schema (the OpenAPI
//! subset accepted by Gemini's `responseSchema`) and a strict serde model the
//! returned text is validated against. Nothing is coerced: a response that
//! does not fit is a `SchemaMismatch`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

use crate::error::LexicaError;

pub trait ResponseSchema: DeserializeOwned + Serialize + Sized {
    const NAME: &'static str;

    fn json_schema() -> Value;

    /// Cross-field invariants serde cannot express.
    fn normalize(self) -> Result<Self, String> {
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SynonymList {
    pub synonyms: Vec<String>,
}

impl ResponseSchema for SynonymList {
    const NAME: &'static str = "synonyms";

    fn json_schema() -> Value {
        string_list_schema("synonyms", "The list of synonyms for the word.")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AntonymList {
    pub antonyms: Vec<String>,
}

impl ResponseSchema for AntonymList {
    const NAME: &'static str = "antonyms";

    fn json_schema() -> Value {
        string_list_schema("antonyms", "A list of antonyms for the given word.")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionType {
    Synonym,
    Antonym,
    None,
}

impl SuggestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionType::Synonym => "synonym",
            SuggestionType::Antonym => "antonym",
            SuggestionType::None => "none",
        }
    }
}

impl fmt::Display for SuggestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The model's pick. `suggested_word` is present iff the type is not `none`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SuggestionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_word: Option<String>,
    pub suggestion_type: SuggestionType,
    pub explanation: String,
}

impl SuggestionResult {
    pub fn none(explanation: impl Into<String>) -> Self {
        Self {
            suggested_word: None,
            suggestion_type: SuggestionType::None,
            explanation: explanation.into(),
        }
    }
}

impl ResponseSchema for SuggestionResult {
    const NAME: &'static str = "suggestion";

    fn json_schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "suggestedWord": {
                    "type": "STRING",
                    "description": "The suggested word. Could be a synonym or an antonym. Omitted if no suitable word is found.",
                    "nullable": true,
                },
                "suggestionType": {
                    "type": "STRING",
                    "enum": ["synonym", "antonym", "none"],
                    "description": "Whether the suggested word is a synonym, an antonym, or if no suitable suggestion was found.",
                },
                "explanation": {
                    "type": "STRING",
                    "description": "Why the word was suggested, or why no word was suitable.",
                },
            },
            "required": ["suggestionType", "explanation"],
            "propertyOrdering": ["suggestedWord", "suggestionType", "explanation"],
        })
    }

    fn normalize(self) -> Result<Self, String> {
        if self
            .suggested_word
            .as_deref()
            .is_some_and(|word| word.trim().is_empty())
        {
            return Err("suggestedWord must not be blank".to_string());
        }
        match (self.suggestion_type, self.suggested_word.is_some()) {
            (SuggestionType::None, true) => {
                Err("suggestedWord must be omitted when suggestionType is \"none\"".to_string())
            }
            (kind, false) if kind != SuggestionType::None => Err(format!(
                "suggestedWord is required when suggestionType is \"{kind}\""
            )),
            _ => Ok(self),
        }
    }
}

fn string_list_schema(field: &str, description: &str) -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            field: {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": description,
            },
        },
        "required": [field],
    })
}

/// Validates raw model text against a shape.
pub fn validate<T: ResponseSchema>(raw: &str) -> Result<T, LexicaError> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(LexicaError::EmptyOutput);
    }
    let parsed: T = serde_json::from_str(body).map_err(|err| LexicaError::SchemaMismatch {
        schema: T::NAME,
        detail: err.to_string(),
    })?;
    parsed.normalize().map_err(|detail| LexicaError::SchemaMismatch {
        schema: T::NAME,
        detail,
    })
}

/// Models sometimes wrap JSON in a ```json fence even in JSON mode.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
