//! The three model-backed operations: synonyms, antonyms, best word.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::LexicaError;
use crate::llm::{Credential, ModelClient};
use crate::prompt;
use crate::schema::{AntonymList, SuggestionResult, SynonymList};
use crate::tone::Tone;

/// Input for [`suggest_best_word`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionQuery {
    pub original_word: String,
    pub context: String,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub antonyms: Vec<String>,
}

impl SuggestionQuery {
    pub fn has_candidates(&self) -> bool {
        !(self.synonyms.is_empty() && self.antonyms.is_empty())
    }
}

pub async fn generate_synonyms(
    client: &ModelClient,
    word: &str,
    credential: &Credential,
) -> Result<SynonymList, LexicaError> {
    let result: SynonymList = client
        .invoke(&prompt::synonyms_prompt(word), credential)
        .await?;
    debug!(word, count = result.synonyms.len(), "synonyms generated");
    Ok(result)
}

pub async fn generate_antonyms(
    client: &ModelClient,
    word: &str,
    credential: &Credential,
) -> Result<AntonymList, LexicaError> {
    let result: AntonymList = client
        .invoke(&prompt::antonyms_prompt(word), credential)
        .await?;
    debug!(word, count = result.antonyms.len(), "antonyms generated");
    Ok(result)
}

/// Asks the model for the single best candidate for `query.context`.
///
/// With no candidates at all the answer is known up front, so the model is
/// not called (and no credential is needed).
pub async fn suggest_best_word(
    client: &ModelClient,
    query: &SuggestionQuery,
    credential: &Credential,
) -> Result<SuggestionResult, LexicaError> {
    if !query.has_candidates() {
        info!(word = %query.original_word, "no candidates, skipping model call");
        return Ok(SuggestionResult::none(format!(
            "No synonyms or antonyms were provided for \"{}\", so no suggestion can be made for the context.",
            query.original_word
        )));
    }
    let result: SuggestionResult = client
        .invoke(&prompt::suggestion_prompt(query), credential)
        .await?;
    debug!(
        word = %query.original_word,
        tone = %query.tone,
        kind = %result.suggestion_type,
        "suggestion generated"
    );
    Ok(result)
}
