//! Form handling: validate, run flows, fold the outcome into display state.
//!
//! Every operation takes the previous [`SessionDisplayState`] and returns a
//! new one. Errors never escape: they become messages on the state, and the
//! last successful results stay visible next to them.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{info, warn};

use crate::error::LexicaError;
use crate::flows::{self, SuggestionQuery};
use crate::llm::{Credential, ModelClient};
use crate::schema::{AntonymList, SuggestionResult, SynonymList};
use crate::tone::Tone;

pub const WORD_MIN_CHARS: usize = 1;
pub const WORD_MAX_CHARS: usize = 50;
pub const CONTEXT_MIN_CHARS: usize = 5;
pub const CONTEXT_MAX_CHARS: usize = 500;
pub const API_KEY_MIN_CHARS: usize = 10;
pub const API_KEY_MAX_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionPhase {
    #[default]
    Idle,
    Searching,
    Results,
    Empty,
    Error,
    SuggestionPending,
    SuggestionReady,
    SuggestionError,
}

/// Everything the page shows for one browser session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDisplayState {
    pub phase: SessionPhase,
    /// Word of the most recent successful search.
    pub search_word: Option<String>,
    pub synonyms: Vec<String>,
    pub antonyms: Vec<String>,
    pub error: Option<String>,
    pub message: Option<String>,
    pub context_provided: Option<String>,
    pub selected_tone: Tone,
    pub suggestion: Option<SuggestionResult>,
    pub suggestion_error: Option<String>,
}

impl SessionDisplayState {
    pub fn has_results(&self) -> bool {
        self.search_word.is_some() && !(self.synonyms.is_empty() && self.antonyms.is_empty())
    }

    /// Copy of the state marked as waiting on `action`.
    pub fn pending(&self, action: ActionType) -> Self {
        let phase = match action {
            ActionType::FetchWordData => SessionPhase::Searching,
            ActionType::FetchWordSuggestion => SessionPhase::SuggestionPending,
        };
        Self {
            phase,
            ..self.clone()
        }
    }

    fn with_suggestion_reset(self) -> Self {
        Self {
            context_provided: None,
            selected_tone: Tone::default(),
            suggestion: None,
            suggestion_error: None,
            ..self
        }
    }

    fn search_failed(previous: &SessionDisplayState, message: String) -> Self {
        Self {
            phase: SessionPhase::Error,
            error: Some(message),
            message: None,
            ..previous.clone()
        }
        .with_suggestion_reset()
    }

    fn suggestion_failed(previous: &SessionDisplayState, message: String) -> Self {
        Self {
            phase: SessionPhase::SuggestionError,
            suggestion_error: Some(message),
            ..previous.clone()
        }
    }
}

/// The `actionType` discriminator on submitted forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    FetchWordData,
    FetchWordSuggestion,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::FetchWordData => "fetchWordData",
            ActionType::FetchWordSuggestion => "fetchWordSuggestion",
        }
    }
}

impl FromStr for ActionType {
    type Err = LexicaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "fetchWordData" => Ok(ActionType::FetchWordData),
            "fetchWordSuggestion" => Ok(ActionType::FetchWordSuggestion),
            other => Err(LexicaError::validation(format!("Unknown action {other:?}."))),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchForm {
    pub word: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionForm {
    pub context: Option<String>,
    pub original_word: Option<String>,
    pub tone: Option<String>,
    pub api_key: Option<String>,
}

/// Flat union of both forms as posted by the page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionForm {
    pub action_type: Option<String>,
    pub word: Option<String>,
    pub context: Option<String>,
    pub original_word: Option<String>,
    pub tone: Option<String>,
    pub api_key: Option<String>,
}

impl ActionForm {
    pub fn action(&self) -> Option<ActionType> {
        self.action_type.as_deref()?.parse().ok()
    }

    pub fn search(&self) -> SearchForm {
        SearchForm {
            word: self.word.clone(),
            api_key: self.api_key.clone(),
        }
    }

    pub fn suggestion(&self) -> SuggestionForm {
        SuggestionForm {
            context: self.context.clone(),
            original_word: self.original_word.clone(),
            tone: self.tone.clone(),
            api_key: self.api_key.clone(),
        }
    }
}

/// A validated search word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordQuery {
    pub word: String,
}

impl WordQuery {
    pub fn parse(raw: Option<&str>) -> Result<Self, LexicaError> {
        let word = raw.unwrap_or_default().trim();
        let len = word.chars().count();
        if len < WORD_MIN_CHARS {
            return Err(LexicaError::validation("Word cannot be empty."));
        }
        if len > WORD_MAX_CHARS {
            return Err(LexicaError::validation("Word is too long."));
        }
        Ok(Self {
            word: word.to_string(),
        })
    }
}

pub fn validate_context(raw: Option<&str>) -> Result<String, LexicaError> {
    let context = raw.unwrap_or_default().trim();
    let len = context.chars().count();
    if len < CONTEXT_MIN_CHARS {
        return Err(LexicaError::validation(
            "Context should be at least 5 characters long.",
        ));
    }
    if len > CONTEXT_MAX_CHARS {
        return Err(LexicaError::validation(
            "Context is too long, please keep it under 500 characters.",
        ));
    }
    Ok(context.to_string())
}

pub fn validate_api_key(raw: Option<&str>) -> Result<Credential, LexicaError> {
    let key = raw.unwrap_or_default().trim();
    let len = key.chars().count();
    if len < API_KEY_MIN_CHARS {
        return Err(LexicaError::validation("API Key seems too short."));
    }
    if len > API_KEY_MAX_CHARS {
        return Err(LexicaError::validation("API Key seems too long."));
    }
    Ok(Credential::new(key))
}

/// Runs the synonym and antonym flows side by side.
///
/// Both run as their own tasks. The first failure is returned immediately;
/// the other call keeps running to completion and its result is dropped.
pub async fn lookup_word(
    client: &ModelClient,
    word: &str,
    credential: &Credential,
) -> Result<(SynonymList, AntonymList), LexicaError> {
    let synonyms = {
        let (client, word, credential) = (client.clone(), word.to_string(), credential.clone());
        tokio::spawn(async move { flows::generate_synonyms(&client, &word, &credential).await })
    };
    let antonyms = {
        let (client, word, credential) = (client.clone(), word.to_string(), credential.clone());
        tokio::spawn(async move { flows::generate_antonyms(&client, &word, &credential).await })
    };
    tokio::try_join!(flatten(synonyms), flatten(antonyms))
}

async fn flatten<T>(
    handle: tokio::task::JoinHandle<Result<T, LexicaError>>,
) -> Result<T, LexicaError> {
    match handle.await {
        Ok(result) => result,
        Err(err) => Err(LexicaError::provider(format!("model task failed: {err}"))),
    }
}

pub async fn fetch_word_data(
    client: &ModelClient,
    previous: &SessionDisplayState,
    form: &SearchForm,
) -> SessionDisplayState {
    let query = match WordQuery::parse(form.word.as_deref()) {
        Ok(query) => query,
        Err(err) => return SessionDisplayState::search_failed(previous, err.to_string()),
    };
    let credential = match validate_api_key(form.api_key.as_deref()) {
        Ok(credential) => credential,
        Err(err) => {
            return SessionDisplayState::search_failed(
                previous,
                format!("A valid API Key is required. {err}"),
            );
        }
    };

    match lookup_word(client, &query.word, &credential).await {
        Ok((synonyms, antonyms)) => {
            let (synonyms, antonyms) = (synonyms.synonyms, antonyms.antonyms);
            info!(
                word = %query.word,
                synonyms = synonyms.len(),
                antonyms = antonyms.len(),
                "word lookup finished"
            );
            let empty = synonyms.is_empty() && antonyms.is_empty();
            SessionDisplayState {
                phase: if empty {
                    SessionPhase::Empty
                } else {
                    SessionPhase::Results
                },
                message: empty
                    .then(|| format!("No synonyms or antonyms found for \"{}\".", query.word)),
                search_word: Some(query.word),
                synonyms,
                antonyms,
                ..SessionDisplayState::default()
            }
        }
        Err(err) => {
            warn!(word = %query.word, kind = err.kind(), error = %err, "word lookup failed");
            SessionDisplayState::search_failed(
                previous,
                format!(
                    "Failed to fetch results for \"{}\". Reason: {err}",
                    query.word
                ),
            )
        }
    }
}

pub async fn fetch_word_suggestion(
    client: &ModelClient,
    previous: &SessionDisplayState,
    form: &SuggestionForm,
) -> SessionDisplayState {
    let (query, credential) = match prepare_suggestion(previous, form) {
        Ok(prepared) => prepared,
        Err(err) => return SessionDisplayState::suggestion_failed(previous, err.to_string()),
    };

    match flows::suggest_best_word(client, &query, &credential).await {
        Ok(suggestion) => SessionDisplayState {
            phase: SessionPhase::SuggestionReady,
            context_provided: Some(query.context),
            selected_tone: query.tone,
            suggestion: Some(suggestion),
            suggestion_error: None,
            ..previous.clone()
        },
        Err(err) => {
            warn!(word = %query.original_word, kind = err.kind(), error = %err, "suggestion failed");
            SessionDisplayState {
                phase: SessionPhase::SuggestionError,
                context_provided: Some(query.context),
                selected_tone: query.tone,
                suggestion: None,
                suggestion_error: Some(format!("Failed to fetch suggestion. Reason: {err}")),
                ..previous.clone()
            }
        }
    }
}

fn prepare_suggestion(
    previous: &SessionDisplayState,
    form: &SuggestionForm,
) -> Result<(SuggestionQuery, Credential), LexicaError> {
    let context = validate_context(form.context.as_deref())?;
    let tone = Tone::from_field(form.tone.as_deref())?;
    let credential = validate_api_key(form.api_key.as_deref()).map_err(|err| {
        LexicaError::validation(format!("A valid API Key is required for suggestions. {err}"))
    })?;

    let Some(search_word) = previous.search_word.as_deref().filter(|_| previous.has_results())
    else {
        return Err(LexicaError::StaleContext(
            "Original search data is missing. Please search for a word first.".to_string(),
        ));
    };
    if form.original_word.as_deref().map(str::trim) != Some(search_word) {
        return Err(LexicaError::StaleContext(
            "Mismatch in original word. Please try again.".to_string(),
        ));
    }

    Ok((
        SuggestionQuery {
            original_word: search_word.to_string(),
            context,
            tone,
            synonyms: previous.synonyms.clone(),
            antonyms: previous.antonyms.clone(),
        },
        credential,
    ))
}

/// Routes a submitted form by its `actionType`.
///
/// A new search always starts from a clean suggestion panel; an unknown
/// action leaves the state as it was.
pub async fn dispatch(
    client: &ModelClient,
    previous: &SessionDisplayState,
    form: &ActionForm,
) -> SessionDisplayState {
    match form.action() {
        Some(ActionType::FetchWordData) => fetch_word_data(client, previous, &form.search())
            .await
            .with_suggestion_reset(),
        Some(ActionType::FetchWordSuggestion) => {
            fetch_word_suggestion(client, previous, &form.suggestion()).await
        }
        None => previous.clone(),
    }
}
