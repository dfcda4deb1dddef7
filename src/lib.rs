//! Wordcraft Lexica: a writer's thesaurus backed by a generative language model.
//!
//! A search fans out into a synonym and an antonym request; a follow-up
//! suggestion asks the model to pick the single best candidate for a sentence
//! and tone. Every model response is validated against a strict shape before
//! it reaches the caller.

pub mod actions;
pub mod config;
pub mod error;
pub mod flows;
pub mod gate;
pub mod llm;
pub mod prompt;
pub mod schema;
#[cfg(feature = "web")]
pub mod session;
pub mod tone;
#[cfg(feature = "web")]
pub mod web;

pub use actions::{
    ActionForm, ActionType, SearchForm, SessionDisplayState, SessionPhase, SuggestionForm,
    WordQuery, dispatch, fetch_word_data, fetch_word_suggestion, lookup_word, validate_api_key,
    validate_context,
};
pub use config::ModelConfig;
pub use error::LexicaError;
pub use flows::{SuggestionQuery, generate_antonyms, generate_synonyms, suggest_best_word};
pub use gate::KeyGate;
pub use llm::{Credential, FakeReply, FakeTransport, GeminiTransport, ModelClient, ModelTransport};
pub use schema::{AntonymList, ResponseSchema, SuggestionResult, SuggestionType, SynonymList};
pub use tone::Tone;
