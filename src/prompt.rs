//! Instruction strings sent to the model. Pure string templating.

use crate::flows::SuggestionQuery;
use std::fmt::Write;

pub fn synonyms_prompt(word: &str) -> String {
    format!(
        "You are a thesaurus. Generate a list of synonyms for the word: {word}. \
         Return the synonyms as a JSON array of strings."
    )
}

pub fn antonyms_prompt(word: &str) -> String {
    format!(
        "You are a helpful thesaurus assistant. Given a word, you will provide a list of \
         antonyms for that word. Return the antonyms as a JSON array of strings.\n\nWord: {word}"
    )
}

/// Renders the best-word prompt. Empty lists become placeholders; callers
/// that want to skip the model for an empty pair must check before calling.
pub fn suggestion_prompt(query: &SuggestionQuery) -> String {
    let word = query.original_word.as_str();
    let tone = query.tone.label();
    let mut out = String::with_capacity(2048);
    out.push_str(
        "You are an expert linguistic assistant, acting as a co-pilot to a writer, helping them \
         choose the most appropriate word while preserving their unique voice. Prioritize \
         simplicity and clarity in your suggestions.\n\n",
    );
    let _ = writeln!(out, "The user searched for the word \"{word}\".");
    let _ = writeln!(
        out,
        "They provided the following context for its use: \"{}\"",
        query.context
    );
    let _ = writeln!(out, "The desired tone is: {tone}.\n");

    let _ = writeln!(out, "Available synonyms for \"{word}\" are:");
    out.push_str(&bullet_list(&query.synonyms, "(No synonyms provided)"));
    out.push('\n');
    let _ = writeln!(out, "Available antonyms for \"{word}\" are:");
    out.push_str(&bullet_list(&query.antonyms, "(No antonyms provided)"));
    out.push('\n');

    let _ = writeln!(
        out,
        "Based on the provided context and desired tone ({tone}), analyze the synonyms and \
         antonyms. Consider the tone and register implied by the context."
    );
    out.push_str(
        "Suggest the single best word (either one of the synonyms or one of the antonyms) that \
         fits the context and improves the writing. Avoid jargon or overly dense suggestions \
         unless the context and tone (e.g., Technical, Formal) specifically call for it.\n\n\
         If a fitting word is found, provide its type (synonym or antonym) and a concise \
         explanation for your choice, focusing on how it enhances clarity and fits the tone.\n\
         If no word from the provided lists is suitable for the context, indicate that no \
         suitable suggestion was found and explain why, rather than suggesting an alternative \
         that doesn't quite fit.\n\n\
         Respond with the suggested word, its type, and your explanation.\n\
         If no word is suitable, set suggestionType to \"none\", omit suggestedWord, and provide \
         an explanation.\n",
    );
    out
}

fn bullet_list(items: &[String], placeholder: &str) -> String {
    if items.is_empty() {
        return format!("{placeholder}\n");
    }
    items.iter().fold(String::new(), |mut acc, item| {
        let _ = writeln!(acc, "- {item}");
        acc
    })
}
