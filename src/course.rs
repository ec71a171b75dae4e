use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

static GLOSSARY_JSON: &str = include_str!("../data/glossary.json");
static PROMPTS_JSON: &str = include_str!("../data/prompts.json");

static GLOSSARY: Lazy<Vec<GlossaryEntry>> =
    Lazy::new(|| serde_json::from_str(GLOSSARY_JSON).expect("embedded glossary fixture parses"));
static PROMPTS: Lazy<Vec<PromptCategory>> =
    Lazy::new(|| serde_json::from_str(PROMPTS_JSON).expect("embedded prompt fixture parses"));
static TERM_DEFINITIONS: Lazy<HashMap<String, String>> =
    Lazy::new(|| term_definition_map(&GLOSSARY));

/// One glossary entry as authored in the course fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    pub term: String,
    pub korean_term: String,
    pub description: String,
    pub example: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptEntry {
    pub title: String,
    pub prompt: String,
    pub tip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptCategory {
    pub category: String,
    pub icon: String,
    pub prompts: Vec<PromptEntry>,
}

/// Read-only access to the embedded glossary.
pub struct Glossary;

impl Glossary {
    pub fn entries() -> &'static [GlossaryEntry] {
        &GLOSSARY
    }

    /// Case-insensitive substring filter across term, localized term,
    /// description, and example. An empty query returns every entry.
    pub fn search(query: &str) -> Vec<&'static GlossaryEntry> {
        let query = query.trim().to_lowercase();
        GLOSSARY
            .iter()
            .filter(|entry| {
                query.is_empty()
                    || entry.korean_term.to_lowercase().contains(&query)
                    || entry.term.to_lowercase().contains(&query)
                    || entry.description.to_lowercase().contains(&query)
                    || entry.example.to_lowercase().contains(&query)
            })
            .collect()
    }

    /// Localized term → description map used by the annotator and the
    /// tooltip API.
    pub fn definitions() -> &'static HashMap<String, String> {
        &TERM_DEFINITIONS
    }

    pub fn define(term: &str) -> Option<&'static str> {
        TERM_DEFINITIONS.get(term).map(String::as_str)
    }

    pub fn entry_by_term(term: &str) -> Option<&'static GlossaryEntry> {
        GLOSSARY
            .iter()
            .find(|entry| entry.korean_term == term || entry.term.eq_ignore_ascii_case(term))
    }
}

/// Read-only access to the embedded prompt library.
pub struct PromptLibrary;

impl PromptLibrary {
    pub fn categories() -> &'static [PromptCategory] {
        &PROMPTS
    }

    pub fn category(name: &str) -> Option<&'static PromptCategory> {
        PROMPTS.iter().find(|cat| cat.category == name)
    }
}

/// Builds the localized-term → description map. Duplicate localized terms
/// shadow last-wins; the collision is logged rather than rejected so a
/// fixture slip never takes the whole site down.
pub fn term_definition_map(entries: &[GlossaryEntry]) -> HashMap<String, String> {
    let mut map = HashMap::with_capacity(entries.len());
    for entry in entries {
        if let Some(previous) = map.insert(entry.korean_term.clone(), entry.description.clone()) {
            if previous != entry.description {
                warn!(term = %entry.korean_term, "duplicate localized glossary term; later entry wins");
            }
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(korean: &str, description: &str) -> GlossaryEntry {
        GlossaryEntry {
            term: korean.to_string(),
            korean_term: korean.to_string(),
            description: description.to_string(),
            example: String::new(),
        }
    }

    #[test]
    fn fixtures_parse() {
        assert!(!Glossary::entries().is_empty());
        assert!(!PromptLibrary::categories().is_empty());
        assert_eq!(Glossary::entries().len(), Glossary::definitions().len());
    }

    #[test]
    fn search_matches_any_field() {
        let by_korean = Glossary::search("환각");
        assert!(by_korean.iter().any(|e| e.korean_term == "환각"));

        let by_english = Glossary::search("hallucination");
        assert!(by_english.iter().any(|e| e.korean_term == "환각"));

        // "회의록" only appears in example text.
        let by_example = Glossary::search("학사 안내문");
        assert!(!by_example.is_empty());
    }

    #[test]
    fn search_empty_query_returns_all() {
        assert_eq!(Glossary::search("  ").len(), Glossary::entries().len());
    }

    #[test]
    fn search_no_match_returns_empty() {
        assert!(Glossary::search("zzz-no-such-term").is_empty());
    }

    #[test]
    fn duplicate_terms_shadow_last_wins() {
        let entries = vec![entry("중복", "first"), entry("중복", "second")];
        let map = term_definition_map(&entries);
        assert_eq!(map.len(), 1);
        assert_eq!(map["중복"], "second");
    }

    #[test]
    fn define_resolves_known_term() {
        let description = Glossary::define("프롬프트").expect("fixture term");
        assert!(description.contains("입력"));
        assert!(Glossary::define("없는 용어").is_none());
    }
}
