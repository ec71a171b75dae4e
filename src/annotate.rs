use crate::course::{GlossaryEntry, term_definition_map};
use regex::Regex;
use std::collections::HashMap;

/// Class carried by every injected marker; also the class the scanner treats
/// as an already-annotated container, which is what makes repeated passes
/// idempotent.
pub const MARKER_CLASS: &str = "tooltip-term";

/// Elements whose text content is never annotated: code and script blocks,
/// interactive controls, links, and headings.
const SKIPPED_CONTAINERS: &[&str] = &[
    "script", "style", "button", "a", "pre", "code", "textarea", "h1", "h2", "h3", "h4", "h5",
    "h6",
];

/// Void elements never receive a closing tag, so they must not be tracked as
/// open containers.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Finds glossary terms inside rendered fragment markup and wraps each
/// occurrence in an inert marker span.
pub struct TermAnnotator {
    pattern: Option<Regex>,
    definitions: HashMap<String, String>,
}

impl TermAnnotator {
    pub fn new(entries: &[GlossaryEntry]) -> Self {
        Self::from_definitions(term_definition_map(entries))
    }

    pub fn from_definitions(definitions: HashMap<String, String>) -> Self {
        let mut terms: Vec<&str> = definitions.keys().map(String::as_str).collect();
        // Longest term first so a term never loses to one of its prefixes.
        terms.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
        let pattern = if terms.is_empty() {
            None
        } else {
            let alternation = terms
                .iter()
                .map(|term| regex::escape(term))
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&format!(r"\b({alternation})\b")).expect("escaped terms form a valid pattern"))
        };
        Self {
            pattern,
            definitions,
        }
    }

    /// Resolves a marker's text back to its glossary description.
    pub fn definition(&self, term: &str) -> Option<&str> {
        self.definitions.get(term).map(String::as_str)
    }

    pub fn term_count(&self) -> usize {
        self.definitions.len()
    }

    /// Walks the markup and wraps every word-bounded term occurrence found in
    /// prose text. Text inside skipped containers and existing markers is
    /// left untouched, as is all tag markup.
    pub fn annotate(&self, html: &str) -> String {
        let Some(pattern) = &self.pattern else {
            return html.to_string();
        };
        let mut out = String::with_capacity(html.len() + html.len() / 4);
        let mut skip_stack: Vec<String> = Vec::new();
        let mut rest = html;

        while let Some(lt) = rest.find('<') {
            let (text, tail) = rest.split_at(lt);
            self.emit_text(pattern, text, &skip_stack, &mut out);

            let Some(gt) = tail.find('>') else {
                // Unterminated tag in trusted markup; pass it through.
                out.push_str(tail);
                return out;
            };
            let tag = &tail[..=gt];
            out.push_str(tag);
            track_tag(tag, &mut skip_stack);
            rest = &tail[gt + 1..];
        }
        self.emit_text(pattern, rest, &skip_stack, &mut out);
        out
    }

    fn emit_text(&self, pattern: &Regex, text: &str, skip_stack: &[String], out: &mut String) {
        if text.is_empty() {
            return;
        }
        if skip_stack.is_empty() {
            out.push_str(&pattern.replace_all(text, |caps: &regex::Captures<'_>| {
                format!(r#"<span class="{MARKER_CLASS}">{}</span>"#, &caps[0])
            }));
        } else {
            out.push_str(text);
        }
    }
}

fn track_tag(tag: &str, skip_stack: &mut Vec<String>) {
    let inner = tag.trim_start_matches('<').trim_end_matches('>');
    if inner.starts_with('!') || inner.starts_with('?') {
        return;
    }
    if let Some(name) = inner.strip_prefix('/') {
        let name = tag_name(name);
        if skip_stack.last().map(String::as_str) == Some(name.as_str()) {
            skip_stack.pop();
        }
        return;
    }
    let name = tag_name(inner);
    if name.is_empty() || VOID_ELEMENTS.contains(&name.as_str()) || inner.ends_with('/') {
        return;
    }
    if SKIPPED_CONTAINERS.contains(&name.as_str()) || has_marker_class(inner) {
        skip_stack.push(name);
    }
}

fn tag_name(inner: &str) -> String {
    inner
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn has_marker_class(inner: &str) -> bool {
    inner.contains(MARKER_CLASS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::GlossaryEntry;

    fn glossary(pairs: &[(&str, &str)]) -> Vec<GlossaryEntry> {
        pairs
            .iter()
            .map(|(term, description)| GlossaryEntry {
                term: term.to_string(),
                korean_term: term.to_string(),
                description: description.to_string(),
                example: String::new(),
            })
            .collect()
    }

    #[test]
    fn wraps_each_term_and_leaves_prose_alone() {
        let annotator = TermAnnotator::new(&glossary(&[("A", "d1"), ("B", "d2")]));
        let html = annotator.annotate("<p>A and B are related</p>");
        assert_eq!(
            html,
            "<p><span class=\"tooltip-term\">A</span> and <span class=\"tooltip-term\">B</span> are related</p>"
        );
    }

    #[test]
    fn annotation_is_idempotent() {
        let annotator = TermAnnotator::new(&glossary(&[("token", "unit of text")]));
        let once = annotator.annotate("<p>a token here</p>");
        let twice = annotator.annotate(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn skips_code_links_and_headings() {
        let annotator = TermAnnotator::new(&glossary(&[("token", "unit of text")]));
        let html = "<h2>token</h2><a href=\"#x\">token</a><code>token</code><p>token</p>";
        let out = annotator.annotate(html);
        assert_eq!(out.matches(MARKER_CLASS).count(), 1);
        assert!(out.ends_with("<p><span class=\"tooltip-term\">token</span></p>"));
    }

    #[test]
    fn nested_skip_containers_are_tracked() {
        let annotator = TermAnnotator::new(&glossary(&[("token", "unit of text")]));
        let html = "<pre><code>token</code> token</pre> token";
        let out = annotator.annotate(html);
        // Only the text outside the <pre> block is annotated.
        assert_eq!(out.matches(MARKER_CLASS).count(), 1);
        assert!(out.ends_with("<span class=\"tooltip-term\">token</span>"));
    }

    #[test]
    fn longer_term_wins_over_its_prefix() {
        let annotator = TermAnnotator::new(&glossary(&[
            ("프롬프트", "short"),
            ("프롬프트 엔지니어링", "long"),
        ]));
        let out = annotator.annotate("<p>프롬프트 엔지니어링</p>");
        assert_eq!(
            out,
            "<p><span class=\"tooltip-term\">프롬프트 엔지니어링</span></p>"
        );
    }

    #[test]
    fn word_boundaries_prevent_partial_matches() {
        let annotator = TermAnnotator::new(&glossary(&[("art", "definition")]));
        let out = annotator.annotate("<p>art is not partial</p>");
        assert_eq!(out.matches(MARKER_CLASS).count(), 1);
        assert!(out.contains("not partial"));
    }

    #[test]
    fn untouched_when_no_terms_match() {
        let annotator = TermAnnotator::new(&glossary(&[("token", "unit of text")]));
        let html = "<p>plain prose only</p>";
        assert_eq!(annotator.annotate(html), html);
    }

    #[test]
    fn empty_glossary_is_a_noop() {
        let annotator = TermAnnotator::new(&[]);
        let html = "<p>anything at all</p>";
        assert_eq!(annotator.annotate(html), html);
    }

    #[test]
    fn definition_round_trip() {
        let annotator = TermAnnotator::new(&glossary(&[("환각", "사실이 아닌 내용")]));
        assert_eq!(annotator.definition("환각"), Some("사실이 아닌 내용"));
        assert_eq!(annotator.definition("없음"), None);
    }

    #[test]
    fn input_is_void_and_does_not_poison_the_stack() {
        let annotator = TermAnnotator::new(&glossary(&[("token", "unit of text")]));
        let out = annotator.annotate("<input type=\"text\" /><p>token</p>");
        assert_eq!(out.matches(MARKER_CLASS).count(), 1);
    }
}
