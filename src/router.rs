use crate::course::{Glossary, GlossaryEntry, PromptLibrary};
use include_dir::{Dir, include_dir};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Token used whenever a navigation target is unknown or absent.
pub const DEFAULT_TOKEN: &str = "introduction";

/// Static navigation-token → fragment-path table.
static ROUTES: &[(&str, &str)] = &[
    ("introduction", "pages/introduction.html"),
    ("core_principles", "pages/core_principles.html"),
    ("4d_framework", "pages/4d_framework.html"),
    ("delegation", "pages/delegation.html"),
    ("description", "pages/description.html"),
    ("discernment", "pages/discernment.html"),
    ("diligence", "pages/diligence.html"),
    ("use_cases", "pages/use_cases_korea.html"),
    ("prompt_library", "pages/prompt_library.html"),
    ("glossary", "pages/glossary.html"),
];

static PAGES: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/pages");

/// Resolves a navigation token to its fragment path, falling back to the
/// default token for anything unknown. A resolve miss is recovery, not an
/// error.
pub fn resolve(token: &str) -> &'static str {
    let token = token.trim_start_matches('#');
    ROUTES
        .iter()
        .find(|(key, _)| *key == token)
        .or_else(|| ROUTES.iter().find(|(key, _)| *key == DEFAULT_TOKEN))
        .map(|(_, path)| *path)
        .expect("route table contains the default token")
}

pub fn routes() -> &'static [(&'static str, &'static str)] {
    ROUTES
}

#[derive(Debug)]
pub enum FragmentError {
    NotFound(String),
    Unreadable(String),
}

impl fmt::Display for FragmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FragmentError::NotFound(path) => write!(f, "페이지를 찾을 수 없습니다: {path}"),
            FragmentError::Unreadable(path) => {
                write!(f, "페이지를 불러오는 데 실패했습니다: {path}")
            }
        }
    }
}

impl std::error::Error for FragmentError {}

/// Where fragments come from. The production source is the embedded pages
/// directory; tests substitute fakes (including failing ones).
pub trait FragmentSource: Send + Sync {
    fn fetch(&self, path: &str) -> Result<String, FragmentError>;
}

/// Fragments compiled into the binary, mirroring how the course data itself
/// is embedded.
pub struct EmbeddedFragments;

impl FragmentSource for EmbeddedFragments {
    fn fetch(&self, path: &str) -> Result<String, FragmentError> {
        let relative = path.strip_prefix("pages/").unwrap_or(path);
        let file = PAGES
            .get_file(relative)
            .ok_or_else(|| FragmentError::NotFound(path.to_string()))?;
        file.contents_utf8()
            .map(str::to_string)
            .ok_or_else(|| FragmentError::Unreadable(path.to_string()))
    }
}

/// Owns the content region: resolves navigation tokens, loads fragments, runs
/// fragment initializers, and replaces the region wholesale. Each navigation
/// carries a monotonically increasing sequence number; a result whose number
/// is no longer the latest issued is discarded so a slow early fetch can
/// never clobber newer content.
pub struct ContentRouter {
    source: Box<dyn FragmentSource>,
    region: RwLock<Region>,
    issued: AtomicU64,
}

struct Region {
    html: String,
    seq: u64,
}

impl ContentRouter {
    pub fn new(source: Box<dyn FragmentSource>) -> Self {
        Self {
            source,
            region: RwLock::new(Region {
                html: String::new(),
                seq: 0,
            }),
            issued: AtomicU64::new(0),
        }
    }

    pub fn embedded() -> Self {
        Self::new(Box::new(EmbeddedFragments))
    }

    /// Resolve, load, initialize, and commit in one step. Fetch failures are
    /// converted into a rendered, localized error panel; they never escape to
    /// the caller. The caller always receives the fragment it asked for, even
    /// when a newer navigation supersedes the region commit.
    pub fn navigate(&self, token: &str) -> String {
        let ticket = self.begin();
        let html = self.load(token);
        self.commit(ticket, html.clone());
        html
    }

    /// Issues a sequence number for a navigation about to start.
    pub fn begin(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Fetches and initializes the fragment for a token without touching the
    /// region.
    pub fn load(&self, token: &str) -> String {
        let path = resolve(token);
        match self.source.fetch(path) {
            Ok(body) => initialize_fragment(path, body),
            Err(err) => {
                warn!(token, path, error = %err, "fragment load failed");
                error_panel(&err.to_string())
            }
        }
    }

    /// Replaces the region with `html` unless a newer navigation has been
    /// issued since `ticket`; stale results are dropped and the current
    /// region content is returned instead. This only settles what the shared
    /// region holds; each caller responds with its own loaded fragment.
    pub fn commit(&self, ticket: u64, html: String) -> String {
        let mut region = self.region.write();
        if ticket != self.issued.load(Ordering::SeqCst) || ticket < region.seq {
            debug!(ticket, "discarding stale navigation result");
            return region.html.clone();
        }
        region.seq = ticket;
        region.html = html;
        region.html.clone()
    }

    /// Current content of the region.
    pub fn current(&self) -> String {
        self.region.read().html.clone()
    }
}

/// Dispatches to the initializer matching the fragment, selected by substring
/// of the resolved path. Fragments without an initializer pass through
/// verbatim.
fn initialize_fragment(path: &str, body: String) -> String {
    if path.contains("glossary") {
        inject_into(
            &body,
            "glossary-container",
            &render_glossary_cards(&Glossary::entries().iter().collect::<Vec<_>>()),
        )
    } else if path.contains("prompt_library") {
        inject_into(&body, "prompt-library-container", &render_prompt_cards())
    } else if path.contains("4d_framework") {
        wire_framework_cards(&body)
    } else {
        body
    }
}

/// Inserts `content` just inside the element carrying `id="{anchor_id}"`.
/// No-ops when the anchor is absent from the fragment.
fn inject_into(html: &str, anchor_id: &str, content: &str) -> String {
    let needle = format!("id=\"{anchor_id}\"");
    let Some(attr_pos) = html.find(&needle) else {
        return html.to_string();
    };
    let Some(tag_end) = html[attr_pos..].find('>') else {
        return html.to_string();
    };
    let insert_at = attr_pos + tag_end + 1;
    let mut out = String::with_capacity(html.len() + content.len());
    out.push_str(&html[..insert_at]);
    out.push_str(content);
    out.push_str(&html[insert_at..]);
    out
}

/// Renders the glossary card list, or the localized empty state when the
/// filtered set is empty.
pub fn render_glossary_cards(entries: &[&GlossaryEntry]) -> String {
    if entries.is_empty() {
        return r#"<p class="text-center text-slate-500 py-8">검색 결과가 없습니다.</p>"#
            .to_string();
    }
    entries
        .iter()
        .map(|entry| {
            format!(
                r#"<div class="content-card p-6 mb-6 prose max-w-none">
  <h3 class="text-xl font-bold text-blue-700 mt-0 mb-2">{korean} <span class="text-base font-normal text-slate-500 ml-2">{term}</span></h3>
  <p class="text-slate-700 mb-4 mt-0">{description}</p>
  <div class="bg-slate-100 p-4 rounded-lg not-prose">
    <p class="font-bold text-sm text-slate-600 mb-2">활용 예시 (한국 대학 환경)</p>
    <p class="text-slate-600 text-sm leading-relaxed">{example}</p>
  </div>
</div>
"#,
                korean = entry.korean_term,
                term = entry.term,
                description = entry.description,
                example = entry.example.replace('\n', "<br>"),
            )
        })
        .collect()
}

/// Renders the categorized prompt cards, each with its copy-to-clipboard
/// affordance.
pub fn render_prompt_cards() -> String {
    let categories = PromptLibrary::categories();
    if categories.is_empty() {
        return r#"<div class="text-center py-10"><p>준비된 프롬프트가 없습니다.</p></div>"#
            .to_string();
    }
    let mut html = String::new();
    for category in categories {
        html.push_str(&format!(
            r#"<div class="mb-12">
<h2 class="section-title text-2xl border-blue-500 mb-6 flex items-center" data-icon="{icon}">{name}</h2>
"#,
            icon = category.icon,
            name = category.category,
        ));
        for prompt in &category.prompts {
            html.push_str(&format!(
                r#"<div class="content-card p-6 mb-4 prompt-container">
  <h4 class="text-lg font-semibold text-blue-800 mb-2">{title}</h4>
  <div class="bg-slate-100 p-4 rounded-lg relative">
    <pre class="text-slate-700 font-mono text-sm whitespace-pre-wrap">{prompt}</pre>
  </div>
  <div class="mt-4 flex justify-between items-center gap-4">
    <p class="text-sm text-slate-500 flex-1"><strong class="font-semibold text-slate-600">활용 팁:</strong> {tip}</p>
    <button class="copy-btn btn-primary py-1.5 px-3 text-xs flex items-center shrink-0"><span>복사하기</span></button>
  </div>
</div>
"#,
                title = prompt.title,
                prompt = prompt.prompt,
                tip = prompt.tip,
            ));
        }
        html.push_str("</div>\n");
    }
    html
}

static FRAMEWORK_TARGET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"data-target="([A-Za-z0-9_]+)""#).expect("framework target pattern is valid")
});

/// Rewrites framework cards so a click re-routes to the card's target token.
fn wire_framework_cards(html: &str) -> String {
    FRAMEWORK_TARGET
        .replace_all(html, r##"data-target="$1" onclick="window.location.hash='#$1'""##)
        .into_owned()
}

/// Localized error panel with the failure reason and a link back to the
/// default token.
fn error_panel(reason: &str) -> String {
    format!(
        r##"<div class="text-center py-20">
  <h1 class="text-2xl font-bold text-red-600">오류 발생</h1>
  <p class="mt-4 text-slate-600">{reason}</p>
  <a href="#{DEFAULT_TOKEN}" class="mt-6 inline-block bg-blue-600 text-white px-6 py-2 rounded-lg hover:bg-blue-700">홈으로 돌아가기</a>
</div>"##
    )
}
