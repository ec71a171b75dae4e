pub mod annotate;
pub mod course;
pub mod progress;
pub mod router;
pub mod tooltip;
#[cfg(feature = "web")]
pub mod web;

pub use annotate::TermAnnotator;
pub use course::{Glossary, GlossaryEntry, PromptCategory, PromptEntry, PromptLibrary};
pub use progress::{NewUser, ProgressRecord, ProgressStore, ProgressUpdate, RegisterError, User};
pub use router::{ContentRouter, DEFAULT_TOKEN, EmbeddedFragments, FragmentError, FragmentSource};
pub use tooltip::{Placement, Rect, Size, TooltipPresenter, Viewport};
