// html2wikitext — serializer from annotated HTML back to wikitext.
//
// Architecture:
//   Parsoid HTML string → html5ever parse → rcdom tree → walker + handlers
//   → separator-constrained emission → post-pass stripping → wikitext
//
// The input DOM carries provenance on every node (data-parsoid: source
// offsets, original syntax; data-mw: template/extension envelopes). Full
// serialization re-emits everything from the tree; selective serialization
// (selser) reuses original source bytes for subtrees the edit never touched
// and re-emits only modified regions.

mod config;
mod dom;
mod error;
pub mod provenance;
mod serializer;

use std::fmt;
use std::sync::Arc;

use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, RcDom};

pub use config::WikiConfig;
pub use error::SerializeError;
pub use serializer::escape::{EscapeContext, EscapeOracle, TemplateArgEscape, WikitextEscaper};

/// Serialization options and environment.
#[derive(Clone)]
pub struct Options {
    /// Reuse original source bytes for unmodified subtrees.
    pub selser: bool,
    /// The wikitext the DOM was parsed from. Required for selser; also used
    /// to re-emit unmodified wrapper markup.
    pub original_source: Option<String>,
    /// Allow the post-passes to drop whitespace along with redundant guards.
    pub scrub_wikitext: bool,
    /// Wiki constants (tag classes, SOL-transparent recognizer).
    pub config: WikiConfig,
    /// Decides when emitted text needs nowiki guards.
    pub escaper: Arc<dyn EscapeOracle>,
    /// Second document searched for extension bodies referenced by id.
    pub edited_document: Option<Handle>,
    /// Caller oracle: is this node's original source still valid in the
    /// edited context? Absent means yes.
    pub selser_src_check: Option<Arc<dyn Fn(&Handle) -> bool>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            selser: false,
            original_source: None,
            scrub_wikitext: false,
            config: WikiConfig::default(),
            escaper: Arc::new(WikitextEscaper),
            edited_document: None,
            selser_src_check: None,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("selser", &self.selser)
            .field("original_source", &self.original_source)
            .field("scrub_wikitext", &self.scrub_wikitext)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Options {
    /// Create a new Options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable selective serialization.
    pub fn with_selser(mut self, selser: bool) -> Self {
        self.selser = selser;
        self
    }

    /// Provide the original wikitext source.
    pub fn with_original_source(mut self, source: impl Into<String>) -> Self {
        self.original_source = Some(source.into());
        self
    }

    /// Allow post-passes to scrub whitespace along with redundant guards.
    pub fn with_scrub_wikitext(mut self, scrub: bool) -> Self {
        self.scrub_wikitext = scrub;
        self
    }

    /// Replace the escape oracle.
    pub fn with_escaper(mut self, escaper: Arc<dyn EscapeOracle>) -> Self {
        self.escaper = escaper;
        self
    }

    /// Provide the edited document for cross-document body lookups.
    pub fn with_edited_document(mut self, document: Handle) -> Self {
        self.edited_document = Some(document);
        self
    }

    /// Install the selser source-validity oracle.
    pub fn with_selser_src_check(mut self, check: Arc<dyn Fn(&Handle) -> bool>) -> Self {
        self.selser_src_check = Some(check);
        self
    }
}

/// Serialize a Parsoid HTML string to wikitext using default options.
///
/// # Examples
///
/// ```
/// let wt = html2wikitext::serialize("<p>Hello, world!</p>").unwrap();
/// assert_eq!(wt, "Hello, world!");
/// ```
pub fn serialize(html: &str) -> Result<String, SerializeError> {
    serialize_with(html, &Options::default())
}

/// Serialize a Parsoid HTML string to wikitext with custom options.
///
/// # Examples
///
/// ```
/// use html2wikitext::{serialize_with, Options};
///
/// let original = "''foo''";
/// let html = r#"<i data-parsoid='{"dsr":[0,7,2,2],"stx":"wiki"}'>foo</i>"#;
/// let options = Options::new().with_selser(true).with_original_source(original);
/// assert_eq!(serialize_with(html, &options).unwrap(), original);
/// ```
pub fn serialize_with(html: &str, options: &Options) -> Result<String, SerializeError> {
    let body = parse_html(html)?;
    serialize_dom(&body, options)
}

/// Serialize an already-parsed `<body>` (or any container element).
pub fn serialize_dom(body: &Handle, options: &Options) -> Result<String, SerializeError> {
    if options.selser && options.original_source.is_none() {
        return Err(SerializeError::MissingOriginalSource);
    }

    let mut state = serializer::State::new(options, body.clone(), true);
    state.selser_mode = options.selser;
    serializer::walker::serialize_children(&mut state, body);

    let out = std::mem::take(&mut state.out);
    Ok(serializer::strip::postprocess(out, &state))
}

/// Parse a Parsoid HTML string and return its `<body>`.
pub fn parse_html(html: &str) -> Result<Handle, SerializeError> {
    let rcdom: RcDom = html5ever::parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .one(html.as_bytes());
    dom::find_body(&rcdom.document).ok_or(SerializeError::MissingBody)
}
