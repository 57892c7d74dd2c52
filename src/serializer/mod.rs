// DOM → wikitext serializer.
//
// Walks a Parsoid-annotated DOM and emits wikitext. All output funnels
// through [`State::emit`]: the pending inter-node separator resolves first,
// then boundary guards and escaping apply, then the chunk lands in the
// buffer. Nothing writes to the output string directly.

pub(crate) mod attributes;
pub(crate) mod chunk;
pub(crate) mod escape;
pub(crate) mod handlers;
pub(crate) mod selser;
pub(crate) mod separators;
pub(crate) mod strip;
pub(crate) mod templates;
pub(crate) mod walker;

use markup5ever_rcdom::Handle;

use crate::Options;
use chunk::Chunk;
use escape::EscapeContext;
use separators::Separator;

/// Stack of "single-line only" regions (heading bodies, list items, table
/// cell attributes). While one is in force, separator resolution never
/// expands to newlines. Selser reuse temporarily lifts the restriction for
/// structures whose reused source legitimately spans lines.
#[derive(Debug, Default)]
pub(crate) struct SingleLineContext {
    depth: usize,
    suppressed: usize,
}

impl SingleLineContext {
    pub(crate) fn enforce(&mut self) {
        self.depth += 1;
    }

    pub(crate) fn pop(&mut self) {
        debug_assert!(self.depth > 0, "unbalanced single-line context");
        self.depth = self.depth.saturating_sub(1);
    }

    pub(crate) fn suppress(&mut self) {
        self.suppressed += 1;
    }

    pub(crate) fn restore(&mut self) {
        debug_assert!(self.suppressed > 0, "unbalanced single-line suppression");
        self.suppressed = self.suppressed.saturating_sub(1);
    }

    pub(crate) fn enforced(&self) -> bool {
        self.depth > 0 && self.suppressed == 0
    }
}

/// Serializer state. One instance per `serialize` call; handlers receive it
/// by mutable reference and never share it across documents.
pub(crate) struct State<'a> {
    pub opts: &'a Options,
    /// The body being serialized, for `body.id` lookups.
    pub root: Handle,

    pub out: String,
    /// Byte offset of the current (unterminated) line in `out`.
    line_start: usize,
    /// What `on_sol` reports while `out` is still empty.
    sol_start: bool,

    pub escape_text: bool,
    pub in_no_wiki: bool,
    pub in_html_pre: bool,
    pub in_indent_pre: bool,
    pub in_attribute: bool,

    pub selser_mode: bool,
    pub in_modified_content: bool,
    pub curr_node_unmodified: bool,
    pub prev_node_unmodified: bool,

    pub sep: Separator,
    pub single_line: SingleLineContext,

    pub has_indent_pre_nowikis: bool,
    pub has_quote_nowikis: bool,
    pub has_self_closing_nowikis: bool,

    /// Direction of the quote marker emitted last, if the previous chunk was
    /// one. Drives the guard decision between adjacent quote runs.
    last_quote_edge: Option<QuoteEdge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteEdge {
    Open,
    Close,
}

impl<'a> State<'a> {
    pub(crate) fn new(opts: &'a Options, root: Handle, sol_start: bool) -> Self {
        Self {
            opts,
            root,
            out: String::new(),
            line_start: 0,
            sol_start,
            escape_text: false,
            in_no_wiki: false,
            in_html_pre: false,
            in_indent_pre: false,
            in_attribute: false,
            selser_mode: false,
            in_modified_content: false,
            curr_node_unmodified: false,
            prev_node_unmodified: false,
            sep: Separator::default(),
            single_line: SingleLineContext::default(),
            has_indent_pre_nowikis: false,
            has_quote_nowikis: false,
            has_self_closing_nowikis: false,
            last_quote_edge: None,
        }
    }

    /// Whether the next character would appear at start-of-line.
    pub(crate) fn on_sol(&self) -> bool {
        if self.out.is_empty() {
            self.sol_start
        } else {
            self.out.ends_with('\n')
        }
    }

    /// The unterminated tail of the output buffer.
    pub(crate) fn current_line(&self) -> &str {
        &self.out[self.line_start..]
    }

    fn push_raw(&mut self, text: &str) {
        if let Some(pos) = text.rfind('\n') {
            self.line_start = self.out.len() + pos + 1;
        }
        self.out.push_str(text);
    }

    /// Append a chunk. The pending separator resolves first; a `<nowiki/>`
    /// guard goes in when the chunk's left boundary would fuse with the
    /// buffer's last character; text chunks route through the escape oracle
    /// while `escape_text` is set.
    pub(crate) fn emit(&mut self, chunk: Chunk, _node: &Handle) {
        let sep = separators::resolve(self);
        self.push_raw(&sep);

        if let Some(prev) = self.out.chars().next_back() {
            if chunk.left().collides_with(prev) && self.quote_guard_applies(&chunk) {
                self.push_raw("<nowiki/>");
                self.has_self_closing_nowikis = true;
                if prev == '\'' {
                    self.has_quote_nowikis = true;
                }
            }
        }
        self.last_quote_edge = match &chunk {
            Chunk::QuoteMarker { opening, .. } => {
                Some(if *opening { QuoteEdge::Open } else { QuoteEdge::Close })
            }
            other if other.text().is_empty() => self.last_quote_edge,
            _ => None,
        };

        let text = if self.escape_text && !self.in_no_wiki && !self.in_html_pre {
            let ctx = EscapeContext {
                on_sol: self.on_sol(),
                in_attribute: self.in_attribute,
                in_single_line: self.single_line.enforced(),
                current_line: self.current_line().to_string(),
            };
            self.opts.escaper.escape_text(&ctx, chunk.text())
        } else {
            chunk.text().to_string()
        };
        self.note_nowiki_markers(&text);
        self.push_raw(&text);
    }

    /// Whether a colliding quote join actually needs the guard. Marker runs
    /// that extend the same nested construct (`'''` + `''`) fuse into the
    /// valid five-quote form; only a close marker meeting an open marker, or
    /// a marker meeting non-marker text, is ambiguous.
    fn quote_guard_applies(&self, chunk: &Chunk) -> bool {
        match (chunk, self.last_quote_edge) {
            (Chunk::QuoteMarker { opening: true, .. }, Some(QuoteEdge::Close)) => true,
            (Chunk::QuoteMarker { .. }, Some(_)) => false,
            _ => true,
        }
    }

    /// Append generated markup (never escaped).
    pub(crate) fn emit_markup(&mut self, text: impl Into<String>, node: &Handle) {
        debug_assert!(!self.escape_text, "markup emitted while escape_text set");
        self.emit(Chunk::plain(text), node);
    }

    /// Record which post-pass triggers the emitted text contains.
    fn note_nowiki_markers(&mut self, text: &str) {
        if !text.contains("<nowiki") {
            return;
        }
        if text.contains("<nowiki/>") {
            self.has_self_closing_nowikis = true;
            if text.contains("'<nowiki/>")
                || text.contains("<nowiki/>'")
                || self.out.ends_with('\'')
            {
                self.has_quote_nowikis = true;
            }
        }
        if let Some(idx) = text.find("<nowiki>") {
            let rest = &text[idx + "<nowiki>".len()..];
            if rest.starts_with([' ', '\t']) {
                self.has_indent_pre_nowikis = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom;
    use html5ever::tendril::TendrilSink;

    fn body() -> Handle {
        let dom = html5ever::parse_document(
            markup5ever_rcdom::RcDom::default(),
            Default::default(),
        )
        .from_utf8()
        .one("<p>x</p>".as_bytes());
        dom::find_body(&dom.document).unwrap()
    }

    #[test]
    fn sol_tracks_trailing_newline() {
        let opts = Options::default();
        let root = body();
        let mut state = State::new(&opts, root.clone(), true);
        assert!(state.on_sol());
        state.emit_markup("foo", &root);
        assert!(!state.on_sol());
        state.emit_markup("bar\n", &root);
        assert!(state.on_sol());
        assert_eq!(state.current_line(), "");
    }

    #[test]
    fn quote_boundary_gets_guard() {
        let opts = Options::default();
        let root = body();
        let mut state = State::new(&opts, root.clone(), true);
        state.emit_markup("foo'", &root);
        state.emit(Chunk::bounded("''bar''"), &root);
        assert_eq!(state.out, "foo'<nowiki/>''bar''");
        assert!(state.has_quote_nowikis);
    }

    #[test]
    fn pending_separator_resolves_before_chunk() {
        let opts = Options::default();
        let root = body();
        let mut state = State::new(&opts, root.clone(), true);
        state.emit_markup("a", &root);
        state.sep.spec = separators::SepSpec::new(2, 2);
        state.emit_markup("b", &root);
        assert_eq!(state.out, "a\n\nb");
    }
}
