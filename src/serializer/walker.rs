// The DOM walker: document-order traversal, per-node-kind dispatch, and text
// emission. All chunks a node's subtree produces land before any chunk of a
// later sibling; the separator between them resolves exactly once.

use std::sync::LazyLock;

use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, RcDom};
use regex::Regex;

use super::chunk::Chunk;
use super::escape::escape_entities;
use super::handlers;
use super::selser;
use super::separators;
use super::State;
use crate::dom;
use crate::provenance;

/// How the walker advances after serializing a node.
pub(crate) enum NextNode {
    /// Continue with the natural next sibling.
    Sibling,
    /// Continue from this node (an envelope was skipped).
    To(Handle),
    /// Nothing left at this level.
    Done,
}

/// Serialize all children of a node, in document order.
pub(crate) fn serialize_children(state: &mut State, parent: &Handle) {
    let children = dom::child_nodes(parent);
    let mut idx = 0;
    while idx < children.len() {
        let child = children[idx].clone();
        match serialize_node(state, &child) {
            NextNode::Sibling => idx += 1,
            NextNode::To(next) => {
                match children.iter().position(|c| dom::same_node(c, &next)) {
                    Some(pos) => idx = pos,
                    None => break,
                }
            }
            NextNode::Done => break,
        }
    }
}

/// Serialize one node.
pub(crate) fn serialize_node(state: &mut State, node: &Handle) -> NextNode {
    if let Some(text) = dom::text_value(node) {
        if absorbed_as_separator(state, node, &text) {
            separators::push_src(state, &text);
        } else {
            serialize_text(state, node, text);
        }
        return NextNode::Sibling;
    }

    if let Some(comment) = dom::comment_value(node) {
        // Comments are invisible to wiki layout; they travel with the
        // separator.
        separators::push_src(state, &format!("<!--{comment}-->"));
        return NextNode::Sibling;
    }

    if !dom::is_element(node) {
        return NextNode::Sibling;
    }

    if provenance::is_diff_marker_meta(node) {
        // A marker invalidates the adjacency it stands on.
        state.prev_node_unmodified = false;
        return NextNode::Sibling;
    }

    state.curr_node_unmodified = false;
    let marks = provenance::diff_marks(node);

    let prev = significant_prev(node);
    separators::update_constraints(state, prev.as_ref(), Some(node));

    let advance = if let Some(advance) = selser::try_reuse(state, node, &marks) {
        advance
    } else {
        let dp = provenance::data_parsoid(node);
        if let Some(src) = &dp.li_hack_src {
            state.emit_markup(src.clone(), node);
        }

        let wrapper_unmod = selser::wrapper_unmodified(state, node, &marks, &dp);
        if wrapper_unmod {
            state.curr_node_unmodified = true;
        }

        let handler = handlers::resolve(state, node);
        let entered_modified = state.selser_mode && marks.any() && !state.in_modified_content;
        if entered_modified {
            state.in_modified_content = true;
        }
        let advance = handler.handle(state, node, wrapper_unmod);
        if entered_modified {
            state.in_modified_content = false;
        }
        advance
    };

    let next = significant_next(node);
    separators::update_constraints(state, Some(node), next.as_ref());

    state.prev_node_unmodified = state.curr_node_unmodified;
    advance
}

// ---------------------------------------------------------------------------
// Text emission
// ---------------------------------------------------------------------------

static DOUBLE_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n+").expect("double-newline pattern"));
static TRAILING_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*$").expect("trailing-newline pattern"));
static LEADING_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t]*\n+\s*").expect("leading-newline pattern"));

fn serialize_text(state: &mut State, node: &Handle, text: String) {
    let mut text = text;

    let double_newline_count = DOUBLE_NEWLINES.find_iter(&text).count();

    // Trailing newlines become the next separator's candidate source.
    let mut captured_sep = None;
    if let Some(m) = TRAILING_NEWLINES.find(&text) {
        captured_sep = Some(text[m.start()..].to_string());
        text.truncate(m.start());
    }

    if !state.in_indent_pre {
        // Inside HTML pre, a lone blank line in pure-text content is layout
        // the author wrote; everywhere else blank runs collapse.
        let keep_blank_line = state.in_html_pre
            && double_newline_count == 1
            && parent_children_all_text(node);
        if !keep_blank_line {
            text = DOUBLE_NEWLINES.replace_all(&text, "\n").into_owned();
        }
        // Leading newline runs were already consumed by the preceding
        // separator.
        text = LEADING_NEWLINES.replace(&text, "").into_owned();
    }

    let mut text = escape_entities(&text);
    if state.in_no_wiki {
        text = text.replace("</nowiki>", "&lt;/nowiki&gt;");
    }

    state.escape_text = (state.on_sol() || !state.curr_node_unmodified)
        && !state.in_no_wiki
        && !state.in_html_pre;
    if !text.is_empty() {
        state.emit(Chunk::plain(text), node);
    }
    state.escape_text = false;

    if let Some(sep) = captured_sep {
        if state.sep.src.is_none() {
            state.sep.src = Some(sep);
        }
        // A separator that already has source keeps it; the stripped
        // newlines are dropped.
    }
}

fn parent_children_all_text(node: &Handle) -> bool {
    match dom::parent(node) {
        Some(parent) => dom::child_nodes(&parent).iter().all(dom::is_text),
        None => true,
    }
}

/// Whitespace-only text between block-level siblings is layout, not content;
/// it folds into the separator instead of being emitted.
fn absorbed_as_separator(state: &State, node: &Handle, text: &str) -> bool {
    if !text.chars().all(char::is_whitespace) {
        return false;
    }
    if state.in_html_pre || state.in_indent_pre || state.in_no_wiki {
        return false;
    }
    let block_side = |side: Option<Handle>| match side {
        Some(el) => dom::tag_name(&el).is_some_and(|t| state.opts.config.is_block(t)),
        None => dom::parent(node).is_some_and(|p| {
            dom::tag_name(&p).is_some_and(|t| t == "body" || state.opts.config.is_block(t))
        }),
    };
    block_side(significant_prev(node)) && block_side(significant_next(node))
}

/// Nearest preceding sibling that will produce output: elements and
/// non-whitespace text. Whitespace, comments, and diff markers are separator
/// material.
fn significant_prev(node: &Handle) -> Option<Handle> {
    let mut prev = dom::prev_sibling(node);
    while let Some(p) = prev {
        if is_significant(&p) {
            return Some(p);
        }
        prev = dom::prev_sibling(&p);
    }
    None
}

fn significant_next(node: &Handle) -> Option<Handle> {
    let mut next = dom::next_sibling(node);
    while let Some(n) = next {
        if is_significant(&n) {
            return Some(n);
        }
        next = dom::next_sibling(&n);
    }
    None
}

fn is_significant(node: &Handle) -> bool {
    if provenance::is_diff_marker_meta(node) || dom::is_comment(node) {
        return false;
    }
    match dom::text_value(node) {
        Some(text) => !text.chars().all(char::is_whitespace),
        None => dom::is_element(node),
    }
}

// ---------------------------------------------------------------------------
// Nested serialization
// ---------------------------------------------------------------------------

/// Serialize the children of an existing node into a fresh buffer, keeping
/// the main document for id lookups. Used for link text and extension bodies.
pub(crate) fn serialize_children_to_string(
    state: &mut State,
    node: &Handle,
    sol_start: bool,
) -> String {
    let mut nested = State::new(state.opts, state.root.clone(), sol_start);
    serialize_children(&mut nested, node);
    merge_nested_flags(state, &nested);
    nested.out
}

/// Parse an HTML fragment (a `data-mw` body or attribute value) and
/// serialize it, starting off-SOL.
pub(crate) fn serialize_nested_html(state: &mut State, html: &str, in_attribute: bool) -> String {
    let rcdom: RcDom = html5ever::parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .one(html.as_bytes());
    let body = match dom::find_body(&rcdom.document) {
        Some(body) => body,
        None => return String::new(),
    };
    let mut nested = State::new(state.opts, body.clone(), false);
    nested.in_attribute = in_attribute;
    serialize_children(&mut nested, &body);
    merge_nested_flags(state, &nested);
    nested.out
}

pub(crate) fn merge_nested_flags(state: &mut State, nested: &State) {
    state.has_indent_pre_nowikis |= nested.has_indent_pre_nowikis;
    state.has_quote_nowikis |= nested.has_quote_nowikis;
    state.has_self_closing_nowikis |= nested.has_self_closing_nowikis;
}
