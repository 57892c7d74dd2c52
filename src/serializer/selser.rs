// Selective serialization: verbatim reuse of original source bytes for
// subtrees the edit never touched.
//
// A qualifying node short-circuits its handler entirely; its source span is
// emitted as constrained text so neighboring emissions know what boundary
// characters they are up against.

use markup5ever_rcdom::Handle;
use tracing::{trace, warn};

use super::chunk::Chunk;
use super::walker::NextNode;
use super::State;
use crate::dom;
use crate::provenance::{self, DataParsoid, DiffMarks};

/// Tags whose zero-width DSR is legitimate: implicit paragraphs, line
/// breaks, and auto-inserted list containers.
const ZERO_WIDTH_OK: &[&str] = &["p", "br", "ol"];

/// Try to emit the node from original source bytes. Returns the walker
/// advance on success, None when the node has to be serialized in full.
pub(crate) fn try_reuse(state: &mut State, node: &Handle, marks: &DiffMarks) -> Option<NextNode> {
    if !state.selser_mode || state.in_modified_content {
        return None;
    }
    if marks.any() {
        return None;
    }
    if let Some(check) = &state.opts.selser_src_check {
        if !check(node) {
            return None;
        }
    }

    let dp = provenance::data_parsoid(node);
    let dsr = dp.dsr?;
    if !dsr.is_valid() {
        trace!("invalid dsr, no selser reuse");
        return None;
    }
    let tag = dom::tag_name(node).unwrap_or_default();
    if dsr.is_zero_width() && !ZERO_WIDTH_OK.contains(&tag) && !dp.fostered && !dp.misnested {
        return None;
    }

    let source = state.opts.original_source.as_deref()?;
    let (start, end) = dsr.span()?;
    let src = match source.get(start..end) {
        Some(src) => src.to_string(),
        None => {
            warn!(start, end, "dsr out of range for original source");
            return None;
        }
    };

    // Reused source for these structures legitimately spans lines even when
    // an enclosing region is single-line.
    let lift_single_line = dom::is_first_encapsulation_wrapper(node)
        || top_level_list(state, node)
        || table_sole_child_of_dd(node);

    // Mark before emitting so separator resolution sees an
    // unmodified-to-unmodified boundary and keeps original separator bytes.
    state.curr_node_unmodified = true;

    if lift_single_line {
        state.single_line.suppress();
    }
    state.emit(Chunk::bounded(src), node);
    if lift_single_line {
        state.single_line.restore();
    }

    if dom::is_first_encapsulation_wrapper(node) {
        // The reused span covers the whole envelope.
        return Some(match dom::skip_about_siblings(node) {
            Some(next) => NextNode::To(next),
            None => NextNode::Done,
        });
    }
    Some(NextNode::Sibling)
}

fn top_level_list(state: &State, node: &Handle) -> bool {
    let tag = match dom::tag_name(node) {
        Some(tag) => tag,
        None => return false,
    };
    state.opts.config.is_list(tag)
        && dom::parent(node).is_some_and(|p| dom::is_element_named(&p, "body"))
}

fn table_sole_child_of_dd(node: &Handle) -> bool {
    if !dom::is_element_named(node, "table") {
        return false;
    }
    let parent = match dom::parent(node) {
        Some(parent) => parent,
        None => return false,
    };
    dom::is_element_named(&parent, "dd")
        && dom::child_nodes(&parent)
            .iter()
            .filter(|c| dom::is_element(c))
            .count()
            == 1
}

/// Whether only the subtree below the node changed, with wrapper markup that
/// can come back verbatim from the source. Cell and row widths are always
/// trustworthy; other tags need both recorded widths and no auto-inserted
/// markup.
pub(crate) fn wrapper_unmodified(
    state: &State,
    node: &Handle,
    marks: &DiffMarks,
    dp: &DataParsoid,
) -> bool {
    if !state.selser_mode || state.in_modified_content || !marks.only_subtree_changed() {
        return false;
    }
    let dsr = match dp.dsr {
        Some(dsr) if dsr.is_valid() => dsr,
        _ => return false,
    };
    let tag = dom::tag_name(node).unwrap_or_default();
    if matches!(tag, "td" | "th" | "tr") {
        return true;
    }
    dsr.has_valid_widths() && !dp.auto_inserted_start && !dp.auto_inserted_end
}
