// The separator engine.
//
// Between any two emitted nodes there is one logical separator. Both
// neighbors' handlers declare what they need (min/max newlines, SOL), the
// constraints merge, and the pending separator resolves the moment the next
// chunk is emitted. Original inter-node whitespace and comments are kept as
// the separator when they satisfy the merged constraints.

use markup5ever_rcdom::Handle;
use tracing::trace;

use super::handlers;
use super::State;
use crate::dom;
use crate::provenance;

/// One side of a separator contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SepSpec {
    pub min: Option<u8>,
    pub max: Option<u8>,
    pub force_sol: bool,
}

impl SepSpec {
    pub(crate) const NONE: SepSpec = SepSpec {
        min: None,
        max: None,
        force_sol: false,
    };

    pub(crate) fn new(min: u8, max: u8) -> SepSpec {
        SepSpec {
            min: Some(min),
            max: Some(max),
            force_sol: false,
        }
    }

    pub(crate) fn sol(min: u8, max: u8) -> SepSpec {
        SepSpec {
            min: Some(min),
            max: Some(max),
            force_sol: true,
        }
    }
}

/// Merge the two sides of a boundary. Minimums take the larger value,
/// maximums the smaller; an infeasible merge resolves by letting `min` win.
pub(crate) fn combine(a: SepSpec, b: SepSpec) -> SepSpec {
    let min = match (a.min, b.min) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, y) => x.or(y),
    };
    let max = match (a.max, b.max) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, y) => x.or(y),
    };
    let max = match (min, max) {
        (Some(lo), Some(hi)) if lo > hi => Some(lo),
        _ => max,
    };
    SepSpec {
        min,
        max,
        force_sol: a.force_sol || b.force_sol,
    }
}

/// Which structural relation a separator sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SepType {
    Sibling,
    ParentChild,
    ChildParent,
}

/// The pending separator between the last emitted node and the next.
#[derive(Debug, Clone, Default)]
pub(crate) struct Separator {
    pub spec: SepSpec,
    /// Candidate literal text (whitespace/comments) reused from the source.
    pub src: Option<String>,
    pub sep_type: Option<SepType>,
}

/// Update the pending separator constraints for the boundary between `a`
/// and `b`. Either side may be absent, in which case the parent stands in
/// (first-child / last-child contracts). Called from both sides of every
/// boundary; the merge is idempotent, so that is harmless.
pub(crate) fn update_constraints(state: &mut State, a: Option<&Handle>, b: Option<&Handle>) {
    let (spec_a, spec_b, sep_type) = match (a, b) {
        (Some(a), Some(b)) => {
            if let Some(parent) = dom::parent(b) {
                if dom::same_node(a, &parent) {
                    (
                        side_spec(state, a, Some(b), Side::FirstChild),
                        side_spec(state, b, Some(a), Side::Before),
                        SepType::ParentChild,
                    )
                } else if dom::parent(a).is_some_and(|p| dom::same_node(b, &p)) {
                    (
                        side_spec(state, a, Some(b), Side::After),
                        side_spec(state, b, Some(a), Side::LastChild),
                        SepType::ChildParent,
                    )
                } else {
                    sibling_specs(state, a, b)
                }
            } else {
                sibling_specs(state, a, b)
            }
        }
        (None, Some(b)) => match dom::parent(b) {
            Some(parent) => (
                side_spec(state, &parent, Some(b), Side::FirstChild),
                side_spec(state, b, Some(&parent), Side::Before),
                SepType::ParentChild,
            ),
            None => (SepSpec::NONE, SepSpec::NONE, SepType::ParentChild),
        },
        (Some(a), None) => match dom::parent(a) {
            Some(parent) => (
                side_spec(state, a, Some(&parent), Side::After),
                side_spec(state, &parent, Some(a), Side::LastChild),
                SepType::ChildParent,
            ),
            None => (SepSpec::NONE, SepSpec::NONE, SepType::ChildParent),
        },
        (None, None) => return,
    };

    // Merge with whatever is already pending: a zero-width container can put
    // several boundaries onto one separator. Merging is idempotent, so the
    // walker calling in from both sides of a boundary is harmless.
    state.sep.spec = combine(state.sep.spec, combine(spec_a, spec_b));
    state.sep.sep_type = Some(sep_type);
}

/// Sibling boundary, with the zero-width rewrite: when the following node
/// occupies no source width but has children, the constraint applies between
/// it and its first child instead, so the surrounding whitespace constrains
/// the child directly.
fn sibling_specs(state: &State, a: &Handle, b: &Handle) -> (SepSpec, SepSpec, SepType) {
    if dom::is_element(b) {
        let dp = provenance::data_parsoid(b);
        if dp.dsr.is_some_and(|d| d.is_zero_width()) {
            if let Some(first) = dom::first_child(b) {
                return (
                    side_spec(state, b, Some(&first), Side::FirstChild),
                    side_spec(state, &first, Some(b), Side::Before),
                    SepType::ParentChild,
                );
            }
        }
    }
    (
        side_spec(state, a, Some(b), Side::After),
        side_spec(state, b, Some(a), Side::Before),
        SepType::Sibling,
    )
}

enum Side {
    Before,
    After,
    FirstChild,
    LastChild,
}

fn side_spec(state: &State, node: &Handle, other: Option<&Handle>, side: Side) -> SepSpec {
    if !dom::is_element(node) {
        return SepSpec::NONE;
    }
    let handler = handlers::resolve(state, node);
    match side {
        Side::Before => handler.sep_before(state, node, other),
        Side::After => handler.sep_after(state, node, other),
        Side::FirstChild => handler.sep_first_child(state, node, other),
        Side::LastChild => handler.sep_last_child(state, node, other),
    }
}

/// Fold candidate separator text (whitespace or a comment) into the pending
/// separator source.
pub(crate) fn push_src(state: &mut State, text: &str) {
    match &mut state.sep.src {
        Some(src) => src.push_str(text),
        None => state.sep.src = Some(text.to_string()),
    }
}

/// Resolve the pending separator to a concrete string and clear it.
pub(crate) fn resolve(state: &mut State) -> String {
    let sep = std::mem::take(&mut state.sep);
    let spec = sep.spec;

    let min = spec.min.unwrap_or(0) as usize;
    let mut max = spec.max.map(|m| m as usize).unwrap_or(usize::MAX);
    if state.single_line.enforced() {
        max = 0;
    }
    let min = min.min(max);

    let src = sep.src.unwrap_or_default();
    let newlines = src.matches('\n').count();

    // Between two nodes the edit never touched, the original separator
    // bytes stay as they were.
    let between_unmodified =
        state.selser_mode && state.prev_node_unmodified && state.curr_node_unmodified;

    let mut out = if !src.is_empty() && (between_unmodified || (min..=max).contains(&newlines)) {
        src
    } else {
        // Synthesize, preserving any comments the source separator carried.
        let n = newlines.clamp(min, max);
        let mut synth = String::new();
        for comment in comments_of(&src) {
            synth.push_str(comment);
        }
        synth.push_str(&"\n".repeat(n));
        synth
    };

    if spec.force_sol && !out.ends_with('\n') && !(out.is_empty() && state.on_sol()) {
        out.push('\n');
    }
    trace!(sep_type = ?sep.sep_type, resolved = ?out, "separator resolved");
    out
}

fn comments_of(src: &str) -> impl Iterator<Item = &str> {
    use std::sync::LazyLock;
    static COMMENT: LazyLock<regex::Regex> =
        LazyLock::new(|| regex::Regex::new(r"(?s)<!--.*?-->").expect("comment pattern"));
    COMMENT.find_iter(src).map(|m| m.as_str())
}
