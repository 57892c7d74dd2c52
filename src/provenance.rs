// Per-node provenance: the data-parsoid / data-mw / data-parsoid-diff
// attribute payloads linking DOM nodes back to the original wikitext.
//
// Decoding is lenient: a malformed payload is logged and treated as absent so
// one broken node never aborts the document.

use markup5ever_rcdom::Handle;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::dom;

/// Data Source Range: byte offsets of the node in the original source plus
/// the widths of its opening and closing markup. Any component may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dsr {
    pub start: Option<u64>,
    pub end: Option<u64>,
    pub open_width: Option<u64>,
    pub close_width: Option<u64>,
}

impl Dsr {
    /// A DSR is valid when both offsets are present and `start <= end`.
    /// Widths may be absent but are never negative (negative widths fail
    /// decoding of the whole record).
    pub fn is_valid(&self) -> bool {
        matches!((self.start, self.end), (Some(s), Some(e)) if s <= e)
    }

    /// The `[start, end)` byte span, when valid.
    pub fn span(&self) -> Option<(usize, usize)> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start <= end => Some((start as usize, end as usize)),
            _ => None,
        }
    }

    /// Both markup widths known, so the open/close substrings are usable
    /// independently of the body.
    pub fn has_valid_widths(&self) -> bool {
        self.is_valid() && self.open_width.is_some() && self.close_width.is_some()
    }

    pub fn open_span(&self) -> Option<(usize, usize)> {
        let (start, _) = self.span()?;
        Some((start, start + self.open_width? as usize))
    }

    pub fn close_span(&self) -> Option<(usize, usize)> {
        let (_, end) = self.span()?;
        let width = self.close_width? as usize;
        if width <= end {
            Some((end - width, end))
        } else {
            None
        }
    }

    pub fn is_zero_width(&self) -> bool {
        matches!((self.start, self.end), (Some(s), Some(e)) if s == e)
    }
}

impl<'de> Deserialize<'de> for Dsr {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw: Vec<Option<i64>> = Vec::deserialize(deserializer)?;
        let get = |i: usize| -> Result<Option<u64>, D::Error> {
            match raw.get(i).copied().flatten() {
                Some(v) if v < 0 => Err(serde::de::Error::custom("negative dsr component")),
                Some(v) => Ok(Some(v as u64)),
                None => Ok(None),
            }
        };
        Ok(Dsr {
            start: get(0)?,
            end: get(1)?,
            open_width: get(2)?,
            close_width: get(3)?,
        })
    }
}

/// Spacing around a template parameter: [before-key, after-key, before-value,
/// after-value].
pub type ParamSpacing = [String; 4];

/// Preserved parameter info from the original template call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ParamInfo {
    pub k: String,
    pub named: bool,
    pub spc: Option<ParamSpacing>,
}

/// The decoded `data-parsoid` record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DataParsoid {
    pub dsr: Option<Dsr>,
    pub stx: Option<String>,
    pub src: Option<String>,
    pub src_tag_name: Option<String>,
    pub auto_inserted_start: bool,
    pub auto_inserted_end: bool,
    pub self_close: bool,
    pub no_close: bool,
    pub fostered: bool,
    pub misnested: bool,
    pub li_hack_src: Option<String>,
    pub extra_dashes: Option<u64>,
    /// Post-sanitizer attribute snapshot (`null` = attribute was removed).
    pub a: Option<serde_json::Map<String, Value>>,
    /// Pre-sanitizer attribute snapshot.
    pub sa: Option<serde_json::Map<String, Value>>,
    /// Preserved parameter info, one list per template part.
    pub pi: Option<Vec<Vec<ParamInfo>>>,
}

impl DataParsoid {
    pub fn stx(&self) -> &str {
        self.stx.as_deref().unwrap_or("")
    }

    pub fn is_html_syntax(&self) -> bool {
        self.stx() == "html"
    }
}

/// One entry of `data-mw.parts`: either literal wikitext between
/// transclusions, or a template call.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MwPart {
    Literal(String),
    Template { template: MwTemplate },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MwTemplate {
    pub target: MwTarget,
    pub params: serde_json::Map<String, Value>,
    /// Index into `data-parsoid.pi`.
    pub i: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MwTarget {
    pub wt: Option<String>,
    pub href: Option<String>,
    pub function: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MwBody {
    pub html: Option<String>,
    pub id: Option<String>,
    pub extsrc: Option<String>,
}

/// The decoded `data-mw` record (template/extension envelope).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DataMw {
    pub parts: Option<Vec<MwPart>>,
    pub name: Option<String>,
    pub attrs: Option<serde_json::Map<String, Value>>,
    pub body: Option<MwBody>,
}

/// Decode `data-parsoid` for a node. Absent or malformed payloads decode to
/// the default record.
pub(crate) fn data_parsoid(node: &Handle) -> DataParsoid {
    match dom::get_attr(node, "data-parsoid") {
        Some(json) => match serde_json::from_str(&json) {
            Ok(dp) => dp,
            Err(err) => {
                warn!(error = %err, "malformed data-parsoid, ignoring");
                DataParsoid::default()
            }
        },
        None => DataParsoid::default(),
    }
}

/// Decode `data-mw` for a node, if present and well-formed.
pub(crate) fn data_mw(node: &Handle) -> Option<DataMw> {
    let json = dom::get_attr(node, "data-mw")?;
    match serde_json::from_str(&json) {
        Ok(mw) => Some(mw),
        Err(err) => {
            warn!(error = %err, "malformed data-mw, ignoring");
            None
        }
    }
}

/// Coerce a `data-mw` parameter value that should have been a string.
/// Token arrays and bare scalars reduce to their concatenated text.
pub(crate) fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(coerce_to_string).collect(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Diff marks (selser input)
// ---------------------------------------------------------------------------

/// Edits recorded on a node by the diff-marking pass that runs before
/// selective serialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffMarks {
    pub inserted: bool,
    pub deleted: bool,
    pub modified_wrapper: bool,
    pub children_changed: bool,
    pub subtree_changed: bool,
}

impl DiffMarks {
    pub fn any(&self) -> bool {
        self.inserted
            || self.deleted
            || self.modified_wrapper
            || self.children_changed
            || self.subtree_changed
    }

    /// Only descendants changed; the node's own markup is intact.
    pub fn only_subtree_changed(&self) -> bool {
        (self.subtree_changed || self.children_changed)
            && !self.inserted
            && !self.deleted
            && !self.modified_wrapper
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDiff {
    diff: Vec<String>,
}

/// Read the diff marks attached to a node via `data-parsoid-diff`.
pub(crate) fn diff_marks(node: &Handle) -> DiffMarks {
    let mut marks = DiffMarks::default();
    let json = match dom::get_attr(node, "data-parsoid-diff") {
        Some(json) => json,
        None => return marks,
    };
    let raw: RawDiff = match serde_json::from_str(&json) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(error = %err, "malformed data-parsoid-diff, ignoring");
            return marks;
        }
    };
    for entry in &raw.diff {
        match entry.as_str() {
            "inserted" => marks.inserted = true,
            "deleted" => marks.deleted = true,
            "modified-wrapper" => marks.modified_wrapper = true,
            "children-changed" => marks.children_changed = true,
            "subtree-changed" => marks.subtree_changed = true,
            other => warn!(mark = other, "unknown diff mark"),
        }
    }
    marks
}

/// Diff-marker `<meta>` elements are bookkeeping emitted by the diff pass;
/// the walker consumes them without serializing anything.
pub(crate) fn is_diff_marker_meta(node: &Handle) -> bool {
    dom::is_element_named(node, "meta")
        && (dom::has_type_of(node, "mw:DiffMarker") || dom::has_type_of(node, "mw:DiffMarker/"))
}
