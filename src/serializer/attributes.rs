// Attribute serialization for emitted HTML tags.
//
// Filters bookkeeping attributes out, strips parser-generated values that
// lack provenance, reuses original source forms for untouched values, and
// restores attributes the sanitizer removed.

use std::sync::LazyLock;

use markup5ever_rcdom::Handle;
use regex::Regex;
use tracing::warn;

use super::State;
use crate::dom;
use crate::provenance::{coerce_to_string, DataParsoid};

/// Bookkeeping attributes that never appear in output.
const IGNORED: &[&str] = &[
    "data-parsoid",
    "data-mw",
    "data-ve-changed",
    "data-parsoid-changed",
    "data-parsoid-diff",
    "data-parsoid-serialize",
];

/// Parser-generated id shape (`mw` followed by at least two word chars).
static PARSER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^mw[\w-]{2,}$").expect("parser-id pattern"));

/// Transclusion envelope `about` ids.
static MWT_ABOUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#mwt\d+$").expect("about pattern"));

/// `mw:`-namespaced `typeof` tokens.
static MW_TYPEOF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|\s)mw:\S+").expect("typeof pattern"));

/// Serialize an element's attributes to the string that goes inside its open
/// tag (no leading space). Empty when nothing survives filtering.
pub(crate) fn serialize_attributes(_state: &mut State, node: &Handle, dp: &DataParsoid) -> String {
    let mut parts: Vec<String> = Vec::new();

    for (key, value) in dom::attr_pairs(node) {
        if IGNORED.contains(&key.as_str()) {
            continue;
        }

        let (key, value) = match filter_attribute(dp, key, value) {
            Some(kv) => kv,
            None => continue,
        };

        // The data-x- prefix guards attribute names that would otherwise be
        // treated as templated; it never reaches output.
        let key = key.strip_prefix("data-x-").unwrap_or(&key).to_string();

        if !value.is_empty() {
            parts.push(format!("{key}=\"{}\"", attr_value_text(dp, &key, &value)));
        } else if key.contains('{') || key.contains('<') {
            // Templated/extension-generated name with no value: bare key.
            parts.push(key);
        } else {
            parts.push(format!("{key}=\"\""));
        }
    }

    restore_sanitized(dp, node, &mut parts);

    parts.join(" ")
}

/// Apply the per-key filtering rules. Returns None when the attribute is
/// dropped entirely.
fn filter_attribute(dp: &DataParsoid, key: String, value: String) -> Option<(String, String)> {
    match key.as_str() {
        "id" if PARSER_ID.is_match(&value) => {
            let confirmed = dp
                .a
                .as_ref()
                .is_some_and(|a| a.contains_key("id"))
                || dp.sa.as_ref().is_some_and(|sa| sa.contains_key("id"));
            if confirmed {
                Some((key, value))
            } else {
                warn!(id = %value, "dropping parser-generated id without provenance");
                None
            }
        }
        "about" if MWT_ABOUT.is_match(&value) => None,
        "typeof" => {
            let stripped = MW_TYPEOF.replace_all(&value, "");
            let stripped = stripped.trim();
            if stripped.is_empty() {
                None
            } else {
                Some((key, stripped.to_string()))
            }
        }
        _ => Some((key, value)),
    }
}

/// The text emitted inside the quotes: the original source form when the
/// value is untouched since parse, else the entity-escaped live value.
fn attr_value_text(dp: &DataParsoid, key: &str, value: &str) -> String {
    let unchanged = dp
        .a
        .as_ref()
        .and_then(|a| a.get(key))
        .and_then(|v| v.as_str())
        .is_some_and(|recorded| recorded == value);
    if unchanged {
        if let Some(src) = dp.sa.as_ref().and_then(|sa| sa.get(key)).and_then(|v| v.as_str()) {
            return src.to_string();
        }
    }
    escape_attr_value(value)
}

fn escape_attr_value(value: &str) -> String {
    super::escape::escape_entities(value).replace('"', "&quot;")
}

/// Re-emit attributes the sanitizer stripped: present in the pre-sanitizer
/// snapshot (`sa`), recorded as removed in the post-sanitizer snapshot
/// (`a`), and absent from the live list.
fn restore_sanitized(dp: &DataParsoid, node: &Handle, parts: &mut Vec<String>) {
    let sa = match &dp.sa {
        Some(sa) => sa,
        None => return,
    };
    let recorded = match &dp.a {
        Some(a) => a,
        None => return,
    };
    for (key, value) in sa {
        if value.is_null() || dom::has_attr(node, key) || !recorded.contains_key(key) {
            continue;
        }
        // Only restore when the sanitizer actually removed it.
        if recorded.get(key).is_some_and(|v| !v.is_null()) {
            continue;
        }
        let value = match value.as_str() {
            Some(s) => s.to_string(),
            None => coerce_to_string(value),
        };
        parts.push(format!("{key}=\"{value}\""));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::find_body;
    use crate::Options;
    use html5ever::tendril::TendrilSink;
    use pretty_assertions::assert_eq;

    fn element(html: &str) -> Handle {
        let dom = html5ever::parse_document(
            markup5ever_rcdom::RcDom::default(),
            Default::default(),
        )
        .from_utf8()
        .one(html.as_bytes());
        dom::child_nodes(&find_body(&dom.document).unwrap()).remove(0)
    }

    fn serialize(html: &str) -> String {
        let node = element(html);
        let dp = crate::provenance::data_parsoid(&node);
        let opts = Options::default();
        let mut state = State::new(&opts, node.clone(), true);
        serialize_attributes(&mut state, &node, &dp)
    }

    #[test]
    fn bookkeeping_attributes_dropped() {
        let out = serialize(r#"<span data-parsoid="{}" data-mw="{}" class="x">a</span>"#);
        assert_eq!(out, r#"class="x""#);
    }

    #[test]
    fn parser_generated_id_dropped_without_provenance() {
        let out = serialize(r#"<span id="mwAb">a</span>"#);
        assert_eq!(out, "");
    }

    #[test]
    fn user_id_kept() {
        let out = serialize(r#"<span id="intro">a</span>"#);
        assert_eq!(out, r#"id="intro""#);
    }

    #[test]
    fn mwt_about_and_mw_typeof_stripped() {
        let out =
            serialize(r##"<span about="#mwt3" typeof="mw:Transclusion other" class="x">a</span>"##);
        assert_eq!(out, r#"typeof="other" class="x""#);
    }

    #[test]
    fn sanitized_attribute_restored_after_live() {
        let out = serialize(
            r#"<span class="foo" data-parsoid='{"a":{"style":null},"sa":{"style":"color:red"}}'>a</span>"#,
        );
        assert_eq!(out, r#"class="foo" style="color:red""#);
    }

    #[test]
    fn quotes_in_values_escaped() {
        let out = serialize(r#"<span title='a"b'>a</span>"#);
        assert_eq!(out, r#"title="a&quot;b""#);
    }
}
