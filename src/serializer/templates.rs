// Template and extension emission from data-mw envelopes.
//
// An encapsulation wrapper re-emits its whole region as one `{{…}}` or
// `<ext…>` unit; the DOM inside the envelope is render output and never
// serialized on its own.

use markup5ever_rcdom::Handle;
use serde_json::Value;
use tracing::{error, warn};

use super::chunk::Chunk;
use super::walker;
use super::State;
use crate::dom;
use crate::provenance::{
    self, coerce_to_string, DataMw, DataParsoid, MwPart, MwTemplate, ParamInfo,
};

/// Serialize a transclusion envelope from its `data-mw.parts`.
pub(crate) fn serialize_transclusion(state: &mut State, node: &Handle, mw: &DataMw) {
    let dp = provenance::data_parsoid(node);
    let parts = match &mw.parts {
        Some(parts) => parts,
        None => {
            warn!("transclusion wrapper without data-mw.parts, dropping");
            return;
        }
    };

    let mut out = String::new();
    for part in parts {
        match part {
            MwPart::Literal(text) => out.push_str(text),
            MwPart::Template { template } => {
                out.push_str(&build_template(state, template, &dp));
            }
        }
    }
    state.emit(Chunk::bounded(out), node);
}

/// Build one `{{target|…}}` call.
fn build_template(state: &mut State, template: &MwTemplate, dp: &DataParsoid) -> String {
    let target = match &template.target.wt {
        Some(wt) => wt.clone(),
        None => {
            let fallback = template.target.function.clone().unwrap_or_default();
            warn!("template target missing wt form, using function name");
            fallback
        }
    };

    let pi: &[ParamInfo] = template
        .i
        .and_then(|i| dp.pi.as_deref().and_then(|pi| pi.get(i)))
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    // Original argument order first, then anything newly added.
    let mut order: Vec<String> = pi
        .iter()
        .filter(|info| template.params.contains_key(&info.k))
        .map(|info| info.k.clone())
        .collect();
    for key in template.params.keys() {
        if !order.iter().any(|k| k == key) {
            order.push(key.clone());
        }
    }

    let mut out = format!("{{{{{target}");
    let mut positional_index = 1usize;
    for key in &order {
        let param = &template.params[key];
        let info = pi.iter().find(|info| &info.k == key);
        let (value, key_wt) = param_value(state, param);

        // Use the explicit source key when recorded; otherwise the map key,
        // trimmed (a trimmed key renames the parameter).
        let key_text = key_wt.unwrap_or_else(|| key.trim().to_string());

        let positional =
            key_text == positional_index.to_string() && !info.is_some_and(|i| i.named);
        let escaped = state.opts.escaper.escape_template_arg(&value, positional);
        let positional = positional && !escaped.force_named;

        if positional {
            positional_index += 1;
            out.push('|');
            out.push_str(&escaped.value);
        } else {
            let spc = named_spacing(info, &key_text);
            out.push('|');
            out.push_str(&spc[0]);
            out.push_str(&key_text);
            out.push_str(&spc[1]);
            out.push('=');
            out.push_str(&spc[2]);
            out.push_str(escaped.value.trim());
            out.push_str(&spc[3]);
        }
    }
    out.push_str("}}");
    out
}

/// Spacing around `=` for a named parameter: recorded spacing when the
/// original call had this parameter, a spaced default when it was named in
/// the original but the spacing went unrecorded, all-empty for new and
/// blank-key parameters.
fn named_spacing(info: Option<&ParamInfo>, key: &str) -> [String; 4] {
    if key.is_empty() {
        return Default::default();
    }
    match info {
        Some(info) => info
            .spc
            .clone()
            .unwrap_or_else(|| ["", " ", " ", ""].map(String::from)),
        None => Default::default(),
    }
}

/// Extract a parameter's wikitext value and optional source key.
/// Values are `{wt}` or `{html}` objects; `wt` wins, `html` re-serializes
/// through a nested run that starts off-SOL.
fn param_value(state: &mut State, param: &Value) -> (String, Option<String>) {
    match param {
        Value::Object(obj) => {
            let key_wt = obj
                .get("key")
                .and_then(|k| k.get("wt"))
                .and_then(|v| v.as_str())
                .map(str::to_string);
            let value = match obj.get("wt") {
                Some(Value::String(wt)) => wt.clone(),
                Some(other) => {
                    error!("template parameter wt is not a string, coercing");
                    coerce_to_string(other)
                }
                None => match obj.get("html").and_then(|v| v.as_str()) {
                    Some(html) => walker::serialize_nested_html(state, html, true),
                    None => String::new(),
                },
            };
            (value, key_wt)
        }
        other => {
            error!("template parameter is not an object, coercing");
            (coerce_to_string(other), None)
        }
    }
}

/// Serialize an extension envelope (`<ref>`, `<references>`, …).
pub(crate) fn serialize_extension(state: &mut State, node: &Handle, mw: &DataMw) {
    let name = match mw.name.clone().or_else(|| extension_name(node)) {
        Some(name) => name,
        None => {
            error!("extension wrapper without a name, dropping");
            return;
        }
    };

    let mut attrs = String::new();
    if let Some(map) = &mw.attrs {
        for (key, value) in map {
            let value = match value.as_str() {
                Some(s) => s.to_string(),
                None => coerce_to_string(value),
            };
            attrs.push_str(&format!(" {key}=\"{}\"", value.replace('"', "&quot;")));
        }
    }

    let body = match &mw.body {
        None => {
            state.emit(Chunk::plain(format!("<{name}{attrs} />")), node);
            return;
        }
        Some(body) => body,
    };

    let content = if let Some(html) = &body.html {
        Some(walker::serialize_nested_html(state, html, false))
    } else if let Some(id) = &body.id {
        resolve_body_by_id(state, id)
    } else {
        body.extsrc.clone()
    };

    match content {
        Some(content) => {
            state.emit(
                Chunk::plain(format!("<{name}{attrs}>{content}</{name}>")),
                node,
            );
        }
        None => {
            error!(name = %name, "extension body did not resolve, dropping call");
        }
    }
}

/// `body.id` points at an element holding the body content, searched in the
/// current document first, then in the caller-supplied edited document.
fn resolve_body_by_id(state: &mut State, id: &str) -> Option<String> {
    let root = state.root.clone();
    if let Some(found) = dom::find_element_by_id(&root, id) {
        return Some(walker::serialize_children_to_string(state, &found, false));
    }
    if let Some(edited) = state.opts.edited_document.clone() {
        if let Some(found) = dom::find_element_by_id(&edited, id) {
            return Some(walker::serialize_children_to_string(state, &found, false));
        }
    }
    None
}

fn extension_name(node: &Handle) -> Option<String> {
    dom::get_attr(node, "typeof")?
        .split_ascii_whitespace()
        .find_map(|t| t.strip_prefix("mw:Extension/"))
        .map(|name| name.to_ascii_lowercase())
}
