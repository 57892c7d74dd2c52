// Handler selection and the built-in per-tag handlers.
//
// One handler per wikitext construct plus a generic HTML fallback. A handler
// emits chunks for a node (possibly recursing through the walker) and
// declares separator contracts for each side of itself. Selection follows
// provenance: the syntax that produced a node picks the syntax it goes back
// out as.

use markup5ever_rcdom::Handle;
use tracing::warn;

use super::attributes::serialize_attributes;
use super::chunk::Chunk;
use super::separators::SepSpec;
use super::templates;
use super::walker::{self, NextNode};
use super::State;
use crate::dom;
use crate::provenance;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Handler {
    Paragraph,
    Heading,
    Quote,
    List,
    ListItem,
    IndentPre,
    HorizontalRule,
    Link,
    Meta,
    Table,
    /// `tbody`/`thead`/`tfoot` — invisible in wiki syntax.
    TableSection,
    TableCaption,
    TableRow,
    TableCell,
    Encapsulation,
    Html,
}

/// Pick the handler for an element.
pub(crate) fn resolve(state: &State, node: &Handle) -> Handler {
    // Encapsulated regions serialize as one unit from their first wrapper.
    if dom::is_first_encapsulation_wrapper(node) {
        return Handler::Encapsulation;
    }

    let tag = match dom::tag_name(node) {
        Some(tag) => tag,
        None => {
            debug_assert!(false, "handler resolution on a non-element");
            return Handler::Html;
        }
    };
    let dp = provenance::data_parsoid(node);

    // HTML-syntax nodes keep their HTML form; links always have a wikitext
    // rendering, so they are exempt.
    if dp.is_html_syntax() && tag != "a" {
        return Handler::Html;
    }

    // A freshly inserted node inside an HTML-syntax list or table keeps the
    // parent's surface syntax; mixing wiki children into HTML structure
    // would re-parse differently.
    if dp.dsr.is_none() && parent_structure_is_html(state, node) {
        return Handler::Html;
    }

    match tag {
        "p" => Handler::Paragraph,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => Handler::Heading,
        "i" | "b" => Handler::Quote,
        "ul" | "ol" | "dl" => Handler::List,
        "li" | "dt" | "dd" => Handler::ListItem,
        "pre" => Handler::IndentPre,
        "hr" => Handler::HorizontalRule,
        "a" => Handler::Link,
        "meta" | "link" => Handler::Meta,
        "table" => Handler::Table,
        "tbody" | "thead" | "tfoot" => Handler::TableSection,
        "caption" => Handler::TableCaption,
        "tr" => Handler::TableRow,
        "td" | "th" => Handler::TableCell,
        _ => Handler::Html,
    }
}

fn parent_structure_is_html(state: &State, node: &Handle) -> bool {
    let parent = match dom::parent(node) {
        Some(parent) => parent,
        None => return false,
    };
    let tag = match dom::tag_name(&parent) {
        Some(tag) => tag,
        None => return false,
    };
    let config = &state.opts.config;
    let structural = config.is_list(tag)
        || config.is_list_item(tag)
        || config.is_table_parent(tag)
        || config.is_table_child(tag);
    structural && provenance::data_parsoid(&parent).is_html_syntax()
}

impl Handler {
    /// Serialize the node. Returns how the walker should advance afterwards.
    pub(crate) fn handle(
        self,
        state: &mut State,
        node: &Handle,
        wrapper_unmodified: bool,
    ) -> NextNode {
        match self {
            Handler::Paragraph => walker::serialize_children(state, node),
            Handler::Heading => handle_heading(state, node, wrapper_unmodified),
            Handler::Quote => handle_quote(state, node),
            Handler::List => walker::serialize_children(state, node),
            Handler::ListItem => handle_list_item(state, node),
            Handler::IndentPre => handle_indent_pre(state, node),
            Handler::HorizontalRule => handle_hr(state, node),
            Handler::Link => handle_link(state, node),
            Handler::Meta => return handle_meta(state, node),
            Handler::Table => handle_table(state, node, wrapper_unmodified),
            Handler::TableSection => walker::serialize_children(state, node),
            Handler::TableCaption => handle_caption(state, node),
            Handler::TableRow => handle_table_row(state, node),
            Handler::TableCell => handle_table_cell(state, node, wrapper_unmodified),
            Handler::Encapsulation => return handle_encapsulation(state, node),
            Handler::Html => handle_html(state, node, wrapper_unmodified),
        }
        NextNode::Sibling
    }

    // -- separator contracts ------------------------------------------------

    pub(crate) fn sep_before(self, state: &State, node: &Handle, other: Option<&Handle>) -> SepSpec {
        let from_parent = is_parent(other, node);
        match self {
            Handler::Paragraph => {
                if from_parent {
                    SepSpec::new(0, 2)
                } else if other.is_some_and(|o| dom::is_element_named(o, "p")) {
                    SepSpec::sol(2, 2)
                } else {
                    SepSpec::sol(1, 2)
                }
            }
            Handler::Heading | Handler::IndentPre | Handler::HorizontalRule => {
                if from_parent {
                    SepSpec::new(0, 2)
                } else {
                    SepSpec::sol(1, 2)
                }
            }
            Handler::List | Handler::Table => {
                if from_parent {
                    SepSpec {
                        force_sol: true,
                        ..SepSpec::NONE
                    }
                } else {
                    SepSpec::sol(1, 2)
                }
            }
            Handler::ListItem => {
                if from_parent {
                    SepSpec {
                        force_sol: true,
                        ..SepSpec::NONE
                    }
                } else if same_line_definition(state, node) {
                    SepSpec::new(0, 0)
                } else {
                    SepSpec::sol(1, 1)
                }
            }
            Handler::TableCaption | Handler::TableRow => SepSpec::sol(1, 1),
            Handler::TableCell => {
                if provenance::data_parsoid(node).stx() == "row" {
                    SepSpec::new(0, 0)
                } else {
                    SepSpec::sol(1, 1)
                }
            }
            _ => SepSpec::NONE,
        }
    }

    pub(crate) fn sep_after(self, state: &State, node: &Handle, other: Option<&Handle>) -> SepSpec {
        let _ = (state, node);
        let to_parent = is_parent(other, node);
        match self {
            Handler::Paragraph => {
                if to_parent {
                    SepSpec::new(0, 2)
                } else if other.is_some_and(|o| dom::is_element_named(o, "p")) {
                    SepSpec::sol(2, 2)
                } else {
                    SepSpec::new(1, 2)
                }
            }
            Handler::Heading => {
                if to_parent {
                    SepSpec::new(0, 2)
                } else {
                    SepSpec::sol(1, 2)
                }
            }
            Handler::List | Handler::Table => {
                if to_parent {
                    SepSpec::NONE
                } else {
                    SepSpec::new(1, 2)
                }
            }
            Handler::IndentPre => SepSpec::new(1, 2),
            Handler::HorizontalRule => SepSpec::new(0, 2),
            _ => SepSpec::NONE,
        }
    }

    pub(crate) fn sep_first_child(
        self,
        state: &State,
        node: &Handle,
        other: Option<&Handle>,
    ) -> SepSpec {
        let _ = node;
        match self {
            Handler::Heading | Handler::TableCaption | Handler::TableCell => SepSpec::new(0, 0),
            Handler::ListItem => {
                // Content follows the bullet on the same line, except a
                // directly nested list, which starts its own lines.
                if other.is_some_and(|o| {
                    dom::tag_name(o).is_some_and(|t| state.opts.config.is_list(t))
                }) {
                    SepSpec::NONE
                } else {
                    SepSpec::new(0, 0)
                }
            }
            Handler::Table | Handler::TableRow => SepSpec::new(1, 1),
            _ => SepSpec::NONE,
        }
    }

    pub(crate) fn sep_last_child(
        self,
        state: &State,
        node: &Handle,
        other: Option<&Handle>,
    ) -> SepSpec {
        let _ = (state, node, other);
        match self {
            Handler::Heading | Handler::TableCaption | Handler::TableCell | Handler::ListItem => {
                SepSpec::new(0, 0)
            }
            Handler::Table => SepSpec::new(1, 1),
            _ => SepSpec::NONE,
        }
    }
}

fn is_parent(other: Option<&Handle>, node: &Handle) -> bool {
    match (other, dom::parent(node)) {
        (Some(other), Some(parent)) => dom::same_node(other, &parent),
        _ => false,
    }
}

/// A `dd` marked with row syntax sits on the same line as its `dt`
/// (`;term: definition`).
fn same_line_definition(state: &State, node: &Handle) -> bool {
    let _ = state;
    dom::is_element_named(node, "dd") && provenance::data_parsoid(node).stx() == "row"
}

// ---------------------------------------------------------------------------
// Wikitext handlers
// ---------------------------------------------------------------------------

fn handle_heading(state: &mut State, node: &Handle, wrapper_unmodified: bool) {
    let level = dom::tag_name(node)
        .and_then(|t| t.strip_prefix('h'))
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(2);
    let marker = "=".repeat(level);

    let (open, close) = match reused_wrapper_tags(state, node, wrapper_unmodified) {
        Some(pair) => pair,
        None => (marker.clone(), marker),
    };

    state.emit_markup(open, node);
    state.single_line.enforce();
    walker::serialize_children(state, node);
    state.single_line.pop();
    state.emit_markup(close, node);
}

fn handle_quote(state: &mut State, node: &Handle) {
    let marker = if dom::is_element_named(node, "b") {
        "'''"
    } else {
        "''"
    };
    state.emit(Chunk::quote_marker(marker, true), node);
    walker::serialize_children(state, node);
    state.emit(Chunk::quote_marker(marker, false), node);
}

fn handle_list_item(state: &mut State, node: &Handle) {
    let bullets = if same_line_definition(state, node) {
        ":".to_string()
    } else {
        list_bullets(state, node)
    };
    state.emit_markup(bullets, node);
    walker::serialize_children(state, node);
}

/// The bullet chain for a list item, read off its wiki-syntax list ancestry.
fn list_bullets(state: &State, node: &Handle) -> String {
    let mut bullets: Vec<char> = Vec::new();
    let mut item = node.clone();
    loop {
        let list = match dom::parent(&item) {
            Some(list) => list,
            None => break,
        };
        let list_tag = match dom::tag_name(&list) {
            Some(tag) if state.opts.config.is_list(tag) => tag.to_string(),
            _ => break,
        };
        if provenance::data_parsoid(&list).is_html_syntax() {
            break;
        }
        let bullet = match (list_tag.as_str(), dom::tag_name(&item)) {
            ("ul", _) => '*',
            ("ol", _) => '#',
            ("dl", Some("dt")) => ';',
            ("dl", _) => ':',
            _ => break,
        };
        bullets.push(bullet);
        match dom::parent(&list) {
            Some(outer) if dom::tag_name(&outer).is_some_and(|t| {
                state.opts.config.is_list_item(t)
            }) =>
            {
                item = outer;
            }
            _ => break,
        }
    }
    bullets.reverse();
    bullets.into_iter().collect()
}

fn handle_indent_pre(state: &mut State, node: &Handle) {
    let mut nested = State::new(state.opts, state.root.clone(), true);
    nested.in_indent_pre = true;
    walker::serialize_children(&mut nested, node);
    walker::merge_nested_flags(state, &nested);
    let content = nested.out;

    let mut text = String::with_capacity(content.len() + 8);
    text.push(' ');
    text.push_str(&content.replace('\n', "\n "));
    state.emit_markup(text, node);
}

fn handle_hr(state: &mut State, node: &Handle) {
    let extra = provenance::data_parsoid(node).extra_dashes.unwrap_or(0) as usize;
    state.emit_markup("-".repeat(4 + extra), node);
}

fn handle_link(state: &mut State, node: &Handle) {
    let rel = dom::get_attr(node, "rel").unwrap_or_default();
    let is_wiki_link = rel
        .split_ascii_whitespace()
        .any(|t| t == "mw:WikiLink" || t.starts_with("mw:WikiLink/"));
    let is_ext_link = rel
        .split_ascii_whitespace()
        .any(|t| t == "mw:ExtLink" || t.starts_with("mw:ExtLink/"));

    let href = dom::get_attr(node, "href").unwrap_or_default();
    let target = href.strip_prefix("./").unwrap_or(&href).to_string();
    let content = walker::serialize_children_to_string(state, node, false);

    if is_wiki_link {
        let plain = content == target || content == target.replace('_', " ");
        let text = if plain || content.is_empty() {
            format!("[[{target}]]")
        } else {
            format!("[[{target}|{content}]]")
        };
        state.emit(Chunk::bounded(text), node);
    } else if is_ext_link {
        let text = if content.is_empty() {
            format!("[{target}]")
        } else {
            format!("[{target} {content}]")
        };
        state.emit(Chunk::bounded(text), node);
    } else if !target.is_empty() {
        state.emit(Chunk::bounded(format!("[{target} {content}]")), node);
    } else {
        // No usable target; keep the content so nothing is lost.
        state.emit(Chunk::plain(content), node);
    }
}

/// Magic words recoverable from `mw:PageProp/<name>` values.
const PAGE_PROPS: &[&str] = &["notoc", "forcetoc", "toc", "noeditsection", "nogallery", "index", "noindex"];

fn handle_meta(state: &mut State, node: &Handle) -> NextNode {
    let dp = provenance::data_parsoid(node);

    // Category links round-trip from the href.
    if dom::get_attr(node, "rel")
        .is_some_and(|r| r.split_ascii_whitespace().any(|t| t == "mw:PageProp/Category"))
    {
        if let Some(href) = dom::get_attr(node, "href") {
            let target = href.strip_prefix("./").unwrap_or(&href);
            state.emit(Chunk::bounded(format!("[[{target}]]")), node);
            return NextNode::Sibling;
        }
    }

    if let Some(prop) = dom::get_attr(node, "property") {
        if let Some(name) = prop.strip_prefix("mw:PageProp/") {
            if PAGE_PROPS.contains(&name) {
                state.emit_markup(format!("__{}__", name.to_ascii_uppercase()), node);
                return NextNode::Sibling;
            }
        }
    }

    // Include directives and friends keep their recorded source.
    if dom::has_type_of(node, "mw:Includes/") {
        if let Some(src) = &dp.src {
            state.emit_markup(src.clone(), node);
        } else {
            warn!("include directive meta without recorded source, dropping");
        }
        return NextNode::Sibling;
    }

    if let Some(src) = &dp.src {
        state.emit_markup(src.clone(), node);
        return NextNode::Sibling;
    }

    handle_html(state, node, false);
    NextNode::Sibling
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

fn handle_table(state: &mut State, node: &Handle, wrapper_unmodified: bool) {
    let dp = provenance::data_parsoid(node);
    let (open, close) = match reused_wrapper_tags(state, node, wrapper_unmodified) {
        Some(pair) => pair,
        None => {
            let attrs = serialize_attributes(state, node, &dp);
            let open = if attrs.is_empty() {
                "{|".to_string()
            } else {
                format!("{{| {attrs}")
            };
            (open, "|}".to_string())
        }
    };

    if !dp.auto_inserted_start {
        state.emit_markup(open, node);
    }
    walker::serialize_children(state, node);
    if !dp.auto_inserted_end {
        state.emit_markup(close, node);
    }
}

fn handle_caption(state: &mut State, node: &Handle) {
    let dp = provenance::data_parsoid(node);
    let attrs = serialize_attributes(state, node, &dp);
    let open = if attrs.is_empty() {
        "|+".to_string()
    } else {
        format!("|+ {attrs} |")
    };
    state.emit_markup(open, node);
    walker::serialize_children(state, node);
}

fn handle_table_row(state: &mut State, node: &Handle) {
    let dp = provenance::data_parsoid(node);
    let attrs = serialize_attributes(state, node, &dp);

    // The first row of a table needs no |- when it carries nothing.
    let first = previous_row_or_caption(node).is_none();
    if !first || !attrs.is_empty() {
        let marker = if attrs.is_empty() {
            "|-".to_string()
        } else {
            format!("|- {attrs}")
        };
        state.emit_markup(marker, node);
    }
    walker::serialize_children(state, node);
}

fn previous_row_or_caption(node: &Handle) -> Option<Handle> {
    let mut prev = dom::prev_sibling(node);
    while let Some(p) = prev {
        if dom::tag_name(&p).is_some_and(|t| matches!(t, "tr" | "caption")) {
            return Some(p);
        }
        prev = dom::prev_sibling(&p);
    }
    // Rows are usually wrapped in an implicit tbody; look across it.
    let parent = dom::parent(node)?;
    if dom::tag_name(&parent).is_some_and(|t| matches!(t, "tbody" | "thead" | "tfoot")) {
        previous_row_or_caption(&parent)
    } else {
        None
    }
}

fn handle_table_cell(state: &mut State, node: &Handle, wrapper_unmodified: bool) {
    let dp = provenance::data_parsoid(node);
    let header = dom::is_element_named(node, "th");
    let same_row = dp.stx() == "row";
    let marker = match (header, same_row) {
        (false, false) => "|",
        (false, true) => "||",
        (true, false) => "!",
        (true, true) => "!!",
    };

    let open = match reused_wrapper_tags(state, node, wrapper_unmodified) {
        Some((open, _)) => open,
        None => {
            state.single_line.enforce();
            let attrs = serialize_attributes(state, node, &dp);
            state.single_line.pop();
            if attrs.is_empty() {
                marker.to_string()
            } else {
                format!("{marker}{attrs}|")
            }
        }
    };
    state.emit_markup(open, node);
    walker::serialize_children(state, node);
}

// ---------------------------------------------------------------------------
// Encapsulations and the generic HTML fallback
// ---------------------------------------------------------------------------

fn handle_encapsulation(state: &mut State, node: &Handle) -> NextNode {
    match provenance::data_mw(node) {
        Some(mw) if mw.parts.is_some() => templates::serialize_transclusion(state, node, &mw),
        Some(mw) if dom::has_type_of(node, "mw:Extension/") => {
            templates::serialize_extension(state, node, &mw)
        }
        Some(_) | None => {
            warn!("encapsulation wrapper without usable data-mw, dropping region");
        }
    }
    match dom::skip_about_siblings(node) {
        Some(next) => NextNode::To(next),
        None => NextNode::Done,
    }
}

/// Emit a node in HTML syntax: `<tag attrs>` children `</tag>`, honoring the
/// auto-inserted, self-closing and void rules recorded in provenance.
pub(crate) fn handle_html(state: &mut State, node: &Handle, wrapper_unmodified: bool) {
    let dp = provenance::data_parsoid(node);
    let tag = dp
        .src_tag_name
        .clone()
        .or_else(|| dom::tag_name(node).map(str::to_string))
        .unwrap_or_default();

    let void = state.opts.config.is_void(&tag);
    let self_closing = dp.self_close || (void && !dp.no_close);

    if !dp.auto_inserted_start {
        let open = match reused_wrapper_tags(state, node, wrapper_unmodified) {
            Some((open, _)) => open,
            None => {
                let attrs = serialize_attributes(state, node, &dp);
                let attrs = if attrs.is_empty() {
                    attrs
                } else {
                    format!(" {attrs}")
                };
                if self_closing {
                    format!("<{tag}{attrs} />")
                } else {
                    format!("<{tag}{attrs}>")
                }
            }
        };
        state.emit_markup(open, node);
    }

    if self_closing {
        return;
    }

    let was_html_pre = state.in_html_pre;
    let was_no_wiki = state.in_no_wiki;
    if tag == "pre" {
        state.in_html_pre = true;
    }
    if tag == "nowiki" {
        state.in_no_wiki = true;
    }
    walker::serialize_children(state, node);
    state.in_html_pre = was_html_pre;
    state.in_no_wiki = was_no_wiki;

    if !dp.auto_inserted_end && !void {
        let close = match reused_wrapper_tags(state, node, wrapper_unmodified) {
            Some((_, close)) => close,
            None => format!("</{tag}>"),
        };
        state.emit_markup(close, node);
    }
}

/// When only the subtree changed and the wrapper's source widths are
/// trustworthy, the open/close markup comes back verbatim from the source.
fn reused_wrapper_tags(
    state: &State,
    node: &Handle,
    wrapper_unmodified: bool,
) -> Option<(String, String)> {
    if !wrapper_unmodified {
        return None;
    }
    let source = state.opts.original_source.as_deref()?;
    let dsr = provenance::data_parsoid(node).dsr?;
    let (open_start, open_end) = dsr.open_span()?;
    let (close_start, close_end) = dsr.close_span()?;
    let open = source.get(open_start..open_end)?;
    let close = source.get(close_start..close_end)?;
    Some((open.to_string(), close.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::find_body;
    use crate::Options;
    use html5ever::tendril::TendrilSink;

    fn first_element(html: &str) -> Handle {
        let dom = html5ever::parse_document(
            markup5ever_rcdom::RcDom::default(),
            Default::default(),
        )
        .from_utf8()
        .one(html.as_bytes());
        dom::child_nodes(&find_body(&dom.document).unwrap())
            .into_iter()
            .find(dom::is_element)
            .unwrap()
    }

    #[test]
    fn html_syntax_routes_to_fallback() {
        let opts = Options::default();
        let node = first_element(r#"<ul data-parsoid='{"stx":"html"}'><li>a</li></ul>"#);
        let state = State::new(&opts, node.clone(), true);
        assert_eq!(resolve(&state, &node), Handler::Html);
    }

    #[test]
    fn links_never_fall_back_to_html() {
        let opts = Options::default();
        let node = first_element(r#"<a data-parsoid='{"stx":"html"}' href="./X">x</a>"#);
        let state = State::new(&opts, node.clone(), true);
        assert_eq!(resolve(&state, &node), Handler::Link);
    }

    #[test]
    fn encapsulation_wins_over_tag() {
        let opts = Options::default();
        let node = first_element(r##"<p typeof="mw:Transclusion" about="#mwt1">x</p>"##);
        let state = State::new(&opts, node.clone(), true);
        assert_eq!(resolve(&state, &node), Handler::Encapsulation);
    }

    #[test]
    fn inserted_node_in_html_list_keeps_html() {
        let opts = Options::default();
        let list = first_element(r#"<ul data-parsoid='{"stx":"html"}'><li>a</li></ul>"#);
        let item = dom::child_nodes(&list).remove(0);
        let state = State::new(&opts, list.clone(), true);
        assert_eq!(resolve(&state, &item), Handler::Html);
    }

    #[test]
    fn bullet_chains_nest() {
        let opts = Options::default();
        let list = first_element("<ul><li>a<ul><li>b</li></ul></li></ul>");
        let outer_li = dom::child_nodes(&list).remove(0);
        let inner_ul = dom::child_nodes(&outer_li)
            .into_iter()
            .find(dom::is_element)
            .unwrap();
        let inner_li = dom::child_nodes(&inner_ul).remove(0);
        let state = State::new(&opts, list.clone(), true);
        assert_eq!(list_bullets(&state, &outer_li), "*");
        assert_eq!(list_bullets(&state, &inner_li), "**");
    }

    #[test]
    fn definition_list_bullets() {
        let opts = Options::default();
        let list = first_element("<dl><dt>t</dt><dd>d</dd></dl>");
        let children = dom::child_nodes(&list);
        let state = State::new(&opts, list.clone(), true);
        assert_eq!(list_bullets(&state, &children[0]), ";");
        assert_eq!(list_bullets(&state, &children[1]), ":");
    }
}
