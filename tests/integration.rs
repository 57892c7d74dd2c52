// End-to-end serialization tests: Parsoid HTML in, wikitext out.

use html2wikitext::serialize;
use pretty_assertions::assert_eq;

#[test]
fn paragraph_roundtrip() {
    let out = serialize(r#"<p data-parsoid='{"dsr":[0,3,0,0]}'>foo</p>"#).unwrap();
    assert_eq!(out, "foo");
}

#[test]
fn paragraphs_separated_by_blank_line() {
    let out = serialize("<p>a</p><p>b</p>").unwrap();
    assert_eq!(out, "a\n\nb");
}

#[test]
fn heading_levels() {
    assert_eq!(serialize("<h2>Title</h2>").unwrap(), "==Title==");
    assert_eq!(serialize("<h3>Sub</h3>").unwrap(), "===Sub===");
}

#[test]
fn heading_then_paragraph() {
    let out = serialize("<h2>T</h2><p>body</p>").unwrap();
    assert_eq!(out, "==T==\nbody");
}

#[test]
fn bold_and_italic() {
    let out = serialize("<p><i>a</i> and <b>b</b></p>").unwrap();
    assert_eq!(out, "''a'' and '''b'''");
}

#[test]
fn nested_bold_italic_fuses() {
    let out = serialize("<p><b><i>x</i></b></p>").unwrap();
    assert_eq!(out, "'''''x'''''");
}

#[test]
fn adjacent_italics_keep_guard() {
    let out = serialize("<p><i>a</i><i>b</i></p>").unwrap();
    assert_eq!(out, "''a''<nowiki/>''b''");
}

#[test]
fn sol_list_char_escaped() {
    let out = serialize("<p>*not a list</p>").unwrap();
    assert_eq!(out, "<nowiki>*</nowiki>not a list");
}

#[test]
fn structural_sequences_escaped() {
    let out = serialize("<p>a [[b]] c</p>").unwrap();
    assert_eq!(out, "<nowiki>a [[b]] c</nowiki>");
}

#[test]
fn entities_pass_through_when_harmless() {
    let out = serialize("<p>AT&amp;T &lt;3</p>").unwrap();
    assert_eq!(out, "AT&T <3");
}

#[test]
fn flat_list() {
    let out = serialize("<ul><li>a</li><li>b</li></ul>").unwrap();
    assert_eq!(out, "*a\n*b");
}

#[test]
fn nested_list_bullets_stack() {
    let out = serialize("<ul><li>a<ul><li>b</li></ul></li></ul>").unwrap();
    assert_eq!(out, "*a\n**b");
}

#[test]
fn ordered_list_marker() {
    let out = serialize("<ol><li>one</li><li>two</li></ol>").unwrap();
    assert_eq!(out, "#one\n#two");
}

#[test]
fn definition_list() {
    let out = serialize("<dl><dt>t</dt><dd>d</dd></dl>").unwrap();
    assert_eq!(out, ";t\n:d");
}

#[test]
fn same_line_definition() {
    let out =
        serialize(r#"<dl><dt>t</dt><dd data-parsoid='{"stx":"row"}'>d</dd></dl>"#).unwrap();
    assert_eq!(out, ";t:d");
}

#[test]
fn horizontal_rule() {
    let out = serialize("<hr><p>x</p>").unwrap();
    assert_eq!(out, "----\nx");
}

#[test]
fn horizontal_rule_extra_dashes() {
    let out = serialize(r#"<hr data-parsoid='{"extraDashes":2}'>"#).unwrap();
    assert_eq!(out, "------");
}

#[test]
fn wiki_link_plain() {
    let out = serialize(r#"<p><a rel="mw:WikiLink" href="./Foo">Foo</a></p>"#).unwrap();
    assert_eq!(out, "[[Foo]]");
}

#[test]
fn wiki_link_piped() {
    let out = serialize(r#"<p><a rel="mw:WikiLink" href="./Foo">bar</a></p>"#).unwrap();
    assert_eq!(out, "[[Foo|bar]]");
}

#[test]
fn wiki_link_underscores_collapse() {
    let out = serialize(r#"<p><a rel="mw:WikiLink" href="./Foo_Bar">Foo Bar</a></p>"#).unwrap();
    assert_eq!(out, "[[Foo_Bar]]");
}

#[test]
fn external_link() {
    let out = serialize(
        r#"<p><a rel="mw:ExtLink" href="https://example.org/">the docs</a></p>"#,
    )
    .unwrap();
    assert_eq!(out, "[https://example.org/ the docs]");
}

#[test]
fn category_link() {
    // Leading content keeps the metadata element in the body during parsing.
    let out = serialize(r#"<p>x</p><link rel="mw:PageProp/Category" href="./Category:Birds">"#)
        .unwrap();
    assert_eq!(out, "x\n[[Category:Birds]]");
}

#[test]
fn page_prop_magic_word() {
    let out = serialize(r#"<p>x</p><meta property="mw:PageProp/notoc">"#).unwrap();
    assert_eq!(out, "x\n__NOTOC__");
}

#[test]
fn html_fallback_preserves_tag() {
    let out = serialize(r#"<div class="x">y</div>"#).unwrap();
    assert_eq!(out, r#"<div class="x">y</div>"#);
}

#[test]
fn html_syntax_list_stays_html() {
    let out = serialize(
        r#"<ul data-parsoid='{"stx":"html"}'><li data-parsoid='{"stx":"html"}'>a</li></ul>"#,
    )
    .unwrap();
    assert_eq!(out, "<ul><li>a</li></ul>");
}

#[test]
fn auto_inserted_close_tag_omitted() {
    let out = serialize(
        r#"<div data-parsoid='{"stx":"html","autoInsertedEnd":true}'>y</div>"#,
    )
    .unwrap();
    assert_eq!(out, "<div>y");
}

#[test]
fn indent_pre() {
    let out = serialize("<pre>a\nb</pre>").unwrap();
    assert_eq!(out, " a\n b");
}

#[test]
fn html_pre_keeps_content_verbatim() {
    let out = serialize(r#"<pre data-parsoid='{"stx":"html"}'>*a*</pre>"#).unwrap();
    assert_eq!(out, "<pre>*a*</pre>");
}

#[test]
fn comment_travels_with_separator() {
    let out = serialize("<p>a</p><!-- note --><p>b</p>").unwrap();
    assert_eq!(out, "a<!-- note -->\n\nb");
}

#[test]
fn template_with_added_named_param() {
    let html = concat!(
        r##"<span about="#mwt1" typeof="mw:Transclusion" "##,
        r#"data-parsoid='{"pi":[[{"k":"1"}]]}' "#,
        r#"data-mw='{"parts":[{"template":{"target":{"wt":"echo"},"#,
        r#""params":{"1":{"wt":"a"},"x":{"wt":"b"}},"i":0}}]}'>a</span>"#,
    );
    let out = serialize(html).unwrap();
    assert_eq!(out, "{{echo|a|x=b}}");
}

#[test]
fn template_literal_parts_concatenate() {
    let html = concat!(
        r##"<span about="#mwt1" typeof="mw:Transclusion" "##,
        r#"data-mw='{"parts":["before ",{"template":{"target":{"wt":"x"},"params":{},"i":0}}]}'>a</span>"#,
    );
    let out = serialize(html).unwrap();
    assert_eq!(out, "before {{x}}");
}

#[test]
fn extension_with_extsrc_body() {
    let html = concat!(
        r##"<p><span typeof="mw:Extension/ref" about="#mwt2" "##,
        r#"data-mw='{"name":"ref","attrs":{"name":"a"},"body":{"extsrc":"text"}}'>x</span></p>"#,
    );
    let out = serialize(html).unwrap();
    assert_eq!(out, r#"<ref name="a">text</ref>"#);
}

#[test]
fn extension_without_body_self_closes() {
    let html = concat!(
        r##"<span typeof="mw:Extension/references" about="#mwt3" "##,
        r#"data-mw='{"name":"references"}'>x</span>"#,
    );
    let out = serialize(html).unwrap();
    assert_eq!(out, "<references />");
}

#[test]
fn extension_with_unresolvable_body_dropped() {
    let html = concat!(
        r##"<span typeof="mw:Extension/ref" about="#mwt4" "##,
        r#"data-mw='{"name":"ref","body":{"id":"missing"}}'>x</span>"#,
    );
    let out = serialize(html).unwrap();
    assert_eq!(out, "");
}

#[test]
fn envelope_serialized_once() {
    // Two spans share the about id; the second is part of the envelope and
    // must not serialize separately.
    let html = concat!(
        r##"<span about="#mwt1" typeof="mw:Transclusion" "##,
        r#"data-mw='{"parts":[{"template":{"target":{"wt":"x"},"params":{},"i":0}}]}'>a</span>"#,
        r##"<span about="#mwt1">b</span>"##,
        r#"<span>after</span>"#,
    );
    let out = serialize(html).unwrap();
    assert_eq!(out, "{{x}}<span>after</span>");
}

#[test]
fn wiki_table() {
    let html = concat!(
        "<table><tbody>",
        "<tr><td>a</td><td>b</td></tr>",
        "<tr><td>c</td></tr>",
        "</tbody></table>",
    );
    let out = serialize(html).unwrap();
    assert_eq!(out, "{|\n|a\n|b\n|-\n|c\n|}");
}

#[test]
fn wiki_table_same_row_cells() {
    let html = concat!(
        "<table><tbody>",
        r#"<tr><td>a</td><td data-parsoid='{"stx":"row"}'>b</td></tr>"#,
        "</tbody></table>",
    );
    let out = serialize(html).unwrap();
    assert_eq!(out, "{|\n|a||b\n|}");
}

#[test]
fn table_header_cells() {
    let html = "<table><tbody><tr><th>h</th></tr><tr><td>d</td></tr></tbody></table>";
    let out = serialize(html).unwrap();
    assert_eq!(out, "{|\n!h\n|-\n|d\n|}");
}

#[test]
fn sanitized_attribute_restored() {
    let html = concat!(
        r#"<span class="foo" "#,
        r#"data-parsoid='{"stx":"html","a":{"style":null},"sa":{"style":"color:red"}}'>a</span>"#,
    );
    let out = serialize(html).unwrap();
    assert_eq!(out, r#"<span class="foo" style="color:red">a</span>"#);
}
