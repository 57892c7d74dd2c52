// Selective serialization tests: unmodified regions come back byte-for-byte
// from the original source; only modified regions re-serialize.

use std::sync::Arc;

use html2wikitext::{serialize_with, Options};
use markup5ever_rcdom::Handle;
use pretty_assertions::assert_eq;

fn selser(html: &str, original: &str) -> String {
    let options = Options::new()
        .with_selser(true)
        .with_original_source(original);
    serialize_with(html, &options).unwrap()
}

#[test]
fn unmodified_italic_reuses_source() {
    let out = selser(
        r#"<i data-parsoid='{"dsr":[0,7,2,2],"stx":"wiki"}'>foo</i>"#,
        "''foo''",
    );
    assert_eq!(out, "''foo''");
}

#[test]
fn modified_node_reserialized() {
    let html = concat!(
        r#"<i data-parsoid='{"dsr":[0,7,2,2],"stx":"wiki"}' "#,
        r#"data-parsoid-diff='{"diff":["children-changed"]}'>bar</i>"#,
    );
    let out = selser(html, "''foo''");
    assert_eq!(out, "''bar''");
}

#[test]
fn unmodified_sibling_bytes_preserved() {
    let html = concat!(
        r#"<p data-parsoid='{"dsr":[0,1,0,0]}'>a</p>"#,
        r#"<p data-parsoid-diff='{"diff":["inserted"]}'>c</p>"#,
    );
    let out = selser(html, "a\n\nb");
    assert_eq!(out, "a\n\nc");
}

#[test]
fn invalid_dsr_disqualifies_reuse() {
    let out = selser(
        r#"<i data-parsoid='{"dsr":[9,3,2,2],"stx":"wiki"}'>foo</i>"#,
        "''zzz''",
    );
    assert_eq!(out, "''foo''");
}

#[test]
fn out_of_range_dsr_disqualifies_reuse() {
    let out = selser(
        r#"<i data-parsoid='{"dsr":[0,99,2,2],"stx":"wiki"}'>foo</i>"#,
        "''zzz''",
    );
    assert_eq!(out, "''foo''");
}

#[test]
fn source_check_can_veto_reuse() {
    let options = Options::new()
        .with_selser(true)
        .with_original_source("''zzz''")
        .with_selser_src_check(Arc::new(|_: &Handle| false));
    let out = serialize_with(
        r#"<i data-parsoid='{"dsr":[0,7,2,2],"stx":"wiki"}'>foo</i>"#,
        &options,
    )
    .unwrap();
    assert_eq!(out, "''foo''");
}

#[test]
fn unmodified_wrapper_reused_around_modified_children() {
    let html = concat!(
        r#"<h2 data-parsoid='{"dsr":[0,5,2,2]}' "#,
        r#"data-parsoid-diff='{"diff":["subtree-changed"]}'>X</h2>"#,
    );
    let out = selser(html, "==T==");
    assert_eq!(out, "==X==");
}

#[test]
fn template_envelope_reused_as_one_unit() {
    let html = concat!(
        r##"<span about="#mwt1" typeof="mw:Transclusion" "##,
        r#"data-parsoid='{"dsr":[0,10,0,0]}' "#,
        r#"data-mw='{"parts":[{"template":{"target":{"wt":"echo"},"params":{},"i":0}}]}'>a</span>"#,
        r##"<span about="#mwt1">b</span>"##,
    );
    let out = selser(html, "{{echo|x}}");
    assert_eq!(out, "{{echo|x}}");
}
