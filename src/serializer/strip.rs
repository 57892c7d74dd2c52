// Post-pass stripping of redundant escape markers.
//
// The escape paths are deliberately eager; once the whole buffer exists,
// three line-oriented rewrites remove the guards that turned out to be
// unnecessary. Every rewrite is best-effort: a line whose bracket or quote
// pairing does not work out is left alone.

use std::sync::LazyLock;

use regex::Regex;

use super::State;
use crate::config::WikiConfig;

/// Run the enabled post-passes over the final buffer.
pub(crate) fn postprocess(out: String, state: &State) -> String {
    let mut result = out;
    if state.has_indent_pre_nowikis {
        result = strip_indent_pre_nowikis(
            &state.opts.config,
            state.opts.scrub_wikitext,
            &result,
        );
    }
    if state.has_quote_nowikis {
        result = each_line(&result, strip_quote_nowikis_line);
    }
    if state.has_self_closing_nowikis {
        result = strip_trailing_nowikis(&result);
    }
    result
}

fn each_line(out: &str, f: impl Fn(&str) -> String) -> String {
    out.split('\n').map(f).collect::<Vec<_>>().join("\n")
}

// ---------------------------------------------------------------------------
// Indent-pre nowikis
// ---------------------------------------------------------------------------

/// SOL, a SOL-transparent prefix, then `<nowiki>WS</nowiki>` guarding
/// leading whitespace against indent-pre interpretation.
static INDENT_PRE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^((?:[ \t]|<!--.*?-->|\[\[[cC]ategory:[^\]]*\]\])*)<nowiki>([ \t]+)</nowiki>(.*)$",
    )
    .expect("indent-pre line pattern")
});

/// The guard is redundant when the rest of the line is entirely
/// SOL-transparent, or contains a block-level tag (either way the line no
/// longer starts an indent-pre block). With `scrub_wikitext`, the guarded
/// whitespace itself goes too in the remaining case.
fn strip_indent_pre_nowikis(config: &WikiConfig, scrub: bool, out: &str) -> String {
    INDENT_PRE_LINE
        .replace_all(out, |caps: &regex::Captures<'_>| {
            let (prefix, ws, rest) = (&caps[1], &caps[2], &caps[3]);
            if config.is_sol_transparent(rest) || config.has_block_tag(rest) {
                format!("{prefix}{ws}{rest}")
            } else if scrub {
                format!("{prefix}{rest}")
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

// ---------------------------------------------------------------------------
// Quote-adjacent nowikis
// ---------------------------------------------------------------------------

static QUOTE_TOKENS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"'''''|'''|''|\[\[|\]\]|\{\{|\}\}|</\w+\s*>|<\w+(?:\s[^>]*)?/?>")
        .expect("quote token pattern")
});

static NOWIKI_SELF_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<nowiki\s*/>$").expect("nowiki self-close pattern"));

fn is_quote_marker(token: &str) -> bool {
    matches!(token, "''" | "'''" | "'''''")
}

fn tag_name_of(token: &str) -> Option<&str> {
    let rest = token.strip_prefix('<')?;
    let rest = rest.strip_prefix('/').unwrap_or(rest);
    let end = rest
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Split a line into alternating text and delimiter tokens (delimiters at
/// odd indices).
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut last = 0;
    for m in QUOTE_TOKENS.find_iter(line) {
        tokens.push(line[last..m.start()].to_string());
        tokens.push(m.as_str().to_string());
        last = m.end();
    }
    tokens.push(line[last..].to_string());
    tokens
}

/// Strip `<nowiki/>` guards sitting between a single trailing `'` and a
/// quote marker, where the quote balance shows the guard changes nothing.
fn strip_quote_nowikis_line(line: &str) -> String {
    if !line.contains("<nowiki/>") || !line.contains('\'') {
        return line.to_string();
    }

    let tokens = tokenize(line);
    let mut bracket_stack: Vec<&str> = Vec::new();
    let mut quote_stack: Vec<&str> = Vec::new();
    let mut ignore_until: Option<&str> = None;
    let mut strip: Vec<usize> = Vec::new();

    let mut j = 1;
    while j < tokens.len() {
        let token = tokens[j].as_str();

        if let Some(name) = ignore_until {
            if token.starts_with("</") && tag_name_of(token) == Some(name) {
                ignore_until = None;
            }
            j += 2;
            continue;
        }

        match token {
            "[[" => bracket_stack.push("]]"),
            "{{" => bracket_stack.push("}}"),
            "]]" | "}}" => {
                if bracket_stack.pop() != Some(token) {
                    return line.to_string();
                }
            }
            _ if is_quote_marker(token) => {
                if quote_stack.last() == Some(&token) {
                    quote_stack.pop();
                } else {
                    quote_stack.push(token);
                }
            }
            _ if token.ends_with("/>") => {
                if NOWIKI_SELF_CLOSE.is_match(token) && strippable(&tokens, j, &quote_stack) {
                    strip.push(j);
                }
                // Other self-closing tags are skipped.
            }
            _ if token.starts_with("</") => {}
            _ => match tag_name_of(token) {
                Some(name @ ("ref" | "nowiki")) => ignore_until = Some(name),
                _ => {}
            },
        }
        j += 2;
    }

    if !bracket_stack.is_empty() || !quote_stack.is_empty() || strip.is_empty() {
        return line.to_string();
    }

    tokens
        .iter()
        .enumerate()
        .filter(|(i, _)| !strip.contains(i))
        .map(|(_, t)| t.as_str())
        .collect()
}

/// A guard at `j` is strippable when it separates a single trailing `'`
/// from a following quote marker, and either no quote is open, or exactly
/// one is and the line has the closing shape
/// `['', "''", …skipped guards…, "x'", "<nowiki/>", "", "''"]`.
fn strippable(tokens: &[String], j: usize, quote_stack: &[&str]) -> bool {
    let prev_text = &tokens[j - 1];
    if !prev_text.ends_with('\'') || prev_text.ends_with("''") {
        return false;
    }
    if !tokens.get(j + 1).is_some_and(|t| t.is_empty()) {
        return false;
    }
    if !tokens.get(j + 2).is_some_and(|t| is_quote_marker(t)) {
        return false;
    }

    if quote_stack.is_empty() {
        return true;
    }
    if quote_stack.len() != 1 {
        return false;
    }

    // Closing shape: the line opens with the `''`, the guard sits right
    // before the final `''` that closes it, and every delimiter in between
    // is a skipped self-closing tag.
    let last_delim = tokens.len() - 2;
    tokens[0].is_empty()
        && tokens[1] == "''"
        && j + 2 == last_delim
        && tokens[j + 2] == "''"
        && tokens[last_delim + 1].is_empty()
        && (3..j)
            .step_by(2)
            .all(|i| tokens[i].ends_with("/>"))
}

// ---------------------------------------------------------------------------
// Trailing self-closing nowikis
// ---------------------------------------------------------------------------

/// A run of `<nowiki/>` at end of line carries nothing — unless the line
/// contains `=`, where it may be keeping a template parameter non-empty.
static TRAILING_NOWIKIS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^([^=\n]*?)(?:<nowiki\s*/>[ \t]*)+$").expect("trailing nowiki pattern")
});

fn strip_trailing_nowikis(out: &str) -> String {
    TRAILING_NOWIKIS.replace_all(out, "$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> WikiConfig {
        WikiConfig::default()
    }

    #[test]
    fn indent_pre_guard_stripped_before_block_tag() {
        let out = strip_indent_pre_nowikis(&config(), false, "<nowiki> </nowiki><div>x</div>");
        assert_eq!(out, " <div>x</div>");
    }

    #[test]
    fn indent_pre_guard_kept_before_plain_text() {
        let line = "<nowiki> </nowiki>plain";
        assert_eq!(strip_indent_pre_nowikis(&config(), false, line), line);
    }

    #[test]
    fn indent_pre_guard_and_space_dropped_when_scrubbing() {
        let out = strip_indent_pre_nowikis(&config(), true, "<nowiki> </nowiki>plain");
        assert_eq!(out, "plain");
    }

    #[test]
    fn indent_pre_guard_stripped_when_rest_transparent() {
        let out = strip_indent_pre_nowikis(
            &config(),
            false,
            "<nowiki> </nowiki><!-- note -->",
        );
        assert_eq!(out, " <!-- note -->");
    }

    #[test]
    fn quote_guard_stripped_at_zero_depth() {
        let out = strip_quote_nowikis_line("foo'<nowiki/>''bar''");
        assert_eq!(out, "foo'''bar''");
    }

    #[test]
    fn quote_guard_stripped_in_closing_shape() {
        let out = strip_quote_nowikis_line("''bar'<nowiki/>''");
        assert_eq!(out, "''bar'''");
    }

    #[test]
    fn only_trailing_quote_guard_stripped() {
        let out = strip_quote_nowikis_line("''<nowiki/>'foo'<nowiki/>''");
        assert_eq!(out, "''<nowiki/>'foo'''");
    }

    #[test]
    fn unbalanced_line_left_alone() {
        let line = "[[foo' <nowiki/>''bar''";
        assert_eq!(strip_quote_nowikis_line(line), line);
    }

    #[test]
    fn guards_inside_nowiki_region_ignored() {
        let line = "<nowiki>foo'<nowiki/>''</nowiki>x";
        assert_eq!(strip_quote_nowikis_line(line), line);
    }

    #[test]
    fn trailing_nowikis_removed() {
        assert_eq!(strip_trailing_nowikis("foo<nowiki/>"), "foo");
        assert_eq!(strip_trailing_nowikis("foo<nowiki/> <nowiki/>"), "foo");
    }

    #[test]
    fn trailing_nowiki_kept_for_template_params() {
        let line = "|param = <nowiki/>";
        assert_eq!(strip_trailing_nowikis(line), line);
    }

    #[test]
    fn passes_are_idempotent() {
        let once = strip_quote_nowikis_line("foo'<nowiki/>''bar''");
        assert_eq!(strip_quote_nowikis_line(&once), once);

        let once = strip_indent_pre_nowikis(&config(), false, "<nowiki> </nowiki><div>x</div>");
        assert_eq!(
            strip_indent_pre_nowikis(&config(), false, &once),
            once
        );
    }
}
