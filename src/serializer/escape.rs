// Escaping.
//
// The oracle decides whether a text fragment, emitted in the current
// context, would be read back as markup, and wraps it in nowiki guards when
// it would. The serializer core treats the oracle as total: it never fails,
// and it is bypassed entirely inside `<nowiki>` and HTML `<pre>`.

use std::sync::LazyLock;

use regex::Regex;

/// Context the emit layer hands to the oracle alongside the candidate text.
#[derive(Debug, Clone)]
pub struct EscapeContext {
    pub on_sol: bool,
    pub in_attribute: bool,
    pub in_single_line: bool,
    /// The unterminated output line preceding the candidate.
    pub current_line: String,
}

/// Outcome of escaping a template argument value.
#[derive(Debug, Clone)]
pub struct TemplateArgEscape {
    pub value: String,
    /// The value cannot survive in positional form and must be named.
    pub force_named: bool,
}

/// Decides escaping strategy for emitted text.
pub trait EscapeOracle {
    /// Escape a text fragment for the given context.
    fn escape_text(&self, ctx: &EscapeContext, text: &str) -> String;

    /// Escape a template argument value.
    fn escape_template_arg(&self, value: &str, positional: bool) -> TemplateArgEscape {
        default_template_arg(value, positional)
    }
}

/// Structural wikitext the re-parser would act on anywhere in a line.
static STRUCTURAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?x)
          ''
        | \[\[ | \]\]
        | \{\{ | \}\}
        | \{\|
        | ~~~
        | <!--
        | </?[a-zA-Z]
    ")
    .expect("structural pattern")
});

/// Characters that begin a line construct when they appear at SOL.
/// `|` and `!` only bite inside table context, approximated here by the
/// single-line regions tables open.
fn sol_sensitive(text: &str, in_table: bool) -> Option<usize> {
    let bytes = text.as_bytes();
    match bytes.first()? {
        b'*' | b'#' | b':' | b';' | b'=' => Some(1),
        b' ' | b'\t' => {
            // The whole leading whitespace run triggers indent-pre.
            Some(
                text.find(|c: char| c != ' ' && c != '\t')
                    .unwrap_or(text.len()),
            )
        }
        b'-' if text.starts_with("----") => Some(4),
        b'!' | b'|' if in_table => Some(1),
        _ => None,
    }
}

/// The built-in escape oracle.
#[derive(Debug, Clone, Copy, Default)]
pub struct WikitextEscaper;

impl EscapeOracle for WikitextEscaper {
    fn escape_text(&self, ctx: &EscapeContext, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        if STRUCTURAL.is_match(text) {
            return nowiki_wrap(text);
        }

        // Attribute values never sit at start-of-line in the output.
        if ctx.on_sol && !ctx.in_attribute {
            if let Some(len) = sol_sensitive(text, ctx.in_single_line) {
                let (head, tail) = text.split_at(len);
                return format!("<nowiki>{head}</nowiki>{tail}");
            }
        }

        // A leading quote after a line already ending in one would fuse.
        if text.starts_with('\'') && ctx.current_line.ends_with('\'') {
            return format!("<nowiki/>{text}");
        }

        text.to_string()
    }
}

/// Wrap a fragment in `<nowiki>`, entity-escaping any interior close tag so
/// the guard cannot terminate early.
pub(crate) fn nowiki_wrap(text: &str) -> String {
    let inner = text.replace("</nowiki>", "&lt;/nowiki&gt;");
    format!("<nowiki>{inner}</nowiki>")
}

fn default_template_arg(value: &str, positional: bool) -> TemplateArgEscape {
    let force_named = positional && value.contains('=');
    let value = if value.contains('|') || value.contains("}}") {
        nowiki_wrap(value)
    } else {
        value.to_string()
    };
    TemplateArgEscape { value, force_named }
}

/// Entity-escape the characters that would otherwise start an HTML tag or
/// character reference when the output is re-parsed: `<` before a tag-like
/// sequence and `&` before an entity-like one. Everything else passes
/// through untouched.
pub(crate) fn escape_entities(text: &str) -> String {
    static AMP_ENTITY: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(?:#[xX]?[0-9a-fA-F]+|[a-zA-Z][a-zA-Z0-9]*);").expect("entity pattern"));

    let bytes = text.as_bytes();
    let mut result = String::with_capacity(text.len());
    let mut last = 0;
    for (i, &b) in bytes.iter().enumerate() {
        let replacement = match b {
            b'<' => {
                let next = bytes.get(i + 1);
                if next.is_some_and(|c| c.is_ascii_alphabetic() || matches!(c, b'/' | b'!')) {
                    Some("&lt;")
                } else {
                    None
                }
            }
            b'&' => {
                if AMP_ENTITY.is_match(&text[i + 1..]) {
                    Some("&amp;")
                } else {
                    None
                }
            }
            _ => None,
        };
        if let Some(rep) = replacement {
            result.push_str(&text[last..i]);
            result.push_str(rep);
            last = i + 1;
        }
    }
    if last == 0 {
        return text.to_string();
    }
    result.push_str(&text[last..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(on_sol: bool, line: &str) -> EscapeContext {
        EscapeContext {
            on_sol,
            in_attribute: false,
            in_single_line: false,
            current_line: line.to_string(),
        }
    }

    #[test]
    fn plain_text_untouched() {
        let out = WikitextEscaper.escape_text(&ctx(true, ""), "just words");
        assert_eq!(out, "just words");
    }

    #[test]
    fn structural_sequences_get_wrapped() {
        let out = WikitextEscaper.escape_text(&ctx(false, "x"), "a [[b]] c");
        assert_eq!(out, "<nowiki>a [[b]] c</nowiki>");
    }

    #[test]
    fn sol_list_char_gets_guard() {
        let out = WikitextEscaper.escape_text(&ctx(true, ""), "*not a list");
        assert_eq!(out, "<nowiki>*</nowiki>not a list");
    }

    #[test]
    fn sol_leading_space_wraps_run() {
        let out = WikitextEscaper.escape_text(&ctx(true, ""), "  indented");
        assert_eq!(out, "<nowiki>  </nowiki>indented");
    }

    #[test]
    fn mid_line_list_char_untouched() {
        let out = WikitextEscaper.escape_text(&ctx(false, "foo "), "*stars*");
        assert_eq!(out, "*stars*");
    }

    #[test]
    fn template_arg_pipe_forces_nowiki() {
        let escaped = default_template_arg("a|b", true);
        assert_eq!(escaped.value, "<nowiki>a|b</nowiki>");
        assert!(!escaped.force_named);
    }

    #[test]
    fn template_arg_equals_forces_named() {
        let escaped = default_template_arg("a=b", true);
        assert!(escaped.force_named);
        assert_eq!(escaped.value, "a=b");
    }

    #[test]
    fn entities_escaped_selectively() {
        assert_eq!(escape_entities("a < b"), "a < b");
        assert_eq!(escape_entities("a <b>"), "a &lt;b>");
        assert_eq!(escape_entities("fish & chips"), "fish & chips");
        assert_eq!(escape_entities("&amp; &#x20;"), "&amp;amp; &amp;#x20;");
    }
}
