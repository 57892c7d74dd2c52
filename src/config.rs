// Wiki constants consulted throughout serialization: tag classes and the
// SOL-transparent wikitext recognizer.

use std::sync::LazyLock;

use regex::Regex;

/// HTML5 void elements (no closing tag).
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose presence on a line defeats indent-pre interpretation.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "caption", "center", "dd", "dir", "div", "dl",
    "dt", "fieldset", "figcaption", "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "hgroup", "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "tbody",
    "td", "tfoot", "th", "thead", "tr", "ul",
];

/// List-structure tags whose children inherit the parent's surface syntax.
const LIST_ELEMENTS: &[&str] = &["ul", "ol", "dl"];
const LIST_ITEM_ELEMENTS: &[&str] = &["li", "dt", "dd"];

/// Table-structure tags; parents on the left may directly contain the
/// children on the right in wiki syntax.
const TABLE_PARENTS: &[&str] = &["table", "tbody", "thead", "tfoot", "tr"];
const TABLE_CHILDREN: &[&str] = &["caption", "tbody", "thead", "tfoot", "tr", "td", "th"];

/// Wikitext that is invisible at start-of-line for the purpose of line-based
/// constructs: comments, category links, include directives, and whitespace.
static SOL_TRANSPARENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)^(?:
            [\ \t]
          | (?s:<!--.*?-->)
          | \[\[[cC]ategory:[^\]]*\]\]
          | <(?:/?)(?:includeonly|noinclude|onlyinclude)(?:\s[^>]*)?>
        )*$",
    )
    .expect("sol-transparent pattern")
});

/// An opening or closing tag of a block element.
static BLOCK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    let names = BLOCK_ELEMENTS.join("|");
    Regex::new(&format!(r"(?i)</?(?:{names})(?:\s[^>]*)?/?>")).expect("block-tag pattern")
});

/// Wiki constants provided to the serializer through its options.
#[derive(Debug, Clone, Default)]
pub struct WikiConfig {}

impl WikiConfig {
    pub fn is_void(&self, tag: &str) -> bool {
        VOID_ELEMENTS.contains(&tag)
    }

    pub fn is_block(&self, tag: &str) -> bool {
        BLOCK_ELEMENTS.contains(&tag)
    }

    pub fn is_list(&self, tag: &str) -> bool {
        LIST_ELEMENTS.contains(&tag)
    }

    pub fn is_list_item(&self, tag: &str) -> bool {
        LIST_ITEM_ELEMENTS.contains(&tag)
    }

    pub fn is_table_parent(&self, tag: &str) -> bool {
        TABLE_PARENTS.contains(&tag)
    }

    pub fn is_table_child(&self, tag: &str) -> bool {
        TABLE_CHILDREN.contains(&tag)
    }

    /// Whether a string is entirely SOL-transparent wikitext.
    pub fn is_sol_transparent(&self, text: &str) -> bool {
        SOL_TRANSPARENT.is_match(text)
    }

    /// Whether a string contains at least one block-level HTML tag.
    pub fn has_block_tag(&self, text: &str) -> bool {
        BLOCK_TAG.is_match(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_classes() {
        let config = WikiConfig::default();
        assert!(config.is_void("br"));
        assert!(!config.is_void("div"));
        assert!(config.is_block("table"));
        assert!(!config.is_block("span"));
    }

    #[test]
    fn sol_transparency() {
        let config = WikiConfig::default();
        assert!(config.is_sol_transparent(""));
        assert!(config.is_sol_transparent(" <!-- note --> "));
        assert!(config.is_sol_transparent("[[Category:Birds]]"));
        assert!(!config.is_sol_transparent("text"));
    }

    #[test]
    fn block_tag_detection() {
        let config = WikiConfig::default();
        assert!(config.has_block_tag("x <div class=\"a\">y</div>"));
        assert!(!config.has_block_tag("x <span>y</span>"));
    }
}
