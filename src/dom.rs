// Accessors over the rcdom tree.
//
// The serializer never mutates the input DOM; everything here is a read-only
// view. Nodes are identified by `Rc` pointer where identity matters (sibling
// position, per-node bookkeeping).

use markup5ever_rcdom::{Handle, NodeData};

/// Get the lowercase tag name of an element node.
pub(crate) fn tag_name(handle: &Handle) -> Option<&str> {
    if let NodeData::Element { ref name, .. } = handle.data {
        Some(name.local.as_ref())
    } else {
        None
    }
}

pub(crate) fn is_element(handle: &Handle) -> bool {
    matches!(handle.data, NodeData::Element { .. })
}

pub(crate) fn is_text(handle: &Handle) -> bool {
    matches!(handle.data, NodeData::Text { .. })
}

pub(crate) fn is_comment(handle: &Handle) -> bool {
    matches!(handle.data, NodeData::Comment { .. })
}

pub(crate) fn is_element_named(handle: &Handle, name: &str) -> bool {
    tag_name(handle) == Some(name)
}

/// Get the value of an attribute on an element node.
pub(crate) fn get_attr(handle: &Handle, name: &str) -> Option<String> {
    if let NodeData::Element { ref attrs, .. } = handle.data {
        for attr in attrs.borrow().iter() {
            if attr.name.local.as_ref() == name {
                return Some(attr.value.to_string());
            }
        }
    }
    None
}

pub(crate) fn has_attr(handle: &Handle, name: &str) -> bool {
    get_attr(handle, name).is_some()
}

/// Snapshot of the live attribute list as (key, value) pairs, in DOM order.
pub(crate) fn attr_pairs(handle: &Handle) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    if let NodeData::Element { ref attrs, .. } = handle.data {
        for attr in attrs.borrow().iter() {
            pairs.push((attr.name.local.as_ref().to_string(), attr.value.to_string()));
        }
    }
    pairs
}

/// The text of a text node, or None for other node kinds.
pub(crate) fn text_value(handle: &Handle) -> Option<String> {
    if let NodeData::Text { ref contents } = handle.data {
        Some(contents.borrow().to_string())
    } else {
        None
    }
}

/// The payload of a comment node, without the `<!-- -->` delimiters.
pub(crate) fn comment_value(handle: &Handle) -> Option<String> {
    if let NodeData::Comment { ref contents } = handle.data {
        Some(contents.to_string())
    } else {
        None
    }
}

/// Snapshot of a node's children. The DOM is read-only during serialization,
/// so a cloned Vec of handles stays in sync with the tree.
pub(crate) fn child_nodes(handle: &Handle) -> Vec<Handle> {
    handle.children.borrow().iter().cloned().collect()
}

pub(crate) fn first_child(handle: &Handle) -> Option<Handle> {
    handle.children.borrow().first().cloned()
}

/// Upgrade the parent weak reference. rcdom keeps the parent in a `Cell`, so
/// it has to be taken out and put back.
pub(crate) fn parent(handle: &Handle) -> Option<Handle> {
    let weak = handle.parent.take();
    handle.parent.set(weak.clone());
    weak.and_then(|w| w.upgrade())
}

pub(crate) fn same_node(a: &Handle, b: &Handle) -> bool {
    std::rc::Rc::ptr_eq(a, b)
}

fn sibling_at_offset(handle: &Handle, offset: isize) -> Option<Handle> {
    let parent = parent(handle)?;
    let children = parent.children.borrow();
    let idx = children.iter().position(|c| same_node(c, handle))?;
    let target = idx as isize + offset;
    if target < 0 {
        return None;
    }
    children.get(target as usize).cloned()
}

pub(crate) fn next_sibling(handle: &Handle) -> Option<Handle> {
    sibling_at_offset(handle, 1)
}

pub(crate) fn prev_sibling(handle: &Handle) -> Option<Handle> {
    sibling_at_offset(handle, -1)
}

/// Depth-first search for an element with the given `id` attribute.
pub(crate) fn find_element_by_id(root: &Handle, id: &str) -> Option<Handle> {
    if is_element(root) && get_attr(root, "id").as_deref() == Some(id) {
        return Some(root.clone());
    }
    for child in root.children.borrow().iter() {
        if let Some(found) = find_element_by_id(child, id) {
            return Some(found);
        }
    }
    None
}

/// Locate the `<body>` element under a document node.
pub(crate) fn find_body(document: &Handle) -> Option<Handle> {
    fn walk(handle: &Handle) -> Option<Handle> {
        if is_element_named(handle, "body") {
            return Some(handle.clone());
        }
        for child in handle.children.borrow().iter() {
            if let Some(found) = walk(child) {
                return Some(found);
            }
        }
        None
    }
    walk(document)
}

/// Whether a node's `typeof` contains the given token (exact match on a
/// whitespace-separated list, or a prefix match when `token` ends with `/`).
pub(crate) fn has_type_of(handle: &Handle, token: &str) -> bool {
    match get_attr(handle, "typeof") {
        Some(value) => value.split_ascii_whitespace().any(|t| {
            if let Some(prefix) = token.strip_suffix('/') {
                t.starts_with(prefix) && t.as_bytes().get(prefix.len()) == Some(&b'/')
            } else {
                t == token
            }
        }),
        None => false,
    }
}

/// First wrapper of an encapsulated (template/extension) region: it carries
/// an encapsulation `typeof` and is not preceded by a sibling with the same
/// `about` id.
pub(crate) fn is_encapsulation_wrapper(handle: &Handle) -> bool {
    has_type_of(handle, "mw:Transclusion")
        || has_type_of(handle, "mw:Extension/")
        || has_type_of(handle, "mw:Param")
}

pub(crate) fn is_first_encapsulation_wrapper(handle: &Handle) -> bool {
    if !is_encapsulation_wrapper(handle) {
        return false;
    }
    let about = match get_attr(handle, "about") {
        Some(a) => a,
        None => return true,
    };
    match prev_sibling(handle) {
        Some(prev) => get_attr(&prev, "about").as_deref() != Some(about.as_str()),
        None => true,
    }
}

/// Step past every sibling belonging to the same `about` envelope and return
/// the first node after it.
pub(crate) fn skip_about_siblings(handle: &Handle) -> Option<Handle> {
    let about = get_attr(handle, "about");
    let mut next = next_sibling(handle);
    if let Some(about) = about {
        while let Some(ref n) = next {
            let same = get_attr(n, "about").as_deref() == Some(about.as_str())
                // Whitespace between envelope siblings is part of the span.
                || text_value(n).is_some_and(|t| t.trim().is_empty());
            if !same {
                break;
            }
            next = next_sibling(n);
        }
    }
    next
}
