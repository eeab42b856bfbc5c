//! Field-selection expressions.
//!
//! A selection string names which fields (and, recursively, which sub-fields)
//! a client wants back:
//!
//! ```text
//! one,two{one,two},three
//! ```
//!
//! parses to
//!
//! ```text
//! one   -> (all)
//! two   -> { one -> (all), two -> (all) }
//! three -> (all)
//! ```
//!
//! Unknown names are not a parse error; filtering happens when the tree is
//! resolved against a schema.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::SelectionError;

/// Deepest brace nesting accepted in a selection string.
pub const MAX_SELECTION_DEPTH: usize = 32;

/// Parsed selection tree.
///
/// Each key maps to `None` (leaf: no further restriction below this field)
/// or to a nested selection restricting that field's sub-fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Selection {
    entries: BTreeMap<String, Option<Selection>>,
}

struct Frame {
    tree: Selection,
    /// Name the brace group belongs to; `None` for the root or a nameless group.
    owner: Option<String>,
    token: String,
    opened_at: usize,
}

impl Frame {
    fn new(owner: Option<String>, opened_at: usize) -> Self {
        Self {
            tree: Selection::default(),
            owner,
            token: String::new(),
            opened_at,
        }
    }

    /// Insert the pending token as a leaf and clear it.
    fn flush(&mut self) {
        let name = self.token.trim();
        if !name.is_empty() {
            self.tree.entries.insert(name.to_string(), None);
        }
        self.token.clear();
    }
}

impl Selection {
    /// Parse a selection string.
    ///
    /// Duplicate names at one level resolve to the last occurrence.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::Unbalanced` when braces do not match, or
    /// `SelectionError::TooDeep` beyond [`MAX_SELECTION_DEPTH`].
    pub fn parse(input: &str) -> Result<Self, SelectionError> {
        let mut stack = vec![Frame::new(None, 0)];

        for (pos, c) in input.char_indices() {
            match c {
                ',' => current(&mut stack).flush(),
                '{' => {
                    if stack.len() > MAX_SELECTION_DEPTH {
                        return Err(SelectionError::TooDeep {
                            max: MAX_SELECTION_DEPTH,
                        });
                    }
                    let top = current(&mut stack);
                    let name = top.token.trim().to_string();
                    top.token.clear();
                    let owner = (!name.is_empty()).then_some(name);
                    stack.push(Frame::new(owner, pos));
                }
                '}' => {
                    if stack.len() == 1 {
                        return Err(SelectionError::Unbalanced { position: pos });
                    }
                    let Some(mut closed) = stack.pop() else {
                        return Err(SelectionError::Unbalanced { position: pos });
                    };
                    closed.flush();
                    if let Some(owner) = closed.owner {
                        current(&mut stack)
                            .tree
                            .entries
                            .insert(owner, Some(closed.tree));
                    } else {
                        tracing::debug!(position = closed.opened_at, "discarding nameless selection group");
                    }
                }
                other => current(&mut stack).token.push(other),
            }
        }

        if stack.len() > 1 {
            let position = stack.last().map(|f| f.opened_at).unwrap_or_default();
            return Err(SelectionError::Unbalanced { position });
        }

        let mut root = stack.pop().unwrap_or_else(|| Frame::new(None, 0));
        root.flush();
        Ok(root.tree)
    }

    /// Parse an optional selection string; `None` means "no selector".
    pub fn parse_opt(input: Option<&str>) -> Result<Option<Self>, SelectionError> {
        input.map(Selection::parse).transpose()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Sub-selection for `name`.
    ///
    /// `None` both when the name is a leaf and when it is absent; callers
    /// check [`Selection::contains`] first.
    pub fn get(&self, name: &str) -> Option<&Selection> {
        self.entries.get(name).and_then(Option::as_ref)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Add a leaf entry, replacing any existing entry for `name`.
    pub fn with_leaf(mut self, name: impl Into<String>) -> Self {
        self.entries.insert(name.into(), None);
        self
    }

    /// Add a nested entry, replacing any existing entry for `name`.
    pub fn with_nested(mut self, name: impl Into<String>, nested: Selection) -> Self {
        self.entries.insert(name.into(), Some(nested));
        self
    }
}

fn current(stack: &mut [Frame]) -> &mut Frame {
    let last = stack.len() - 1;
    &mut stack[last]
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, nested)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(name)?;
            if let Some(nested) = nested {
                write!(f, "{{{}}}", nested)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_flat_and_nested() {
        let got = Selection::parse("one,two{one,two},three").unwrap();
        let expected = Selection::default()
            .with_leaf("one")
            .with_nested("two", Selection::default().with_leaf("one").with_leaf("two"))
            .with_leaf("three");
        assert_eq!(got, expected);
    }

    #[test]
    fn parse_serializes_with_null_leaves() {
        let got = Selection::parse("one,two{one,two},three").unwrap();
        assert_eq!(
            serde_json::to_value(&got).unwrap(),
            json!({"one": null, "two": {"one": null, "two": null}, "three": null})
        );
    }

    #[test]
    fn parse_empty_string() {
        assert!(Selection::parse("").unwrap().is_empty());
        assert!(Selection::parse(" , ,").unwrap().is_empty());
    }

    #[test]
    fn parse_trims_whitespace() {
        let got = Selection::parse(" a , b { c , d } ").unwrap();
        assert!(got.contains("a"));
        let b = got.get("b").unwrap();
        assert!(b.contains("c") && b.contains("d"));
    }

    #[test]
    fn parse_deep_nesting() {
        let got = Selection::parse("a{b{c{d}}},e").unwrap();
        let c = got.get("a").and_then(|a| a.get("b")).and_then(|b| b.get("c"));
        assert!(c.unwrap().contains("d"));
        assert!(got.contains("e"));
    }

    #[test]
    fn parse_commas_inside_braces_do_not_split() {
        let got = Selection::parse("a{b,c},d").unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got.get("a").unwrap().len(), 2);
    }

    #[test]
    fn parse_empty_group() {
        let got = Selection::parse("a{}").unwrap();
        assert!(got.contains("a"));
        assert!(got.get("a").unwrap().is_empty());
    }

    #[test]
    fn parse_duplicate_last_wins() {
        let got = Selection::parse("a,a{b}").unwrap();
        assert!(got.get("a").unwrap().contains("b"));

        let got = Selection::parse("a{b},a").unwrap();
        assert!(got.contains("a"));
        assert!(got.get("a").is_none());
    }

    #[test]
    fn parse_text_after_group_is_new_item() {
        let got = Selection::parse("a{b}c").unwrap();
        assert!(got.contains("a"));
        assert!(got.contains("c"));
    }

    #[test]
    fn parse_nameless_group_is_dropped() {
        let got = Selection::parse("{a},b").unwrap();
        assert_eq!(got.len(), 1);
        assert!(got.contains("b"));
    }

    #[test]
    fn parse_unclosed_brace_errors() {
        assert_eq!(
            Selection::parse("a,b{c"),
            Err(SelectionError::Unbalanced { position: 3 })
        );
    }

    #[test]
    fn parse_unopened_brace_errors() {
        assert_eq!(
            Selection::parse("a}"),
            Err(SelectionError::Unbalanced { position: 1 })
        );
        assert!(Selection::parse("a{b}}").is_err());
    }

    #[test]
    fn parse_depth_is_bounded() {
        let ok = format!("{}x{}", "a{".repeat(MAX_SELECTION_DEPTH), "}".repeat(MAX_SELECTION_DEPTH));
        assert!(Selection::parse(&ok).is_ok());

        let deep = format!(
            "{}x{}",
            "a{".repeat(MAX_SELECTION_DEPTH + 1),
            "}".repeat(MAX_SELECTION_DEPTH + 1)
        );
        assert_eq!(
            Selection::parse(&deep),
            Err(SelectionError::TooDeep {
                max: MAX_SELECTION_DEPTH
            })
        );
    }

    #[test]
    fn display_round_trips() {
        for input in ["", "a", "a,b{c,d{e}},f", "x{}", "z,y{b,a}"] {
            let tree = Selection::parse(input).unwrap();
            let reparsed = Selection::parse(&tree.to_string()).unwrap();
            assert_eq!(tree, reparsed, "round trip of {:?}", input);
        }
    }

    #[test]
    fn parse_opt_distinguishes_absent_from_empty() {
        assert_eq!(Selection::parse_opt(None).unwrap(), None);
        assert_eq!(Selection::parse_opt(Some("")).unwrap(), Some(Selection::default()));
    }
}
