//! This module defines the parsed tree that the evaluator walks. A [`Node`] is
//! either a leaf [`EndNode`] (number, string or identifier) or a list of nodes.
//! Lists are reference counted so that closures can hold on to their body
//! without copying it, and the tree is never mutated after parsing.
//!
//! `Display` re-serializes a tree into source text: leaves print as the token
//! they were read from and lists are wrapped in parentheses, so reading the
//! output back produces an equal tree.

use std::fmt;
use std::rc::Rc;

/// Leaf value of the parsed tree. The variant is fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub enum EndNode {
    Number(f64),
    /// String literal payload, without the surrounding quotes
    String(String),
    Identifier(String),
}

impl EndNode {
    /// Name of the leaf kind, as used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            EndNode::Number(_) => "number",
            EndNode::String(_) => "string",
            EndNode::Identifier(_) => "identifier",
        }
    }
}

/// A parsed form: a leaf, or an ordered sequence of forms
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    End(EndNode),
    List(Rc<[Node]>),
}

impl Node {
    /// The identifier text, if this node is an identifier leaf
    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Node::End(EndNode::Identifier(name)) => Some(name),
            _ => None,
        }
    }

    /// Name of the node kind, as used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Node::End(end) => end.type_name(),
            Node::List(_) => "list",
        }
    }

    /// The elements, if this node is a list
    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(elements) => Some(elements),
            Node::End(_) => None,
        }
    }
}

impl From<EndNode> for Node {
    fn from(end: EndNode) -> Self {
        Node::End(end)
    }
}

impl From<Vec<Node>> for Node {
    fn from(elements: Vec<Node>) -> Self {
        Node::List(elements.into())
    }
}

impl fmt::Display for EndNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndNode::Number(n) => write!(f, "{n}"),
            EndNode::String(s) => write!(f, "\"{s}\""),
            EndNode::Identifier(name) => write!(f, "{name}"),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::End(end) => write!(f, "{end}"),
            Node::List(elements) => {
                write!(f, "(")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Helper for building number leaves in tests
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn num(n: impl Into<f64>) -> Node {
    Node::End(EndNode::Number(n.into()))
}

/// Helper for building string leaves in tests
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn text<S: AsRef<str>>(s: S) -> Node {
    Node::End(EndNode::String(s.as_ref().to_owned()))
}

/// Helper for building identifier leaves in tests
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn ident<S: AsRef<str>>(name: S) -> Node {
    Node::End(EndNode::Identifier(name.as_ref().to_owned()))
}

/// Helper for building list nodes in tests
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn list<const N: usize>(elements: [Node; N]) -> Node {
    Node::List(Rc::from(elements.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display_round_trips_token_text() {
        let test_cases = vec![
            (num(42), "42"),
            (num(-2.5), "-2.5"),
            (text("hello lisp"), "\"hello lisp\""),
            (text(""), "\"\""),
            (ident("<="), "<="),
            (list([]), "()"),
            (
                list([ident("+"), num(1), list([ident("f"), text("a b")])]),
                "(+ 1 (f \"a b\"))",
            ),
        ];

        for (i, (node, expected)) in test_cases.iter().enumerate() {
            assert_eq!(node.to_string(), *expected, "Display case #{}", i + 1);
        }
    }

    #[test]
    fn test_accessors() {
        let form = list([ident("lambda"), list([ident("x")]), ident("x")]);
        let elements = form.as_list().unwrap_or_default();
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0].as_identifier(), Some("lambda"));
        assert_eq!(elements[1].as_identifier(), None);
        assert_eq!(num(1).as_list(), None);
        assert_eq!(text("x").as_identifier(), None);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(EndNode::Number(1.0).type_name(), "number");
        assert_eq!(EndNode::String("s".into()).type_name(), "string");
        assert_eq!(EndNode::Identifier("s".into()).type_name(), "identifier");
        assert_eq!(num(1).type_name(), "number");
        assert_eq!(list([ident("x")]).type_name(), "list");
    }

    #[test]
    fn test_lists_share_structure() {
        let body = list([ident("+"), ident("n"), num(1)]);
        let copy = body.clone();
        match (&body, &copy) {
            (Node::List(a), Node::List(b)) => assert!(Rc::ptr_eq(a, b)),
            _ => panic!("expected lists"),
        }
        assert_eq!(Node::from(vec![num(1)]), list([num(1)]));
        assert_eq!(Node::from(EndNode::Number(1.0)), num(1));
    }
}
