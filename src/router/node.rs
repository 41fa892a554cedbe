//! Prefix tree holding the registered patterns of one HTTP method.

/// A node of a method's route tree.
///
/// Each node owns one pattern segment. Only nodes that end a registered
/// route carry the full pattern; intermediate nodes leave it empty.
#[derive(Debug, Default, PartialEq)]
pub struct Node {
    pattern: String,
    segment: String,
    children: Vec<Node>,
    is_wildcard: bool,
}

impl Node {
    pub(crate) fn new(segment: &str) -> Self {
        Self {
            pattern: String::new(),
            segment: segment.to_string(),
            children: Vec::new(),
            is_wildcard: segment.starts_with(':') || segment.starts_with('*'),
        }
    }

    /// Full pattern of the route ending here, empty on intermediate nodes.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn segment(&self) -> &str {
        &self.segment
    }

    pub fn is_wildcard(&self) -> bool {
        self.is_wildcard
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn is_terminal(&self) -> bool {
        !self.pattern.is_empty()
    }

    fn is_catch_all(&self) -> bool {
        self.segment.starts_with('*')
    }

    /// First child that can stand for `segment`: an equal literal or any
    /// wildcard, in insertion order.
    fn match_child(&self, segment: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|child| child.segment == segment || child.is_wildcard)
    }

    /// Walks `segments` from this node, creating missing children, and marks
    /// the node reached as the end of `pattern`.
    ///
    /// An existing wildcard child absorbs any later literal at its depth, so
    /// `/a/c` registered after `/a/:b` lands on the `:b` node.
    pub(crate) fn insert(&mut self, pattern: &str, segments: &[&str]) {
        let mut current = self;
        for segment in segments {
            let index = match current.match_child(segment) {
                Some(index) => index,
                None => {
                    current.children.push(Node::new(segment));
                    current.children.len() - 1
                }
            };
            current = &mut current.children[index];
        }

        if current.is_terminal() && current.pattern != pattern {
            tracing::warn!(
                existing = %current.pattern,
                shadowed_by = %pattern,
                "route pattern overrides an existing route on the same tree node"
            );
        }
        current.pattern = pattern.to_string();
    }

    /// Finds the terminal node for the path `segments`.
    ///
    /// Children are tried in insertion order and the first equal literal or
    /// wildcard wins; there is no backtracking. A catch-all node matches all
    /// remaining segments.
    pub(crate) fn search(&self, segments: &[&str]) -> Option<&Node> {
        let mut current = self;
        for segment in segments {
            if current.is_catch_all() {
                break;
            }
            let index = current.match_child(segment)?;
            current = &current.children[index];
        }

        if current.is_terminal() {
            Some(current)
        } else {
            None
        }
    }

    /// Depth-first walk over every terminal node below and including this one.
    pub fn travel(&self) -> Travel<'_> {
        Travel { stack: vec![self] }
    }
}

/// Iterator returned by [`Node::travel`].
pub struct Travel<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Travel<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            self.stack.extend(node.children.iter());
            if node.is_terminal() {
                return Some(node);
            }
        }
        None
    }
}
