//! A node of the configuration tree.

use std::collections::BTreeMap;

use bosun_core::{ModelValue, PathAddress, PathElement};

/// One addressed node: an attribute model plus its children.
///
/// Children are keyed by the final segment of their address and iterate in
/// structural segment order. A node owns its children exclusively, so
/// cloning a resource deep-copies the whole subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resource {
    model: ModelValue,
    children: BTreeMap<PathElement, Resource>,
}

impl Resource {
    /// Builds a childless node holding `model` as its attributes.
    #[must_use]
    pub fn new(model: ModelValue) -> Self {
        Self {
            model,
            children: BTreeMap::new(),
        }
    }

    /// The node's attributes.
    #[must_use]
    pub fn model(&self) -> &ModelValue {
        &self.model
    }

    /// The node's attributes, mutably.
    pub fn model_mut(&mut self) -> &mut ModelValue {
        &mut self.model
    }

    /// Whether a direct child exists under `element`.
    #[must_use]
    pub fn has_child(&self, element: &PathElement) -> bool {
        self.children.contains_key(element)
    }

    /// The direct child under `element`.
    #[must_use]
    pub fn child(&self, element: &PathElement) -> Option<&Resource> {
        self.children.get(element)
    }

    /// The direct child under `element`, mutably.
    pub fn child_mut(&mut self, element: &PathElement) -> Option<&mut Resource> {
        self.children.get_mut(element)
    }

    /// Direct children in structural segment order.
    pub fn children(&self) -> impl Iterator<Item = (&PathElement, &Resource)> {
        self.children.iter()
    }

    /// Whether the node has any children.
    #[must_use]
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Number of direct children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Inserts or replaces the child under `element`, returning the old
    /// subtree if one was there.
    pub fn insert_child(&mut self, element: PathElement, child: Resource) -> Option<Resource> {
        self.children.insert(element, child)
    }

    /// Removes and returns the child under `element`.
    pub fn remove_child(&mut self, element: &PathElement) -> Option<Resource> {
        self.children.remove(element)
    }

    /// Walks `address` downward from this node.
    #[must_use]
    pub fn descendant(&self, address: &PathAddress) -> Option<&Resource> {
        let mut node = self;
        for element in address {
            node = node.child(element)?;
        }
        Some(node)
    }

    /// Walks `address` downward from this node, mutably.
    pub fn descendant_mut(&mut self, address: &PathAddress) -> Option<&mut Resource> {
        let mut node = self;
        for element in address {
            node = node.child_mut(element)?;
        }
        Some(node)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn element(key: &str, value: &str) -> PathElement {
        PathElement::new(key, value)
    }

    fn named(name: &str) -> Resource {
        let mut model = ModelValue::object();
        model.set("name", name).unwrap();
        Resource::new(model)
    }

    #[test]
    fn children_iterate_in_structural_order() {
        let mut root = Resource::default();
        root.insert_child(element("host", "b"), named("b"));
        root.insert_child(element("server", "web"), named("web"));
        root.insert_child(element("host", "a"), named("a"));

        let order: Vec<String> = root.children().map(|(e, _)| e.to_string()).collect();
        assert_eq!(order, vec!["host=a", "host=b", "server=web"]);
    }

    #[test]
    fn descendant_walks_the_segment_chain() {
        let mut server = named("web");
        server.insert_child(element("binding", "http"), named("http"));
        let mut host = named("a");
        host.insert_child(element("server", "web"), server);
        let mut root = Resource::default();
        root.insert_child(element("host", "a"), host);

        let address: PathAddress = "/host=a/server=web/binding=http".parse().unwrap();
        let node = root.descendant(&address).unwrap();
        assert_eq!(node.model().get("name").and_then(ModelValue::as_str), Some("http"));

        let missing: PathAddress = "/host=a/server=other".parse().unwrap();
        assert!(root.descendant(&missing).is_none());
        assert!(root.descendant(&PathAddress::root()).is_some());
    }

    #[test]
    fn clone_copies_the_whole_subtree() {
        let mut root = Resource::default();
        root.insert_child(element("host", "a"), named("a"));

        let mut copy = root.clone();
        copy.child_mut(&element("host", "a"))
            .unwrap()
            .model_mut()
            .set("name", "changed")
            .unwrap();

        let original_name = root
            .child(&element("host", "a"))
            .unwrap()
            .model()
            .get("name")
            .and_then(ModelValue::as_str);
        assert_eq!(original_name, Some("a"));
    }

    #[test]
    fn remove_child_returns_the_subtree() {
        let mut root = Resource::default();
        root.insert_child(element("host", "a"), named("a"));
        let removed = root.remove_child(&element("host", "a")).unwrap();
        assert_eq!(
            removed.model().get("name").and_then(ModelValue::as_str),
            Some("a")
        );
        assert!(!root.has_children());
        assert!(root.remove_child(&element("host", "a")).is_none());
    }
}
