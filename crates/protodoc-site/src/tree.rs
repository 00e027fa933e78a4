//! Navigation tree shared by authored pages and reference documents.
//!
//! Nodes live in an arena and refer to each other by index. Sibling
//! identity is `(origin, name)`, so an authored page can never displace a
//! reference entry of the same name or the other way round.

use std::cmp::Ordering;

use serde::Serialize;

use crate::builder::BuildError;

/// Role of a node in the navigation tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Root,
    Section,
    Page,
    ReferenceRoot,
    ReferenceGroup,
    Reference,
}

impl NodeKind {
    pub fn origin(&self) -> Origin {
        match self {
            Self::Root | Self::Section | Self::Page => Origin::Page,
            Self::ReferenceRoot | Self::ReferenceGroup | Self::Reference => Origin::Reference,
        }
    }
}

/// Namespace a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Page,
    Reference,
}

/// A node of the navigation tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    /// Identity within its origin (relative path or `reference/<kind>/<name>`)
    pub id: String,

    /// Position identity among siblings
    pub name: String,

    pub title: String,

    pub kind: NodeKind,

    /// Declared ordering hint
    pub order: Option<i32>,

    /// Relative URL of the node's JSON document
    pub document: Option<String>,

    parent: Option<usize>,
    children: Vec<usize>,
}

impl TreeNode {
    pub fn new(
        kind: NodeKind,
        id: impl Into<String>,
        name: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            title: title.into(),
            kind,
            order: None,
            document: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_order(mut self, order: Option<i32>) -> Self {
        self.order = order;
        self
    }

    pub fn with_document(mut self, document: impl Into<String>) -> Self {
        self.document = Some(document.into());
        self
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn children(&self) -> &[usize] {
        &self.children
    }
}

/// Serialized form of a node and its subtree.
#[derive(Debug, Serialize)]
pub struct TreeView<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub kind: NodeKind,
    pub origin: Origin,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub document: Option<&'a str>,
    pub children: Vec<TreeView<'a>>,
}

/// Arena-backed navigation tree with a single root.
#[derive(Debug, Clone)]
pub struct PageTree {
    nodes: Vec<TreeNode>,
}

impl PageTree {
    pub const ROOT: usize = 0;

    pub fn new(title: impl Into<String>) -> Self {
        Self {
            nodes: vec![TreeNode::new(NodeKind::Root, "", "", title)],
        }
    }

    pub fn node(&self, index: usize) -> &TreeNode {
        &self.nodes[index]
    }

    pub fn node_mut(&mut self, index: usize) -> &mut TreeNode {
        &mut self.nodes[index]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Attach `node` under `parent`, rejecting a sibling with the same identity.
    pub fn add_child(&mut self, parent: usize, mut node: TreeNode) -> Result<usize, BuildError> {
        self.check_vacant(parent, node.kind.origin(), &node.name)?;

        let index = self.nodes.len();
        node.parent = Some(parent);
        node.children.clear();
        self.nodes.push(node);
        self.nodes[parent].children.push(index);
        Ok(index)
    }

    /// Child of `parent` with the given identity.
    pub fn child_named(&self, parent: usize, origin: Origin, name: &str) -> Option<usize> {
        self.nodes[parent].children.iter().copied().find(|&c| {
            let child = &self.nodes[c];
            child.kind.origin() == origin && child.name == name
        })
    }

    /// Node with the given identity anywhere in the tree.
    pub fn find(&self, origin: Origin, id: &str) -> Option<usize> {
        self.nodes
            .iter()
            .position(|n| n.kind.origin() == origin && n.id == id && n.kind != NodeKind::Root)
    }

    /// Re-parent `index` under `new_parent`.
    pub fn move_to(&mut self, index: usize, new_parent: usize) -> Result<(), BuildError> {
        if index == Self::ROOT || self.is_ancestor(index, new_parent) {
            return Err(BuildError::DuplicatePage {
                parent: self.nodes[new_parent].id.clone(),
                id: self.nodes[index].id.clone(),
            });
        }
        if self.nodes[index].parent == Some(new_parent) {
            return Ok(());
        }
        let (origin, name) = {
            let node = &self.nodes[index];
            (node.kind.origin(), node.name.clone())
        };
        self.check_vacant(new_parent, origin, &name)?;

        if let Some(old) = self.nodes[index].parent {
            self.nodes[old].children.retain(|&c| c != index);
        }
        self.nodes[index].parent = Some(new_parent);
        self.nodes[new_parent].children.push(index);
        Ok(())
    }

    /// Order every level: ordering hint first, then identity; the reference
    /// subtree always follows authored content.
    pub fn sort(&mut self) {
        for index in 0..self.nodes.len() {
            let mut children = std::mem::take(&mut self.nodes[index].children);
            children.sort_by(|&a, &b| self.compare(a, b));
            self.nodes[index].children = children;
        }
    }

    pub fn to_view(&self) -> TreeView<'_> {
        self.view(Self::ROOT)
    }

    fn view(&self, index: usize) -> TreeView<'_> {
        let node = &self.nodes[index];
        TreeView {
            id: &node.id,
            title: &node.title,
            kind: node.kind,
            origin: node.kind.origin(),
            document: node.document.as_deref(),
            children: node.children.iter().map(|&c| self.view(c)).collect(),
        }
    }

    fn compare(&self, a: usize, b: usize) -> Ordering {
        let (a, b) = (&self.nodes[a], &self.nodes[b]);
        let rank = |n: &TreeNode| u8::from(n.kind.origin() == Origin::Reference);

        rank(a)
            .cmp(&rank(b))
            .then_with(|| match (a.order, b.order) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| a.id.cmp(&b.id))
    }

    fn check_vacant(&self, parent: usize, origin: Origin, name: &str) -> Result<(), BuildError> {
        match self.child_named(parent, origin, name) {
            Some(existing) => Err(BuildError::DuplicatePage {
                parent: self.nodes[parent].id.clone(),
                id: self.nodes[existing].id.clone(),
            }),
            None => Ok(()),
        }
    }

    fn is_ancestor(&self, ancestor: usize, mut index: usize) -> bool {
        loop {
            if index == ancestor {
                return true;
            }
            match self.nodes[index].parent {
                Some(parent) => index = parent,
                None => return false,
            }
        }
    }
}

/// Capitalize first letter of a string.
pub(crate) fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn page(id: &str, order: Option<i32>) -> TreeNode {
        let name = id.rsplit('/').next().unwrap_or(id);
        TreeNode::new(NodeKind::Page, id, name, name).with_order(order)
    }

    fn child_ids(tree: &PageTree, index: usize) -> Vec<&str> {
        tree.node(index)
            .children()
            .iter()
            .map(|&c| tree.node(c).id.as_str())
            .collect()
    }

    #[test]
    fn orders_by_hint_then_identity() {
        let mut tree = PageTree::new("Docs");
        tree.add_child(PageTree::ROOT, page("b", None)).unwrap();
        tree.add_child(PageTree::ROOT, page("a", None)).unwrap();
        tree.add_child(PageTree::ROOT, page("z", Some(1))).unwrap();
        tree.add_child(PageTree::ROOT, page("y", Some(-3))).unwrap();
        tree.add_child(
            PageTree::ROOT,
            TreeNode::new(NodeKind::ReferenceRoot, "reference", "reference", "API"),
        )
        .unwrap();

        tree.sort();

        assert_eq!(
            child_ids(&tree, PageTree::ROOT),
            vec!["y", "z", "a", "b", "reference"]
        );
    }

    #[test]
    fn rejects_duplicate_sibling() {
        let mut tree = PageTree::new("Docs");
        tree.add_child(PageTree::ROOT, page("intro", None)).unwrap();

        let err = tree.add_child(PageTree::ROOT, page("intro", Some(2))).unwrap_err();

        assert!(matches!(err, BuildError::DuplicatePage { ref id, .. } if id == "intro"));
    }

    #[test]
    fn same_name_in_other_origin_is_allowed() {
        let mut tree = PageTree::new("Docs");
        tree.add_child(
            PageTree::ROOT,
            TreeNode::new(NodeKind::Section, "reference", "reference", "Reference"),
        )
        .unwrap();

        let graft = tree.add_child(
            PageTree::ROOT,
            TreeNode::new(NodeKind::ReferenceRoot, "reference", "reference", "API"),
        );

        assert!(graft.is_ok());
        assert_eq!(tree.find(Origin::Page, "reference"), Some(1));
        assert_eq!(tree.find(Origin::Reference, "reference"), Some(2));
    }

    #[test]
    fn moves_node_under_new_parent() {
        let mut tree = PageTree::new("Docs");
        let guide = tree
            .add_child(
                PageTree::ROOT,
                TreeNode::new(NodeKind::Section, "guide", "guide", "Guide"),
            )
            .unwrap();
        let faq = tree.add_child(PageTree::ROOT, page("faq", None)).unwrap();

        tree.move_to(faq, guide).unwrap();

        assert_eq!(tree.node(faq).parent(), Some(guide));
        assert_eq!(child_ids(&tree, PageTree::ROOT), vec!["guide"]);
        assert_eq!(child_ids(&tree, guide), vec!["faq"]);
    }

    #[test]
    fn refuses_move_into_own_subtree() {
        let mut tree = PageTree::new("Docs");
        let guide = tree
            .add_child(
                PageTree::ROOT,
                TreeNode::new(NodeKind::Section, "guide", "guide", "Guide"),
            )
            .unwrap();
        let basics = tree
            .add_child(
                guide,
                TreeNode::new(NodeKind::Section, "guide/basics", "basics", "Basics"),
            )
            .unwrap();

        assert!(tree.move_to(guide, basics).is_err());
    }

    #[test]
    fn serializes_nested_view() {
        let mut tree = PageTree::new("Docs");
        let guide = tree
            .add_child(
                PageTree::ROOT,
                TreeNode::new(NodeKind::Section, "guide", "guide", "Guide"),
            )
            .unwrap();
        tree.add_child(
            guide,
            page("guide/intro", None).with_document("pages/guide/intro.json"),
        )
        .unwrap();

        let json = serde_json::to_value(tree.to_view()).unwrap();

        assert_eq!(json["kind"], "root");
        assert_eq!(json["children"][0]["kind"], "section");
        assert_eq!(json["children"][0]["origin"], "page");
        assert_eq!(
            json["children"][0]["children"][0]["ref"],
            "pages/guide/intro.json"
        );
    }

    #[test]
    fn capitalizes() {
        assert_eq!(capitalize("guide"), "Guide");
        assert_eq!(capitalize(""), "");
    }
}
