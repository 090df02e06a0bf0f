//! Evaluation locations
//!
//! A [`Location`] is the place at which a [`Fieldcache`](crate::cache::Fieldcache)
//! evaluates fields: either a position within a mesh element (element identity
//! plus local `xi` coordinates) or a node at a point in time.  Mesh and nodeset
//! management live outside this crate; elements and nodes are referred to by
//! plain integer identity.
use serde::{Deserialize, Serialize};

/// Identity of a mesh element, assigned by an external mesh manager
#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
pub struct ElementId(pub usize);

/// Identity of a node, assigned by an external nodeset manager
#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
pub struct NodeId(pub usize);

/// A single evaluation location
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Location {
    /// A position within an element, in element-local `xi` coordinates
    Element {
        /// The element being evaluated in
        element: ElementId,
        /// Element-local coordinates; the length is the element dimension
        xi: Vec<f64>,
    },
    /// A node at a point in time
    Node {
        /// The node being evaluated at
        node: NodeId,
        /// Evaluation time
        time: f64,
    },
}

impl Location {
    /// Builds an element location from an element and its local coordinates
    pub fn element(element: ElementId, xi: &[f64]) -> Self {
        Location::Element {
            element,
            xi: xi.to_vec(),
        }
    }

    /// Builds a node location at the given time
    pub fn node(node: NodeId, time: f64) -> Self {
        Location::Node { node, time }
    }

    /// Returns the element dimension, or 0 for node locations
    pub fn dimension(&self) -> usize {
        match self {
            Location::Element { xi, .. } => xi.len(),
            Location::Node { .. } => 0,
        }
    }
}
