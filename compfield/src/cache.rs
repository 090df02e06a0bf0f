//! Per-location value caching for field evaluation
//!
//! A [`Fieldcache`] scopes one evaluation location and owns a
//! [`FieldValueCache`] for every field touched while evaluating at that
//! location.  Evaluating the same field twice in an unmoved cache returns the
//! stored result without recomputation; moving the cache to a new location
//! invalidates every entry (without deallocating the value arrays, so repeated
//! evaluation along a path does not churn the allocator).
//!
//! ```
//! use compfield::cache::Fieldcache;
//! use compfield::field::FieldModule;
//! use compfield::location::{ElementId, Location};
//!
//! let mut module = FieldModule::new();
//! let xi = module.create_xi_coordinates(1)?;
//! let s = module.create_sin(xi)?;
//!
//! let mut cache = Fieldcache::new(Location::element(ElementId(1), &[0.5]));
//! let value = module.evaluate(s, &mut cache)?.values[0];
//! assert_eq!(value, 0.5_f64.sin());
//! # Ok::<(), compfield::Error>(())
//! ```
use crate::field::Field;
use crate::indexed::IndexVec;
use crate::location::Location;

use serde::{Deserialize, Serialize};

/// Describes a requested derivative operator
///
/// The operator is differentiation with respect to the element-local `xi`
/// coordinates of a mesh of the given dimension, applied `order` times.  An
/// order-`n` operator over dimension `d` has `d`^`n` scalar terms per field
/// component.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FieldDerivative {
    mesh_dimension: usize,
    order: usize,
}

impl FieldDerivative {
    /// First derivative with respect to the `xi` coordinates of a
    /// `mesh_dimension`-dimensional mesh
    pub fn mesh(mesh_dimension: usize) -> Self {
        Self {
            mesh_dimension,
            order: 1,
        }
    }

    /// Returns the same operator applied one more time
    pub fn higher(&self) -> Self {
        Self {
            mesh_dimension: self.mesh_dimension,
            order: self.order + 1,
        }
    }

    /// Returns the operator applied one less time, or `None` if this is a
    /// first derivative (whose "lower derivative" is the plain field value)
    pub fn lower(&self) -> Option<Self> {
        if self.order > 1 {
            Some(Self {
                mesh_dimension: self.mesh_dimension,
                order: self.order - 1,
            })
        } else {
            None
        }
    }

    /// Mesh dimension the operator differentiates over
    pub fn mesh_dimension(&self) -> usize {
        self.mesh_dimension
    }

    /// Total order of differentiation
    pub fn total_order(&self) -> usize {
        self.order
    }

    /// Number of scalar derivative terms per field component
    pub fn term_count(&self) -> usize {
        self.mesh_dimension.pow(self.order as u32)
    }
}

/// Computed values (and optionally first derivatives) for one field at the
/// owning cache's location
///
/// `derivatives` is a flat row-major array of
/// `values.len() × requested term count` entries: all derivative terms for
/// component 0, then component 1, and so on.  Its content is only meaningful
/// while `derivatives_valid` is set; any evaluation in which an upstream
/// source could not supply derivatives leaves the flag clear and the array
/// contents unspecified.
#[derive(Clone, Debug, Default)]
pub struct FieldValueCache {
    /// One computed value per field component
    pub values: Vec<f64>,
    /// Flat component-major first-derivative terms; see type docs for layout
    pub derivatives: Vec<f64>,
    /// Set only when every upstream source supplied valid derivatives
    pub derivatives_valid: bool,
    evaluated: bool,
}

impl FieldValueCache {
    fn reset(&mut self, components: usize, terms: usize) {
        self.values.resize(components, 0.0);
        self.derivatives.resize(components * terms, 0.0);
        self.derivatives_valid = false;
        self.evaluated = false;
    }

    fn invalidate(&mut self) {
        self.evaluated = false;
        self.derivatives_valid = false;
    }
}

/// A per-location evaluation context
///
/// Owns the value caches for every field evaluated at its current
/// [`Location`], plus the number of first-derivative terms to compute
/// alongside values.  At most one value cache exists per field per context.
///
/// A `Fieldcache` is not synchronized: confine each cache to one thread.
/// Distinct caches are fully independent, so several threads may evaluate
/// the same (shared, immutable) `FieldModule` concurrently as long as each
/// uses its own cache.
#[derive(Debug)]
pub struct Fieldcache {
    location: Location,
    requested_derivatives: usize,
    caches: IndexVec<Option<FieldValueCache>, Field>,
    // working cache for finite-difference perturbation, created on demand
    extra: Option<Box<Fieldcache>>,
}

impl Fieldcache {
    /// Builds a cache scoped to the given location, with no derivatives
    /// requested
    pub fn new(location: Location) -> Self {
        Self {
            location,
            requested_derivatives: 0,
            caches: IndexVec::new(),
            extra: None,
        }
    }

    /// Current evaluation location
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Moves the cache to a new location, invalidating every value cache
    pub fn set_location(&mut self, location: Location) {
        if location != self.location {
            self.location = location;
            self.invalidate();
        }
    }

    /// Number of first-derivative terms computed alongside values, or 0 when
    /// only values are wanted
    pub fn requested_derivatives(&self) -> usize {
        self.requested_derivatives
    }

    /// Requests that evaluation also compute `terms` first-derivative terms
    /// per component (one per independent variable, typically the element
    /// dimension).  Invalidates existing entries if the request changed.
    pub fn set_requested_derivatives(&mut self, terms: usize) {
        if terms != self.requested_derivatives {
            self.requested_derivatives = terms;
            self.invalidate();
        }
    }

    /// Invalidates every value cache without releasing its storage
    pub fn invalidate(&mut self) {
        for entry in self.caches.iter_mut() {
            if let Some(c) = entry.as_mut() {
                c.invalidate();
            }
        }
        if let Some(extra) = self.extra.as_mut() {
            extra.invalidate();
        }
    }

    /// Returns the evaluated value cache for a field, or `None` if the field
    /// has not been (successfully) evaluated at the current location
    pub fn value_cache(&self, field: Field) -> Option<&FieldValueCache> {
        self.caches
            .get(field)?
            .as_ref()
            .filter(|c| c.evaluated)
    }

    /// True if the field already holds an evaluated result at this location
    pub fn is_evaluated(&self, field: Field) -> bool {
        self.value_cache(field).is_some()
    }

    /// Takes the field's value cache out of the context for filling,
    /// creating or resizing it as needed
    ///
    /// Field-kind implementations call this, fill in the result, then hand
    /// the cache back with [`store`](Self::store).  If evaluation fails
    /// partway the cache is simply never stored, so no partial results are
    /// ever observable.
    pub fn acquire(&mut self, field: Field, components: usize) -> FieldValueCache {
        self.caches.grow(usize::from(field) + 1);
        let mut entry = self.caches[field].take().unwrap_or_default();
        entry.reset(components, self.requested_derivatives);
        entry
    }

    /// Stores a filled value cache, marking the field as evaluated at the
    /// current location
    pub fn store(&mut self, field: Field, mut entry: FieldValueCache) {
        entry.evaluated = true;
        self.caches.grow(usize::from(field) + 1);
        self.caches[field] = Some(entry);
    }

    pub(crate) fn take_extra(&mut self) -> Box<Fieldcache> {
        self.extra
            .take()
            .unwrap_or_else(|| Box::new(Fieldcache::new(self.location.clone())))
    }

    pub(crate) fn put_extra(&mut self, extra: Box<Fieldcache>) {
        self.extra = Some(extra);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::location::{ElementId, NodeId};

    #[test]
    fn derivative_term_counts() {
        let d1 = FieldDerivative::mesh(3);
        assert_eq!(d1.total_order(), 1);
        assert_eq!(d1.term_count(), 3);
        assert_eq!(d1.lower(), None);

        let d2 = d1.higher();
        assert_eq!(d2.total_order(), 2);
        assert_eq!(d2.term_count(), 9);
        assert_eq!(d2.lower(), Some(d1));
    }

    #[test]
    fn move_location_invalidates() {
        let mut cache =
            Fieldcache::new(Location::element(ElementId(1), &[0.25, 0.5]));
        let field = Field::from(0);
        let mut entry = cache.acquire(field, 2);
        entry.values.copy_from_slice(&[1.0, 2.0]);
        cache.store(field, entry);
        assert!(cache.is_evaluated(field));

        // same location is a no-op
        cache.set_location(Location::element(ElementId(1), &[0.25, 0.5]));
        assert!(cache.is_evaluated(field));

        cache.set_location(Location::element(ElementId(1), &[0.75, 0.5]));
        assert!(!cache.is_evaluated(field));
        assert!(cache.value_cache(field).is_none());
    }

    #[test]
    fn requested_derivatives_resize() {
        let mut cache = Fieldcache::new(Location::node(NodeId(7), 0.0));
        cache.set_requested_derivatives(2);
        let field = Field::from(3);
        let entry = cache.acquire(field, 4);
        assert_eq!(entry.values.len(), 4);
        assert_eq!(entry.derivatives.len(), 8);
        assert!(!entry.derivatives_valid);
    }
}
