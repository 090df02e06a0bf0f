//! The per-kind implementation trait behind every field
use crate::cache::{FieldDerivative, Fieldcache};
use crate::field::{Field, FieldModule};
use crate::Error;

/// One concrete implementation per field kind
///
/// A [`FieldModule`] stores a boxed `FieldCore` alongside each field's shared
/// attributes (name, component count, coordinate system, source handles).
/// The core carries the kind-specific behavior: computing values, computing
/// analytic derivatives, and describing itself.  Kinds outside this crate can
/// participate fully by implementing this trait and constructing fields with
/// [`FieldModule::create_field`].
///
/// Implementations must be stateless with respect to evaluation: `evaluate`
/// writes only into the passed [`Fieldcache`], never into the core itself,
/// which is what allows one module to be evaluated from several threads with
/// distinct caches.
pub trait FieldCore: Send + Sync {
    /// The kind's registered type name, e.g. `"sin"`
    fn type_name(&self) -> &'static str;

    /// Upcast for kind-specific introspection
    fn as_any(&self) -> &dyn std::any::Any;

    /// Returns a fresh, independently-owned core of the same kind
    fn copy(&self) -> Box<dyn FieldCore>;

    /// True if `other` has an equivalent definition
    ///
    /// The default compares concrete kinds only; kinds carrying their own
    /// definition data (e.g. constants) also compare that data.
    fn compare(&self, other: &dyn FieldCore) -> bool {
        self.type_name() == other.type_name()
    }

    /// True if the field produces numeric component values
    fn has_numerical_components(&self) -> bool {
        true
    }

    /// True if the field can be evaluated at the cache's current location
    ///
    /// The default requires every source field to be defined there; leaf
    /// kinds override with their own location requirements.
    fn is_defined_at_location(
        &self,
        module: &FieldModule,
        field: Field,
        cache: &Fieldcache,
    ) -> bool {
        match module.source_fields(field) {
            Ok(sources) => sources
                .iter()
                .all(|&s| module.is_defined_at_location(s, cache)),
            Err(_) => false,
        }
    }

    /// Computes this field's values (and requested first derivatives) at the
    /// cache's location
    ///
    /// Implementations recursively evaluate their source fields through
    /// [`FieldModule::evaluate`] (which memoizes), fill a value cache taken
    /// with [`Fieldcache::acquire`], and hand it back with
    /// [`Fieldcache::store`].  On any failure the error propagates without a
    /// store, so no partial results are ever visible.
    fn evaluate(
        &self,
        module: &FieldModule,
        field: Field,
        cache: &mut Fieldcache,
    ) -> Result<(), Error>;

    /// Computes derivative terms for the given operator, returned flat
    /// component-major (`components × fd.term_count()` entries)
    ///
    /// The default computes central finite differences by perturbing the
    /// element `xi` coordinates; kinds with analytic first derivatives
    /// override the first-order case and keep the fallback for higher
    /// orders.
    fn evaluate_derivative(
        &self,
        module: &FieldModule,
        field: Field,
        cache: &mut Fieldcache,
        fd: FieldDerivative,
    ) -> Result<Vec<f64>, Error> {
        module.finite_difference_derivative(field, cache, fd)
    }

    /// One or more human-readable lines naming the field's definition
    fn describe(&self, module: &FieldModule, field: Field) -> Result<String, Error>;

    /// Command text which reconstructs an equivalent field when fed back
    /// through a [`FieldTypeRegistry`](crate::registry::FieldTypeRegistry)
    fn command_string(
        &self,
        module: &FieldModule,
        field: Field,
    ) -> Result<String, Error>;
}
