//! Infrastructure for representing computed fields as an expression graph
//!
//! A [`FieldModule`] owns a set of fields.  Each field wraps a
//! [`FieldCore`] (the kind-specific implementation) together with its shared
//! attributes: a unique name, a component count, a
//! [`CoordinateSystem`](crate::coordinates::CoordinateSystem) tag, and an
//! ordered list of source fields it is computed from.  Source references are
//! [`Field`] handles into the same module, so the fields form a DAG; diamond
//! dependencies are legal and are deduplicated during evaluation by the
//! per-location cache.
//!
//! The module is used like an arena allocator: it grows as fields are
//! created, and fields live as long as the module.  Because a field's sources
//! must already exist in the arena when it is created, a field can never
//! (directly or transitively) list itself as a source.
mod core;

pub mod composite;
pub mod mesh;
pub mod trigonometry;

pub use self::core::FieldCore;

use crate::cache::{FieldDerivative, Fieldcache};
use crate::coordinates::CoordinateSystem;
use crate::indexed::define_index;
use crate::location::Location;
use crate::Error;

use std::collections::HashMap;
use std::fmt::Write;

use log::error;

define_index!(Field, "A handle to a field in a `FieldModule`");

/// What changed about a field, reported to the module's change listener
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FieldChange {
    /// The field was just created
    Add,
    /// The field's definition changed in a way that affects computed values
    /// or their interpretation
    Definition,
    /// A cosmetic attribute (e.g. the name) changed
    Metadata,
}

/// Callback invoked when fields change, for external change propagation
pub type ChangeListener = Box<dyn FnMut(Field, FieldChange) + Send + Sync>;

struct FieldData {
    name: String,
    number_of_components: usize,
    coordinate_system: CoordinateSystem,
    source_fields: Vec<Field>,
    core: Box<dyn FieldCore>,
}

/// An arena of computed fields
///
/// ```
/// use compfield::field::FieldModule;
///
/// let mut module = FieldModule::new();
/// let xi = module.create_xi_coordinates(2)?;
/// let s = module.create_sin(xi)?;
/// assert_eq!(module.number_of_components(s)?, 2);
/// # Ok::<(), compfield::Error>(())
/// ```
#[derive(Default)]
pub struct FieldModule {
    fields: Vec<FieldData>,
    names: HashMap<String, Field>,
    temp_name_counter: usize,
    change_listener: Option<ChangeListener>,
}

impl std::fmt::Debug for FieldModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldModule")
            .field("fields", &self.fields.len())
            .finish()
    }
}

impl FieldModule {
    /// Builds a new empty module
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of fields in the module
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Checks whether the module is empty
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over every field handle in creation order
    pub fn fields(&self) -> impl Iterator<Item = Field> {
        (0..self.fields.len()).map(Field::from)
    }

    fn data(&self, field: Field) -> Result<&FieldData, Error> {
        self.fields.get(field.0).ok_or(Error::BadField)
    }

    fn data_mut(&mut self, field: Field) -> Result<&mut FieldData, Error> {
        self.fields.get_mut(field.0).ok_or(Error::BadField)
    }

    fn notify(&mut self, field: Field, change: FieldChange) {
        if let Some(listener) = self.change_listener.as_mut() {
            listener(field, change);
        }
    }

    /// Installs the callback invoked when fields are added or modified
    ///
    /// An external manager uses this to propagate invalidation to dependents
    /// (discoverable via [`depends_on_field`](Self::depends_on_field)).
    /// Replaces any previous listener.
    pub fn set_change_listener(&mut self, listener: ChangeListener) {
        self.change_listener = Some(listener);
    }

    /// Removes the change listener
    pub fn clear_change_listener(&mut self) {
        self.change_listener = None;
    }

    ////////////////////////////////////////////////////////////////////////
    // Generic field creation

    /// Creates a field from an arbitrary core, source list, and component
    /// count
    ///
    /// This is the generic path behind every `create_<kind>` constructor and
    /// the extension point for field kinds defined outside this crate.  The
    /// new field is given an automatic `temp#` name (rename it with
    /// [`set_name`](Self::set_name)) and inherits the coordinate system of
    /// its first source field, if any.
    ///
    /// Kind-specific validation (numerical-ness, component compatibility)
    /// belongs in the kind's constructor, before calling this.
    pub fn create_field(
        &mut self,
        core: Box<dyn FieldCore>,
        source_fields: &[Field],
        number_of_components: usize,
    ) -> Result<Field, Error> {
        if number_of_components == 0 {
            error!("create_field: field must have at least one component");
            return Err(Error::InvalidArguments);
        }
        for &source in source_fields {
            if source.0 >= self.fields.len() {
                error!("create_field: missing source field");
                return Err(Error::BadField);
            }
        }
        let coordinate_system = source_fields
            .first()
            .map(|&s| self.fields[s.0].coordinate_system)
            .unwrap_or_default();
        let name = self.next_temp_name();
        let field = Field::from(self.fields.len());
        self.fields.push(FieldData {
            name: name.clone(),
            number_of_components,
            coordinate_system,
            source_fields: source_fields.to_vec(),
            core,
        });
        self.names.insert(name, field);
        self.notify(field, FieldChange::Add);
        Ok(field)
    }

    fn next_temp_name(&mut self) -> String {
        loop {
            self.temp_name_counter += 1;
            let name = format!("temp{}", self.temp_name_counter);
            if !self.names.contains_key(&name) {
                return name;
            }
        }
    }

    ////////////////////////////////////////////////////////////////////////
    // Attribute access

    /// Looks up a field by its exact name
    pub fn find_field_by_name(&self, name: &str) -> Option<Field> {
        self.names.get(name).copied()
    }

    /// Returns the field's name
    pub fn name(&self, field: Field) -> Result<&str, Error> {
        Ok(&self.data(field)?.name)
    }

    /// Renames the field; fails if the name is already taken
    pub fn set_name(&mut self, field: Field, name: &str) -> Result<(), Error> {
        self.data(field)?;
        if let Some(&existing) = self.names.get(name) {
            if existing != field {
                error!("set_name: a field named \"{name}\" already exists");
                return Err(Error::DuplicateName(name.to_owned()));
            }
            return Ok(());
        }
        let data = &mut self.fields[field.0];
        let old = std::mem::replace(&mut data.name, name.to_owned());
        self.names.remove(&old);
        self.names.insert(name.to_owned(), field);
        self.notify(field, FieldChange::Metadata);
        Ok(())
    }

    /// Returns the field's component count
    pub fn number_of_components(&self, field: Field) -> Result<usize, Error> {
        Ok(self.data(field)?.number_of_components)
    }

    /// Returns the field's coordinate system tag
    pub fn coordinate_system(
        &self,
        field: Field,
    ) -> Result<CoordinateSystem, Error> {
        Ok(self.data(field)?.coordinate_system)
    }

    /// Retags the field's coordinate system
    pub fn set_coordinate_system(
        &mut self,
        field: Field,
        coordinate_system: CoordinateSystem,
    ) -> Result<(), Error> {
        self.data_mut(field)?.coordinate_system = coordinate_system;
        self.notify(field, FieldChange::Definition);
        Ok(())
    }

    /// Returns the field's ordered source-field handles
    pub fn source_fields(&self, field: Field) -> Result<&[Field], Error> {
        Ok(&self.data(field)?.source_fields)
    }

    /// Returns the source field at `index`
    pub fn source_field(
        &self,
        field: Field,
        index: usize,
    ) -> Result<Field, Error> {
        self.data(field)?
            .source_fields
            .get(index)
            .copied()
            .ok_or(Error::BadField)
    }

    /// Returns the field's kind implementation, for introspection
    pub fn core(&self, field: Field) -> Result<&dyn FieldCore, Error> {
        Ok(self.data(field)?.core.as_ref())
    }

    /// True if the field produces numeric component values
    pub fn has_numerical_components(&self, field: Field) -> Result<bool, Error> {
        Ok(self.data(field)?.core.has_numerical_components())
    }

    /// True if `field` equals `other` or (transitively) lists it as a source
    pub fn depends_on_field(
        &self,
        field: Field,
        other: Field,
    ) -> Result<bool, Error> {
        let data = self.data(field)?;
        if field == other {
            return Ok(true);
        }
        for &source in &data.source_fields {
            if self.depends_on_field(source, other)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    ////////////////////////////////////////////////////////////////////////
    // Evaluation

    /// True if the field can be evaluated at the cache's current location
    pub fn is_defined_at_location(
        &self,
        field: Field,
        cache: &Fieldcache,
    ) -> bool {
        match self.data(field) {
            Ok(data) => data.core.is_defined_at_location(self, field, cache),
            Err(_) => false,
        }
    }

    /// Evaluates the field at the cache's location, returning its value cache
    ///
    /// Source fields are evaluated recursively in the same cache, so a field
    /// shared by several dependents is computed at most once per location.
    /// On failure nothing is written to the failing field's cache and the
    /// error propagates to the outermost caller.
    ///
    /// ```
    /// use compfield::cache::Fieldcache;
    /// use compfield::field::FieldModule;
    /// use compfield::location::{ElementId, Location};
    ///
    /// let mut module = FieldModule::new();
    /// let xi = module.create_xi_coordinates(1)?;
    /// let f = module.create_atan(xi)?;
    ///
    /// let mut cache = Fieldcache::new(Location::element(ElementId(3), &[1.0]));
    /// let out = module.evaluate(f, &mut cache)?;
    /// assert_eq!(out.values[0], 1.0_f64.atan());
    /// # Ok::<(), compfield::Error>(())
    /// ```
    pub fn evaluate<'a>(
        &self,
        field: Field,
        cache: &'a mut Fieldcache,
    ) -> Result<&'a crate::cache::FieldValueCache, Error> {
        let data = self.data(field)?;
        if !cache.is_evaluated(field) {
            data.core.evaluate(self, field, cache)?;
        }
        cache.value_cache(field).ok_or(Error::NotDefined)
    }

    /// Evaluates derivative terms of the field for the given operator
    ///
    /// Returns `components × fd.term_count()` values, component-major.
    /// First-order terms are analytic for the built-in kinds; higher orders
    /// fall back to finite differences on the element `xi` coordinates.
    pub fn evaluate_derivative(
        &self,
        field: Field,
        cache: &mut Fieldcache,
        fd: FieldDerivative,
    ) -> Result<Vec<f64>, Error> {
        if fd.mesh_dimension() == 0 {
            return Err(Error::InvalidArguments);
        }
        let data = self.data(field)?;
        data.core.evaluate_derivative(self, field, cache, fd)
    }

    /// Evaluates derivatives by central finite differences on `xi`
    ///
    /// This is the generic fallback used for derivative orders with no
    /// analytic implementation.  Only element locations can be perturbed;
    /// node locations fail with [`Error::WrongLocationKind`].  Evaluation at
    /// the perturbed locations happens in a working cache owned by `cache`,
    /// so the caller's own value caches are left untouched.
    pub fn finite_difference_derivative(
        &self,
        field: Field,
        cache: &mut Fieldcache,
        fd: FieldDerivative,
    ) -> Result<Vec<f64>, Error> {
        const DELTA: f64 = 1e-5;
        let (element, xi) = match cache.location() {
            Location::Element { element, xi } => (*element, xi.clone()),
            Location::Node { .. } => {
                error!(
                    "finite_difference_derivative: only implemented for \
                     element locations"
                );
                return Err(Error::WrongLocationKind);
            }
        };
        let dimension = xi.len();
        if fd.mesh_dimension() != dimension {
            error!(
                "finite_difference_derivative: operator dimension {} does \
                 not match element dimension {}",
                fd.mesh_dimension(),
                dimension
            );
            return Err(Error::BadDerivativeDimension(
                fd.mesh_dimension(),
                dimension,
            ));
        }
        let components = self.number_of_components(field)?;
        let lower = fd.lower();
        let lower_terms = lower.map(|l| l.term_count()).unwrap_or(1);

        let mut working = cache.take_extra();
        let result = (|| {
            let mut out = vec![0.0; components * fd.term_count()];
            let perturbed = |working: &mut Fieldcache,
                                 xi_j: usize,
                                 offset: f64|
             -> Result<Vec<f64>, Error> {
                let mut xi = xi.clone();
                xi[xi_j] += offset;
                working.set_location(Location::element(element, &xi));
                match lower {
                    None => Ok(self.evaluate(field, working)?.values.clone()),
                    Some(l) => self.evaluate_derivative(field, working, l),
                }
            };
            for j in 0..dimension {
                let up = perturbed(&mut working, j, DELTA)?;
                let down = perturbed(&mut working, j, -DELTA)?;
                for i in 0..components {
                    for k in 0..lower_terms {
                        let term = i * lower_terms + k;
                        out[i * fd.term_count() + j * lower_terms + k] =
                            (up[term] - down[term]) / (2.0 * DELTA);
                    }
                }
            }
            Ok(out)
        })();
        cache.put_extra(working);
        result
    }

    ////////////////////////////////////////////////////////////////////////
    // Introspection

    /// Emits a multi-line human-readable description of the field
    pub fn describe(&self, field: Field) -> Result<String, Error> {
        let data = self.data(field)?;
        let mut out = String::new();
        writeln!(out, "field : {}", data.name).ok();
        writeln!(out, "  type : {}", data.core.type_name()).ok();
        writeln!(
            out,
            "  number_of_components : {}",
            data.number_of_components
        )
        .ok();
        writeln!(out, "  coordinate system : {}", data.coordinate_system).ok();
        for line in data.core.describe(self, field)?.lines() {
            writeln!(out, "  {line}").ok();
        }
        Ok(out)
    }

    /// Produces command text which reconstructs an equivalent field when fed
    /// through a [`FieldTypeRegistry`](crate::registry::FieldTypeRegistry)
    pub fn command_string(&self, field: Field) -> Result<String, Error> {
        self.data(field)?.core.command_string(self, field)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cache::Fieldcache;
    use crate::location::{ElementId, NodeId};

    #[test]
    fn module_and_cache_are_send_and_sync() {
        fn check<T: Send + Sync>() {}
        check::<FieldModule>();
        check::<Fieldcache>();
    }

    #[test]
    fn temp_names_are_unique() {
        let mut module = FieldModule::new();
        let a = module.create_constant(&[1.0]).unwrap();
        let b = module.create_constant(&[2.0]).unwrap();
        assert_eq!(module.name(a).unwrap(), "temp1");
        assert_eq!(module.name(b).unwrap(), "temp2");
        assert_eq!(module.find_field_by_name("temp2"), Some(b));
    }

    #[test]
    fn rename_checks_uniqueness() {
        let mut module = FieldModule::new();
        let a = module.create_constant(&[1.0]).unwrap();
        let b = module.create_constant(&[2.0]).unwrap();
        module.set_name(a, "temperature").unwrap();
        assert!(matches!(
            module.set_name(b, "temperature"),
            Err(Error::DuplicateName(_))
        ));
        // renaming a field to its own name is fine
        module.set_name(a, "temperature").unwrap();
        assert_eq!(module.find_field_by_name("temperature"), Some(a));
        assert_eq!(module.find_field_by_name("temp1"), None);
    }

    #[test]
    fn depends_on_field_is_transitive() {
        let mut module = FieldModule::new();
        let xi = module.create_xi_coordinates(1).unwrap();
        let s = module.create_sin(xi).unwrap();
        let t = module.create_tan(s).unwrap();
        let other = module.create_constant(&[0.0]).unwrap();
        assert!(module.depends_on_field(t, xi).unwrap());
        assert!(module.depends_on_field(t, t).unwrap());
        assert!(!module.depends_on_field(t, other).unwrap());
        assert!(!module.depends_on_field(xi, t).unwrap());
    }

    #[test]
    fn change_listener_fires() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let adds = Arc::new(AtomicUsize::new(0));
        let renames = Arc::new(AtomicUsize::new(0));
        let mut module = FieldModule::new();
        let (a, r) = (adds.clone(), renames.clone());
        module.set_change_listener(Box::new(move |_, change| match change {
            FieldChange::Add => {
                a.fetch_add(1, Ordering::Relaxed);
            }
            FieldChange::Metadata => {
                r.fetch_add(1, Ordering::Relaxed);
            }
            FieldChange::Definition => (),
        }));
        let c = module.create_constant(&[1.0]).unwrap();
        let s = module.create_sin(c).unwrap();
        module.set_name(s, "wave").unwrap();
        assert_eq!(adds.load(Ordering::Relaxed), 2);
        assert_eq!(renames.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn bad_handles_are_rejected() {
        let mut module = FieldModule::new();
        let c = module.create_constant(&[1.0]).unwrap();
        let stale = Field::from(17);
        assert!(matches!(module.name(stale), Err(Error::BadField)));
        assert!(matches!(module.create_sin(stale), Err(Error::BadField)));
        let mut cache =
            Fieldcache::new(Location::element(ElementId(1), &[0.0]));
        assert!(module.evaluate(stale, &mut cache).is_err());
        // the good field still works
        assert!(module.evaluate(c, &mut cache).is_ok());
    }

    #[test]
    fn coordinate_system_is_inherited_then_settable() {
        let mut module = FieldModule::new();
        let c = module.create_constant(&[1.0, 0.0, 0.5]).unwrap();
        module
            .set_coordinate_system(c, CoordinateSystem::CylindricalPolar)
            .unwrap();
        let s = module.create_sin(c).unwrap();
        assert_eq!(
            module.coordinate_system(s).unwrap(),
            CoordinateSystem::CylindricalPolar
        );
        // the tag is orthogonal to the field kind and freely retaggable
        module
            .set_coordinate_system(
                s,
                CoordinateSystem::ProlateSpheroidal { focus: 35.0 },
            )
            .unwrap();
        assert_eq!(
            module.coordinate_system(s).unwrap(),
            CoordinateSystem::ProlateSpheroidal { focus: 35.0 }
        );
        assert_eq!(
            module.coordinate_system(c).unwrap(),
            CoordinateSystem::CylindricalPolar
        );
    }

    #[test]
    fn finite_difference_rejects_node_locations() {
        let mut module = FieldModule::new();
        let c = module.create_constant(&[1.0]).unwrap();
        let mut cache = Fieldcache::new(Location::node(NodeId(4), 0.0));
        // constant answers analytically at any location; force the generic
        // fallback directly
        assert!(matches!(
            module.finite_difference_derivative(
                c,
                &mut cache,
                FieldDerivative::mesh(2)
            ),
            Err(Error::WrongLocationKind)
        ));
    }
}
