//! Fields built from literal component values
use crate::cache::{FieldDerivative, Fieldcache};
use crate::field::{Field, FieldCore, FieldModule};
use crate::registry::{FieldTypeRegistry, ParseState};
use crate::Error;

use std::any::Any;
use std::sync::Arc;

use log::error;
use ordered_float::OrderedFloat;

/// A field with fixed component values, defined at every location
///
/// Derivatives of any order are identically zero (and valid).
#[derive(Clone, Debug)]
pub struct ConstantField {
    values: Vec<f64>,
}

impl ConstantField {
    /// The literal component values
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

impl FieldCore for ConstantField {
    fn type_name(&self) -> &'static str {
        "constant"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn copy(&self) -> Box<dyn FieldCore> {
        Box::new(self.clone())
    }

    // constants with the same component values are interchangeable;
    // OrderedFloat equality keeps NaN components comparable
    fn compare(&self, other: &dyn FieldCore) -> bool {
        match other.as_any().downcast_ref::<ConstantField>() {
            Some(other) => {
                self.values.len() == other.values.len()
                    && self
                        .values
                        .iter()
                        .zip(&other.values)
                        .all(|(a, b)| OrderedFloat(*a) == OrderedFloat(*b))
            }
            None => false,
        }
    }

    fn is_defined_at_location(
        &self,
        _module: &FieldModule,
        _field: Field,
        _cache: &Fieldcache,
    ) -> bool {
        true
    }

    fn evaluate(
        &self,
        _module: &FieldModule,
        field: Field,
        cache: &mut Fieldcache,
    ) -> Result<(), Error> {
        let terms = cache.requested_derivatives();
        let mut out = cache.acquire(field, self.values.len());
        out.values.copy_from_slice(&self.values);
        if terms > 0 {
            out.derivatives.fill(0.0);
            out.derivatives_valid = true;
        } else {
            out.derivatives_valid = false;
        }
        cache.store(field, out);
        Ok(())
    }

    fn evaluate_derivative(
        &self,
        _module: &FieldModule,
        _field: Field,
        _cache: &mut Fieldcache,
        fd: FieldDerivative,
    ) -> Result<Vec<f64>, Error> {
        Ok(vec![0.0; self.values.len() * fd.term_count()])
    }

    fn describe(
        &self,
        _module: &FieldModule,
        _field: Field,
    ) -> Result<String, Error> {
        Ok(format!("values : {}", join_values(&self.values)))
    }

    fn command_string(
        &self,
        _module: &FieldModule,
        _field: Field,
    ) -> Result<String, Error> {
        Ok(format!("constant values {}", join_values(&self.values)))
    }
}

fn join_values(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

impl FieldModule {
    /// Builds a field with the given fixed component values
    ///
    /// ```
    /// # use compfield::field::FieldModule;
    /// # use compfield::cache::Fieldcache;
    /// # use compfield::location::{Location, NodeId};
    /// let mut module = FieldModule::new();
    /// let c = module.create_constant(&[1.5, 2.0])?;
    /// let mut cache = Fieldcache::new(Location::node(NodeId(1), 0.0));
    /// assert_eq!(module.evaluate(c, &mut cache)?.values, [1.5, 2.0]);
    /// # Ok::<(), compfield::Error>(())
    /// ```
    pub fn create_constant(&mut self, values: &[f64]) -> Result<Field, Error> {
        if values.is_empty() {
            error!("create_constant: at least one component value is required");
            return Err(Error::InvalidArguments);
        }
        self.create_field(
            Box::new(ConstantField {
                values: values.to_vec(),
            }),
            &[],
            values.len(),
        )
    }
}

fn define_constant(
    module: &mut FieldModule,
    state: &mut ParseState,
) -> Result<Field, Error> {
    state.expect_keyword("values")?;
    let mut values = Vec::new();
    while !state.is_finished() {
        let token = state.token()?;
        let value = token.parse::<f64>().map_err(|_| {
            Error::ParseError(format!("expected a number, found \"{token}\""))
        })?;
        values.push(value);
    }
    module.create_constant(&values)
}

/// Configuration shared by the composite type definers
#[derive(Debug, Default)]
pub struct CompositePackage;

/// Registers the composite field types with a registry
pub fn register_composite_types(
    registry: &mut FieldTypeRegistry,
) -> Result<(), Error> {
    let package: Arc<dyn Any + Send + Sync> = Arc::new(CompositePackage);
    registry.register("constant", define_constant, package)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cache::Fieldcache;
    use crate::location::{ElementId, Location, NodeId};

    #[test]
    fn constant_is_defined_everywhere() {
        let mut module = FieldModule::new();
        let c = module.create_constant(&[4.0, -2.5]).unwrap();

        let mut at_node = Fieldcache::new(Location::node(NodeId(1), 2.0));
        assert_eq!(module.evaluate(c, &mut at_node).unwrap().values, [4.0, -2.5]);

        let mut in_element =
            Fieldcache::new(Location::element(ElementId(9), &[0.5, 0.5, 0.5]));
        in_element.set_requested_derivatives(3);
        let out = module.evaluate(c, &mut in_element).unwrap();
        assert_eq!(out.values, [4.0, -2.5]);
        assert!(out.derivatives_valid);
        assert!(out.derivatives.iter().all(|&d| d == 0.0));
    }

    #[test]
    fn constant_derivatives_are_zero_at_any_order() {
        let mut module = FieldModule::new();
        let c = module.create_constant(&[1.0]).unwrap();
        let mut cache =
            Fieldcache::new(Location::element(ElementId(1), &[0.5, 0.5]));
        let fd = FieldDerivative::mesh(2).higher();
        let derivatives = module.evaluate_derivative(c, &mut cache, fd).unwrap();
        assert_eq!(derivatives, vec![0.0; 4]);
    }

    #[test]
    fn constant_compare_is_by_value() {
        let mut module = FieldModule::new();
        let a = module.create_constant(&[1.0, 2.0]).unwrap();
        let b = module.create_constant(&[1.0, 2.0]).unwrap();
        let c = module.create_constant(&[1.0, 3.0]).unwrap();
        let s = module.create_sin(a).unwrap();
        let core_a = module.core(a).unwrap();
        assert!(core_a.compare(module.core(b).unwrap()));
        assert!(!core_a.compare(module.core(c).unwrap()));
        assert!(!core_a.compare(module.core(s).unwrap()));
        // an independently-owned copy keeps the same definition
        let copied = core_a.copy();
        assert!(copied.compare(core_a));
        assert_eq!(copied.type_name(), "constant");
    }

    #[test]
    fn empty_constant_is_rejected() {
        let mut module = FieldModule::new();
        assert!(matches!(
            module.create_constant(&[]),
            Err(Error::InvalidArguments)
        ));
    }
}
