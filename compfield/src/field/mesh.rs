//! Fields reading the evaluation location itself
use crate::cache::{FieldDerivative, Fieldcache};
use crate::field::{Field, FieldCore, FieldModule};
use crate::location::Location;
use crate::registry::{FieldTypeRegistry, ParseState};
use crate::Error;

use std::any::Any;
use std::sync::Arc;

use log::error;

/// Highest element dimension supported by element-local coordinates
pub const MAXIMUM_ELEMENT_XI_DIMENSIONS: usize = 3;

/// The element-local `xi` coordinates as a field
///
/// Component count equals the mesh dimension the field was created for.
/// Values are the current location's `xi` coordinates; the first derivative
/// with respect to `xi` is the identity.  Not defined at node locations nor
/// in elements of a different dimension.
#[derive(Debug, Default)]
pub struct XiCoordinatesField;

impl FieldCore for XiCoordinatesField {
    fn type_name(&self) -> &'static str {
        "xi_coordinates"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn copy(&self) -> Box<dyn FieldCore> {
        Box::new(XiCoordinatesField)
    }

    fn is_defined_at_location(
        &self,
        module: &FieldModule,
        field: Field,
        cache: &Fieldcache,
    ) -> bool {
        let Ok(components) = module.number_of_components(field) else {
            return false;
        };
        matches!(
            cache.location(),
            Location::Element { xi, .. } if xi.len() == components
        )
    }

    fn evaluate(
        &self,
        module: &FieldModule,
        field: Field,
        cache: &mut Fieldcache,
    ) -> Result<(), Error> {
        let components = module.number_of_components(field)?;
        let xi = match cache.location() {
            Location::Element { xi, .. } if xi.len() == components => {
                xi.clone()
            }
            _ => return Err(Error::NotDefined),
        };
        let terms = cache.requested_derivatives();
        let mut out = cache.acquire(field, components);
        out.values.copy_from_slice(&xi);
        if terms > 0 {
            // d(xi_i)/d(xi_j) is the identity
            for i in 0..components {
                for j in 0..terms {
                    out.derivatives[i * terms + j] =
                        if i == j { 1.0 } else { 0.0 };
                }
            }
            out.derivatives_valid = true;
        } else {
            out.derivatives_valid = false;
        }
        cache.store(field, out);
        Ok(())
    }

    fn evaluate_derivative(
        &self,
        module: &FieldModule,
        field: Field,
        cache: &mut Fieldcache,
        fd: FieldDerivative,
    ) -> Result<Vec<f64>, Error> {
        let components = module.number_of_components(field)?;
        match cache.location() {
            Location::Element { xi, .. } if xi.len() == components => (),
            _ => return Err(Error::NotDefined),
        }
        if fd.mesh_dimension() != components {
            return Err(Error::BadDerivativeDimension(
                fd.mesh_dimension(),
                components,
            ));
        }
        let terms = fd.term_count();
        let mut out = vec![0.0; components * terms];
        if fd.total_order() == 1 {
            for i in 0..components {
                out[i * terms + i] = 1.0;
            }
        }
        // higher derivatives of a linear map are zero
        Ok(out)
    }

    fn describe(
        &self,
        module: &FieldModule,
        field: Field,
    ) -> Result<String, Error> {
        Ok(format!(
            "element local xi coordinates, dimension {}",
            module.number_of_components(field)?
        ))
    }

    fn command_string(
        &self,
        module: &FieldModule,
        field: Field,
    ) -> Result<String, Error> {
        Ok(format!(
            "xi_coordinates dimension {}",
            module.number_of_components(field)?
        ))
    }
}

impl FieldModule {
    /// Builds a field whose values are the element-local `xi` coordinates of
    /// a `dimension`-dimensional mesh
    pub fn create_xi_coordinates(
        &mut self,
        dimension: usize,
    ) -> Result<Field, Error> {
        if dimension == 0 || dimension > MAXIMUM_ELEMENT_XI_DIMENSIONS {
            error!(
                "create_xi_coordinates: dimension must be between 1 and {}",
                MAXIMUM_ELEMENT_XI_DIMENSIONS
            );
            return Err(Error::InvalidArguments);
        }
        self.create_field(Box::new(XiCoordinatesField), &[], dimension)
    }
}

fn define_xi_coordinates(
    module: &mut FieldModule,
    state: &mut ParseState,
) -> Result<Field, Error> {
    state.expect_keyword("dimension")?;
    let token = state.token()?;
    let dimension = token.parse::<usize>().map_err(|_| {
        Error::ParseError(format!("expected a dimension, found \"{token}\""))
    })?;
    module.create_xi_coordinates(dimension)
}

/// Configuration shared by the mesh-location type definers
#[derive(Debug, Default)]
pub struct MeshPackage;

/// Registers the mesh-location field types with a registry
pub fn register_mesh_types(
    registry: &mut FieldTypeRegistry,
) -> Result<(), Error> {
    let package: Arc<dyn Any + Send + Sync> = Arc::new(MeshPackage);
    registry.register("xi_coordinates", define_xi_coordinates, package)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cache::Fieldcache;
    use crate::location::{ElementId, NodeId};

    #[test]
    fn xi_values_and_identity_derivative() {
        let mut module = FieldModule::new();
        let xi = module.create_xi_coordinates(2).unwrap();
        let mut cache =
            Fieldcache::new(Location::element(ElementId(5), &[0.25, 0.75]));
        cache.set_requested_derivatives(2);
        let out = module.evaluate(xi, &mut cache).unwrap();
        assert_eq!(out.values, [0.25, 0.75]);
        assert!(out.derivatives_valid);
        assert_eq!(out.derivatives, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn xi_is_not_defined_at_nodes() {
        let mut module = FieldModule::new();
        let xi = module.create_xi_coordinates(2).unwrap();
        let mut cache = Fieldcache::new(Location::node(NodeId(2), 0.0));
        assert!(!module.is_defined_at_location(xi, &cache));
        assert!(matches!(
            module.evaluate(xi, &mut cache),
            Err(Error::NotDefined)
        ));
        assert!(cache.value_cache(xi).is_none());
    }

    #[test]
    fn xi_dimension_must_match_element() {
        let mut module = FieldModule::new();
        let xi = module.create_xi_coordinates(3).unwrap();
        let mut cache =
            Fieldcache::new(Location::element(ElementId(1), &[0.5]));
        assert!(module.evaluate(xi, &mut cache).is_err());
    }

    #[test]
    fn xi_dimension_bounds() {
        let mut module = FieldModule::new();
        assert!(module.create_xi_coordinates(0).is_err());
        assert!(module.create_xi_coordinates(4).is_err());
        assert!(module.create_xi_coordinates(3).is_ok());
    }
}
