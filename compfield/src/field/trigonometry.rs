//! Trigonometric field kinds
//!
//! Componentwise sin, cos, tan, asin, acos, and atan over one numerical
//! source field, plus the two-argument arctangent [`Atan2Field`] over two
//! same-shaped sources.  All value math is done in `f64`.
//!
//! Derivatives are analytic at first order (chain rule against the source
//! field's derivatives) and fall back to the generic finite-difference
//! strategy for higher orders.  Singularities follow IEEE arithmetic: the
//! derivative of `tan` where `cos(u) = 0` and of `atan2` at the origin
//! produce infinities or NaN rather than an error.  The one exception is
//! asin/acos at a source value of exactly `1.0`, whose derivative term is
//! forced to `0.0`.
use crate::cache::{FieldDerivative, Fieldcache};
use crate::field::{Field, FieldCore, FieldModule};
use crate::registry::{valid_token, FieldTypeRegistry, ParseState};
use crate::Error;

use std::any::Any;
use std::sync::Arc;

use log::error;

////////////////////////////////////////////////////////////////////////////
// Shared machinery for the unary kinds

/// Evaluates a componentwise `f` with derivative factor `df`, old-style:
/// values and (when the cache requests them) first derivatives together.
fn evaluate_unary(
    module: &FieldModule,
    field: Field,
    cache: &mut Fieldcache,
    f: fn(f64) -> f64,
    df: fn(f64) -> f64,
) -> Result<(), Error> {
    let source = module.source_field(field, 0)?;
    module.evaluate(source, cache)?;
    let components = module.number_of_components(field)?;
    let terms = cache.requested_derivatives();
    let mut out = cache.acquire(field, components);
    let src = cache.value_cache(source).ok_or(Error::NotDefined)?;
    for i in 0..components {
        out.values[i] = f(src.values[i]);
    }
    if terms > 0 && src.derivatives_valid {
        for i in 0..components {
            let g = df(src.values[i]);
            for j in 0..terms {
                out.derivatives[i * terms + j] =
                    g * src.derivatives[i * terms + j];
            }
        }
        out.derivatives_valid = true;
    } else {
        out.derivatives_valid = false;
    }
    cache.store(field, out);
    Ok(())
}

/// First-order analytic derivative of a unary kind; higher orders fall back
/// to finite differences.
fn unary_derivative(
    module: &FieldModule,
    field: Field,
    cache: &mut Fieldcache,
    fd: FieldDerivative,
    df: fn(f64) -> f64,
) -> Result<Vec<f64>, Error> {
    if fd.total_order() > 1 {
        return module.finite_difference_derivative(field, cache, fd);
    }
    let source = module.source_field(field, 0)?;
    let source_derivatives = module.evaluate_derivative(source, cache, fd)?;
    module.evaluate(source, cache)?;
    let components = module.number_of_components(field)?;
    let terms = fd.term_count();
    let src = cache.value_cache(source).ok_or(Error::NotDefined)?;
    let mut out = vec![0.0; components * terms];
    for i in 0..components {
        let g = df(src.values[i]);
        for j in 0..terms {
            out[i * terms + j] = g * source_derivatives[i * terms + j];
        }
    }
    Ok(out)
}

fn unary_describe(
    module: &FieldModule,
    field: Field,
) -> Result<String, Error> {
    let source = module.source_field(field, 0)?;
    Ok(format!("source field : {}", module.name(source)?))
}

fn unary_command_string(
    module: &FieldModule,
    field: Field,
    type_name: &str,
) -> Result<String, Error> {
    let source = module.source_field(field, 0)?;
    Ok(format!(
        "{} field {}",
        type_name,
        valid_token(module.name(source)?)
    ))
}

fn create_unary(
    module: &mut FieldModule,
    source: Field,
    core: Box<dyn FieldCore>,
) -> Result<Field, Error> {
    if !module.has_numerical_components(source)? {
        error!(
            "create_{}: source field must have numerical components",
            core.type_name()
        );
        return Err(Error::NonNumericSource);
    }
    let components = module.number_of_components(source)?;
    module.create_field(core, &[source], components)
}

macro_rules! unary_trig_field {
    ($(#[$doc:meta])* $struct_name:ident, $type_string:literal, $f:expr, $df:expr) => {
        $(#[$doc])*
        #[derive(Debug, Default)]
        pub struct $struct_name;

        impl FieldCore for $struct_name {
            fn type_name(&self) -> &'static str {
                $type_string
            }

            fn as_any(&self) -> &dyn Any {
                self
            }

            fn copy(&self) -> Box<dyn FieldCore> {
                Box::new($struct_name)
            }

            fn evaluate(
                &self,
                module: &FieldModule,
                field: Field,
                cache: &mut Fieldcache,
            ) -> Result<(), Error> {
                evaluate_unary(module, field, cache, $f, $df)
            }

            fn evaluate_derivative(
                &self,
                module: &FieldModule,
                field: Field,
                cache: &mut Fieldcache,
                fd: FieldDerivative,
            ) -> Result<Vec<f64>, Error> {
                unary_derivative(module, field, cache, fd, $df)
            }

            fn describe(
                &self,
                module: &FieldModule,
                field: Field,
            ) -> Result<String, Error> {
                unary_describe(module, field)
            }

            fn command_string(
                &self,
                module: &FieldModule,
                field: Field,
            ) -> Result<String, Error> {
                unary_command_string(module, field, $type_string)
            }
        }
    };
}

unary_trig_field!(
    /// Componentwise sine of one source field
    ///
    /// d(sin u)/dx = cos(u) * du/dx
    SinField,
    "sin",
    f64::sin,
    f64::cos
);

unary_trig_field!(
    /// Componentwise cosine of one source field
    ///
    /// d(cos u)/dx = -sin(u) * du/dx
    CosField,
    "cos",
    f64::cos,
    |u: f64| -u.sin()
);

unary_trig_field!(
    /// Componentwise tangent of one source field
    ///
    /// d(tan u)/dx = du/dx / cos^2(u); where cos(u) = 0 the term follows
    /// IEEE division (infinite or NaN)
    TanField,
    "tan",
    f64::tan,
    |u: f64| 1.0 / (u.cos() * u.cos())
);

unary_trig_field!(
    /// Componentwise arcsine of one source field
    ///
    /// d(asin u)/dx = du/dx / sqrt(1 - u^2); the term is forced to 0.0 when
    /// u is exactly 1.0 (but not when u is -1.0)
    AsinField,
    "asin",
    f64::asin,
    |u: f64| {
        if u != 1.0 {
            1.0 / (1.0 - u * u).sqrt()
        } else {
            0.0
        }
    }
);

unary_trig_field!(
    /// Componentwise arccosine of one source field
    ///
    /// d(acos u)/dx = -du/dx / sqrt(1 - u^2); the term is forced to 0.0 when
    /// u is exactly 1.0 (but not when u is -1.0)
    AcosField,
    "acos",
    f64::acos,
    |u: f64| {
        if u != 1.0 {
            -1.0 / (1.0 - u * u).sqrt()
        } else {
            0.0
        }
    }
);

unary_trig_field!(
    /// Componentwise arctangent of one source field
    ///
    /// d(atan u)/dx = du/dx / (1 + u^2)
    AtanField,
    "atan",
    f64::atan,
    |u: f64| 1.0 / (1.0 + u * u)
);

////////////////////////////////////////////////////////////////////////////
// atan2

/// Componentwise two-argument arctangent of two same-shaped source fields
///
/// `values[i] = atan2(source1[i], source2[i])`, in `(-pi, pi]`, with the
/// quadrant determined by both arguments; defined even where the second
/// source is zero.  The derivative at `(0, 0)` follows IEEE division.
#[derive(Debug, Default)]
pub struct Atan2Field;

impl FieldCore for Atan2Field {
    fn type_name(&self) -> &'static str {
        "atan2"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn copy(&self) -> Box<dyn FieldCore> {
        Box::new(Atan2Field)
    }

    fn evaluate(
        &self,
        module: &FieldModule,
        field: Field,
        cache: &mut Fieldcache,
    ) -> Result<(), Error> {
        let source1 = module.source_field(field, 0)?;
        let source2 = module.source_field(field, 1)?;
        module.evaluate(source1, cache)?;
        module.evaluate(source2, cache)?;
        let components = module.number_of_components(field)?;
        let terms = cache.requested_derivatives();
        let mut out = cache.acquire(field, components);
        let src1 = cache.value_cache(source1).ok_or(Error::NotDefined)?;
        let src2 = cache.value_cache(source2).ok_or(Error::NotDefined)?;
        for i in 0..components {
            out.values[i] = src1.values[i].atan2(src2.values[i]);
        }
        if terms > 0 && src1.derivatives_valid && src2.derivatives_valid {
            // d(atan2(u, v))/dx = (v * du/dx - u * dv/dx) / (u^2 + v^2)
            for i in 0..components {
                let u = src1.values[i];
                let v = src2.values[i];
                let u2_v2 = u * u + v * v;
                for j in 0..terms {
                    out.derivatives[i * terms + j] = (v
                        * src1.derivatives[i * terms + j]
                        - u * src2.derivatives[i * terms + j])
                        / u2_v2;
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
        if fd.total_order() > 1 {
            return module.finite_difference_derivative(field, cache, fd);
        }
        let source1 = module.source_field(field, 0)?;
        let source2 = module.source_field(field, 1)?;
        let d1 = module.evaluate_derivative(source1, cache, fd)?;
        let d2 = module.evaluate_derivative(source2, cache, fd)?;
        module.evaluate(source1, cache)?;
        module.evaluate(source2, cache)?;
        let components = module.number_of_components(field)?;
        let terms = fd.term_count();
        let src1 = cache.value_cache(source1).ok_or(Error::NotDefined)?;
        let src2 = cache.value_cache(source2).ok_or(Error::NotDefined)?;
        let mut out = vec![0.0; components * terms];
        for i in 0..components {
            // d(atan2(u, v))/dx = (v * du/dx - u * dv/dx) / (u^2 + v^2)
            let u = src1.values[i];
            let v = src2.values[i];
            let u2_v2 = u * u + v * v;
            let u_scaled = u / u2_v2;
            let v_scaled = v / u2_v2;
            for j in 0..terms {
                out[i * terms + j] = v_scaled * d1[i * terms + j]
                    - u_scaled * d2[i * terms + j];
            }
        }
        Ok(out)
    }

    fn describe(
        &self,
        module: &FieldModule,
        field: Field,
    ) -> Result<String, Error> {
        let source1 = module.source_field(field, 0)?;
        let source2 = module.source_field(field, 1)?;
        Ok(format!(
            "source fields : {} {}",
            module.name(source1)?,
            module.name(source2)?
        ))
    }

    fn command_string(
        &self,
        module: &FieldModule,
        field: Field,
    ) -> Result<String, Error> {
        let source1 = module.source_field(field, 0)?;
        let source2 = module.source_field(field, 1)?;
        Ok(format!(
            "atan2 fields {} {}",
            valid_token(module.name(source1)?),
            valid_token(module.name(source2)?)
        ))
    }
}

////////////////////////////////////////////////////////////////////////////
// Constructors

impl FieldModule {
    /// Builds a field computing the componentwise sine of `source`
    ///
    /// The new field has the source's component count; fails unless the
    /// source has numerical components.
    ///
    /// ```
    /// # use compfield::field::FieldModule;
    /// let mut module = FieldModule::new();
    /// let xi = module.create_xi_coordinates(1)?;
    /// let s = module.create_sin(xi)?;
    /// assert_eq!(module.number_of_components(s)?, 1);
    /// # Ok::<(), compfield::Error>(())
    /// ```
    pub fn create_sin(&mut self, source: Field) -> Result<Field, Error> {
        create_unary(self, source, Box::new(SinField))
    }

    /// Builds a field computing the componentwise cosine of `source`
    pub fn create_cos(&mut self, source: Field) -> Result<Field, Error> {
        create_unary(self, source, Box::new(CosField))
    }

    /// Builds a field computing the componentwise tangent of `source`
    pub fn create_tan(&mut self, source: Field) -> Result<Field, Error> {
        create_unary(self, source, Box::new(TanField))
    }

    /// Builds a field computing the componentwise arcsine of `source`
    pub fn create_asin(&mut self, source: Field) -> Result<Field, Error> {
        create_unary(self, source, Box::new(AsinField))
    }

    /// Builds a field computing the componentwise arccosine of `source`
    pub fn create_acos(&mut self, source: Field) -> Result<Field, Error> {
        create_unary(self, source, Box::new(AcosField))
    }

    /// Builds a field computing the componentwise arctangent of `source`
    pub fn create_atan(&mut self, source: Field) -> Result<Field, Error> {
        create_unary(self, source, Box::new(AtanField))
    }

    /// Builds a field computing the componentwise two-argument arctangent
    /// `atan2(source1, source2)`
    ///
    /// Both sources must have numerical components and identical component
    /// counts.
    pub fn create_atan2(
        &mut self,
        source1: Field,
        source2: Field,
    ) -> Result<Field, Error> {
        if !self.has_numerical_components(source1)?
            || !self.has_numerical_components(source2)?
        {
            error!("create_atan2: source fields must have numerical components");
            return Err(Error::NonNumericSource);
        }
        let c1 = self.number_of_components(source1)?;
        let c2 = self.number_of_components(source2)?;
        if c1 != c2 {
            error!(
                "create_atan2: source fields have {c1} and {c2} components; \
                 counts must match"
            );
            return Err(Error::ComponentCountMismatch(c1, c2));
        }
        self.create_field(Box::new(Atan2Field), &[source1, source2], c1)
    }
}

////////////////////////////////////////////////////////////////////////////
// Command parsing

fn define_unary(
    module: &mut FieldModule,
    state: &mut ParseState,
    create: fn(&mut FieldModule, Field) -> Result<Field, Error>,
) -> Result<Field, Error> {
    state.expect_keyword("field")?;
    let name = state.token()?;
    let source = module
        .find_field_by_name(&name)
        .ok_or(Error::UnknownField(name))?;
    create(module, source)
}

fn define_sin(
    module: &mut FieldModule,
    state: &mut ParseState,
) -> Result<Field, Error> {
    define_unary(module, state, FieldModule::create_sin)
}

fn define_cos(
    module: &mut FieldModule,
    state: &mut ParseState,
) -> Result<Field, Error> {
    define_unary(module, state, FieldModule::create_cos)
}

fn define_tan(
    module: &mut FieldModule,
    state: &mut ParseState,
) -> Result<Field, Error> {
    define_unary(module, state, FieldModule::create_tan)
}

fn define_asin(
    module: &mut FieldModule,
    state: &mut ParseState,
) -> Result<Field, Error> {
    define_unary(module, state, FieldModule::create_asin)
}

fn define_acos(
    module: &mut FieldModule,
    state: &mut ParseState,
) -> Result<Field, Error> {
    define_unary(module, state, FieldModule::create_acos)
}

fn define_atan(
    module: &mut FieldModule,
    state: &mut ParseState,
) -> Result<Field, Error> {
    define_unary(module, state, FieldModule::create_atan)
}

fn define_atan2(
    module: &mut FieldModule,
    state: &mut ParseState,
) -> Result<Field, Error> {
    state.expect_keyword("fields")?;
    let name1 = state.token()?;
    let name2 = state.token()?;
    let source1 = module
        .find_field_by_name(&name1)
        .ok_or(Error::UnknownField(name1))?;
    let source2 = module
        .find_field_by_name(&name2)
        .ok_or(Error::UnknownField(name2))?;
    module.create_atan2(source1, source2)
}

/// Configuration shared by the trigonometric type definers
#[derive(Debug, Default)]
pub struct TrigonometryPackage;

/// Registers the trigonometric field types with a registry
pub fn register_trigonometry_types(
    registry: &mut FieldTypeRegistry,
) -> Result<(), Error> {
    let package: Arc<dyn Any + Send + Sync> = Arc::new(TrigonometryPackage);
    registry.register("sin", define_sin, package.clone())?;
    registry.register("cos", define_cos, package.clone())?;
    registry.register("tan", define_tan, package.clone())?;
    registry.register("asin", define_asin, package.clone())?;
    registry.register("acos", define_acos, package.clone())?;
    registry.register("atan", define_atan, package.clone())?;
    registry.register("atan2", define_atan2, package)?;
    Ok(())
}
