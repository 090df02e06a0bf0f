//! compfield is a computed-field evaluation engine for finite-element
//! models: a lazily-evaluated expression graph over fields, with per-field
//! caching of values and directional derivatives.
//!
//! A **field** is a function from an evaluation location (a position within
//! a mesh element, or a node at a time) to a fixed number of numeric
//! components.  Fields compose: a `sin` field computes the componentwise
//! sine of its source field, an `atan2` field combines two sources, and so
//! on, forming a DAG in which one field may feed many dependents.
//!
//! # Field construction
//! Fields live in a [`FieldModule`](field::FieldModule), which is used like
//! an arena allocator: it grows as fields are created and frees everything
//! when dropped.  Handles into the arena are plain [`Field`](field::Field)
//! indices.
//!
//! ```
//! use compfield::field::FieldModule;
//!
//! let mut module = FieldModule::new();
//! let xi = module.create_xi_coordinates(1)?;
//! let wave = module.create_sin(xi)?;
//! # Ok::<(), compfield::Error>(())
//! ```
//!
//! # Evaluation
//! Evaluation happens through a [`Fieldcache`](cache::Fieldcache), which
//! scopes one location and owns every intermediate result computed there.
//! Re-evaluating any field in an unmoved cache is free, and a field shared
//! by several dependents is computed at most once per location:
//!
//! ```
//! use compfield::cache::Fieldcache;
//! use compfield::field::FieldModule;
//! use compfield::location::{ElementId, Location};
//!
//! let mut module = FieldModule::new();
//! let xi = module.create_xi_coordinates(1)?;
//! let wave = module.create_sin(xi)?;
//!
//! let mut cache = Fieldcache::new(Location::element(ElementId(1), &[0.25]));
//! cache.set_requested_derivatives(1);
//! let out = module.evaluate(wave, &mut cache)?;
//! assert_eq!(out.values[0], 0.25_f64.sin());
//! // chain rule against d(xi)/d(xi) = 1
//! assert_eq!(out.derivatives[0], 0.25_f64.cos());
//! # Ok::<(), compfield::Error>(())
//! ```
//!
//! First derivatives are computed alongside values when the cache requests
//! them; higher-order derivatives go through
//! [`FieldModule::evaluate_derivative`](field::FieldModule::evaluate_derivative),
//! which is analytic at first order and falls back to finite differences
//! above it.
//!
//! # Textual definition
//! Every field kind has a command-text form
//! ([`FieldModule::command_string`](field::FieldModule::command_string))
//! and can be reconstructed from it through a
//! [`FieldTypeRegistry`](registry::FieldTypeRegistry), the registration
//! point for field kinds defined outside this crate.
#![warn(missing_docs)]

pub mod cache;
pub mod coordinates;
mod error;
pub mod field;
mod indexed;
pub mod location;
pub mod registry;

pub use error::Error;
