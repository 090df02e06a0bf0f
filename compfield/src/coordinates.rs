//! Coordinate system tags for field components
//!
//! A [`CoordinateSystem`] describes how a field's component values are to be
//! interpreted (rectangular Cartesian, cylindrical polar, etc).  It is
//! orthogonal to the field's kind: any field may carry any coordinate system,
//! and changing it does not change the computed values.
use serde::{Deserialize, Serialize};

/// How the components of a field are interpreted
///
/// New fields inherit the coordinate system of their first source field and
/// may be retagged afterwards with
/// [`FieldModule::set_coordinate_system`](crate::field::FieldModule::set_coordinate_system).
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CoordinateSystem {
    /// Ordinary `x, y, z` components
    RectangularCartesian,
    /// `r, theta, z` components
    CylindricalPolar,
    /// `r, theta, phi` components
    SphericalPolar,
    /// `lambda, mu, theta` components about the given focus
    ProlateSpheroidal {
        /// Focus parameter of the spheroidal system
        focus: f64,
    },
    /// `lambda, mu, theta` components about the given focus
    OblateSpheroidal {
        /// Focus parameter of the spheroidal system
        focus: f64,
    },
    /// Fibre angles relative to a coordinate field
    Fibre,
    /// Components carry no spatial interpretation
    NotApplicable,
}

impl Default for CoordinateSystem {
    fn default() -> Self {
        CoordinateSystem::RectangularCartesian
    }
}

impl std::fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinateSystem::RectangularCartesian => {
                write!(f, "rectangular cartesian")
            }
            CoordinateSystem::CylindricalPolar => write!(f, "cylindrical polar"),
            CoordinateSystem::SphericalPolar => write!(f, "spherical polar"),
            CoordinateSystem::ProlateSpheroidal { focus } => {
                write!(f, "prolate spheroidal focus {focus}")
            }
            CoordinateSystem::OblateSpheroidal { focus } => {
                write!(f, "oblate spheroidal focus {focus}")
            }
            CoordinateSystem::Fibre => write!(f, "fibre"),
            CoordinateSystem::NotApplicable => write!(f, "not applicable"),
        }
    }
}
