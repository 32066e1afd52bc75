use super::error::ModelError;
use crate::core::lattice::LatticeParameters;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Where the value of one of the six lattice constants comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Slot {
    /// Taken from the reduced parameter vector at this index.
    Free(usize),
    /// Held at a constant.
    Fixed(f64),
}

use Slot::{Fixed, Free};

/// The Bravais cell families a refinement can be constrained to.
///
/// Each variant fixes which of the six lattice constants vary and how the
/// others follow from them. All three strategy operations ([`init`](Self::init),
/// [`expand_parameters`](Self::expand_parameters) and
/// [`expand_errors`](Self::expand_errors)) are derived from one slot table, so
/// the forward and inverse mappings cannot disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CellType {
    Triclinic,
    #[serde(alias = "monoclinic-a-unique")]
    MonoclinicA,
    #[serde(alias = "monoclinic-b-unique")]
    MonoclinicB,
    #[serde(alias = "monoclinic-c-unique")]
    MonoclinicC,
    Orthorhombic,
    Tetragonal,
    Rhombohedral,
    Hexagonal,
    Cubic,
}

impl CellType {
    pub const ALL: [CellType; 9] = [
        CellType::Triclinic,
        CellType::MonoclinicA,
        CellType::MonoclinicB,
        CellType::MonoclinicC,
        CellType::Orthorhombic,
        CellType::Tetragonal,
        CellType::Rhombohedral,
        CellType::Hexagonal,
        CellType::Cubic,
    ];

    fn slots(&self) -> [Slot; 6] {
        match self {
            CellType::Triclinic => [Free(0), Free(1), Free(2), Free(3), Free(4), Free(5)],
            CellType::MonoclinicA => [Free(0), Free(1), Free(2), Free(3), Fixed(90.0), Fixed(90.0)],
            CellType::MonoclinicB => [Free(0), Free(1), Free(2), Fixed(90.0), Free(3), Fixed(90.0)],
            CellType::MonoclinicC => [Free(0), Free(1), Free(2), Fixed(90.0), Fixed(90.0), Free(3)],
            CellType::Orthorhombic => {
                [Free(0), Free(1), Free(2), Fixed(90.0), Fixed(90.0), Fixed(90.0)]
            }
            CellType::Tetragonal => {
                [Free(0), Free(0), Free(1), Fixed(90.0), Fixed(90.0), Fixed(90.0)]
            }
            CellType::Rhombohedral => [Free(0), Free(0), Free(0), Free(1), Free(1), Free(1)],
            CellType::Hexagonal => {
                [Free(0), Free(0), Free(1), Fixed(90.0), Fixed(90.0), Fixed(120.0)]
            }
            CellType::Cubic => {
                [Free(0), Free(0), Free(0), Fixed(90.0), Fixed(90.0), Fixed(90.0)]
            }
        }
    }

    /// Labels of the free parameters, in reduced-vector order.
    pub fn parameter_names(&self) -> &'static [&'static str] {
        match self {
            CellType::Triclinic => &["a", "b", "c", "alpha", "beta", "gamma"],
            CellType::MonoclinicA => &["a", "b", "c", "alpha"],
            CellType::MonoclinicB => &["a", "b", "c", "beta"],
            CellType::MonoclinicC => &["a", "b", "c", "gamma"],
            CellType::Orthorhombic => &["a", "b", "c"],
            CellType::Tetragonal | CellType::Hexagonal => &["a", "c"],
            CellType::Rhombohedral => &["a", "alpha"],
            CellType::Cubic => &["a"],
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_names().len()
    }

    /// Reduced parameters for an unconstrained cell: each free parameter is the
    /// mean of the lattice constants it controls.
    pub fn init(&self, unconstrained: &LatticeParameters) -> Vec<f64> {
        let values = unconstrained.to_array();
        let slots = self.slots();
        (0..self.parameter_count())
            .map(|index| {
                let controlled: Vec<f64> = slots
                    .iter()
                    .zip(values)
                    .filter(|(slot, _)| **slot == Free(index))
                    .map(|(_, value)| value)
                    .collect();
                controlled.iter().sum::<f64>() / controlled.len() as f64
            })
            .collect()
    }

    /// Full lattice described by a reduced parameter vector.
    pub fn expand_parameters(&self, reduced: &[f64]) -> Result<LatticeParameters, ModelError> {
        self.check_len(reduced, "parameter")?;
        let values = self.slots().map(|slot| match slot {
            Free(index) => reduced[index],
            Fixed(value) => value,
        });
        Ok(LatticeParameters::from_array(values))
    }

    /// Six lattice-constant errors from reduced parameter errors. Shared slots
    /// repeat the same error, fixed slots are zero.
    pub fn expand_errors(&self, reduced_errors: &[f64]) -> Result<[f64; 6], ModelError> {
        self.check_len(reduced_errors, "error")?;
        Ok(self.slots().map(|slot| match slot {
            Free(index) => reduced_errors[index],
            Fixed(_) => 0.0,
        }))
    }

    fn check_len(&self, values: &[f64], kind: &str) -> Result<(), ModelError> {
        if values.len() == self.parameter_count() {
            Ok(())
        } else {
            Err(ModelError::InvalidArgument(format!(
                "{} expects {} {} values, got {}",
                self,
                self.parameter_count(),
                kind,
                values.len()
            )))
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CellType::Triclinic => "Triclinic",
            CellType::MonoclinicA => "Monoclinic ( a unique )",
            CellType::MonoclinicB => "Monoclinic ( b unique )",
            CellType::MonoclinicC => "Monoclinic ( c unique )",
            CellType::Orthorhombic => "Orthorhombic",
            CellType::Tetragonal => "Tetragonal",
            CellType::Rhombohedral => "Rhombohedral",
            CellType::Hexagonal => "Hexagonal",
            CellType::Cubic => "Cubic",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("Unknown cell type '{0}'")]
pub struct UnknownCellType(pub String);

impl FromStr for CellType {
    type Err = UnknownCellType;

    /// Accepts kebab-case identifiers (`monoclinic-b`) as well as the long
    /// names (`Monoclinic ( b unique )`), matched by prefix and ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        let cell_type = if normalized.starts_with("monoclinic") {
            let rest = normalized.trim_start_matches("monoclinic");
            match rest.chars().next() {
                Some('a') => CellType::MonoclinicA,
                Some('b') | None => CellType::MonoclinicB,
                Some('c') => CellType::MonoclinicC,
                _ => return Err(UnknownCellType(s.to_string())),
            }
        } else if normalized.starts_with("tric") {
            CellType::Triclinic
        } else if normalized.starts_with("ortho") {
            CellType::Orthorhombic
        } else if normalized.starts_with("tetra") {
            CellType::Tetragonal
        } else if normalized.starts_with("rhomb") {
            CellType::Rhombohedral
        } else if normalized.starts_with("hex") {
            CellType::Hexagonal
        } else if normalized.starts_with("cubic") {
            CellType::Cubic
        } else {
            return Err(UnknownCellType(s.to_string()));
        };
        Ok(cell_type)
    }
}
