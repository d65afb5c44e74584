pub mod chemistry;

pub use chemistry::{
    Chemistry, ChemistryKind, ChemistryParams, ChemistryProvider, HysteresisParams,
    UnknownChemistry,
};
