use soc_traits::ChemistryKind;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    #[error("chemistry {0:?} is not available from the provider")]
    MissingChemistry(ChemistryKind),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
