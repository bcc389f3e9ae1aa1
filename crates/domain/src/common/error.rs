use thiserror::Error;

use crate::addr::entity::AddrError;
use crate::filter::error::FilterError;
use crate::nat::error::NatError;

/// Rule-name validation failure.
#[derive(Debug, Error)]
pub enum NameError {
    #[error("rule name must not be empty")]
    Empty,

    #[error("rule name is {len} bytes, maximum is {max}")]
    TooLong { len: usize, max: usize },
}

/// Umbrella error surfaced across the control-plane boundary.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("no rule named {0}")]
    NoSuchAnchor(String),

    #[error("invalid rule: {0}")]
    InvalidRule(String),

    #[error("invalid address: {0}")]
    InvalidAddr(String),

    #[error("index {0} is out of range")]
    NoSuchIndex(usize),
}

impl From<FilterError> for DomainError {
    fn from(e: FilterError) -> Self {
        match e {
            FilterError::NoSuchAnchor { name } => Self::NoSuchAnchor(name),
            other => Self::InvalidRule(other.to_string()),
        }
    }
}

impl From<NatError> for DomainError {
    fn from(e: NatError) -> Self {
        match e {
            NatError::IndexOutOfBounds { index } => Self::NoSuchIndex(index),
            other => Self::InvalidRule(other.to_string()),
        }
    }
}

impl From<NameError> for DomainError {
    fn from(e: NameError) -> Self {
        Self::InvalidRule(e.to_string())
    }
}

impl From<AddrError> for DomainError {
    fn from(e: AddrError) -> Self {
        Self::InvalidAddr(e.to_string())
    }
}
