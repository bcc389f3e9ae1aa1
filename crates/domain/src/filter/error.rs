use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("no rule named {name}")]
    NoSuchAnchor { name: String },

    #[error("invalid rule name: {reason}")]
    InvalidName { reason: String },

    #[error("invalid port range: {lo}..{hi}")]
    InvalidPortRange { lo: u16, hi: u16 },
}
