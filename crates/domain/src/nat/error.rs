use thiserror::Error;

#[derive(Debug, Error)]
pub enum NatError {
    #[error("invalid port pool: {lo}..{hi}")]
    InvalidPortPool { lo: u16, hi: u16 },

    #[error("NAT rule index {index} is out of range")]
    IndexOutOfBounds { index: usize },
}
