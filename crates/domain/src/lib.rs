#![forbid(unsafe_code)]

pub mod addr;
pub mod common;
pub mod conntrack;
pub mod filter;
pub mod logbuf;
pub mod nat;
pub mod packet;
