pub mod checksum;
pub mod view;

pub use view::{Ipv4PacketMut, PacketError};
