use thiserror::Error;

use crate::common::entity::PacketMeta;

use super::checksum;

const MIN_HEADER_LEN: usize = 20;

const PROTO_TCP: u8 = 6;
const PROTO_UDP: u8 = 17;

/// Byte offsets within the IPv4 header.
const OFF_TOT_LEN: usize = 2;
const OFF_PROTOCOL: usize = 9;
const OFF_IP_CSUM: usize = 10;
const OFF_SRC_ADDR: usize = 12;
const OFF_DST_ADDR: usize = 16;

/// Byte offsets within the transport header, relative to its start.
const OFF_SRC_PORT: usize = 0;
const OFF_DST_PORT: usize = 2;
const OFF_TCP_CSUM: usize = 16;
const OFF_UDP_CSUM: usize = 6;

#[derive(Debug, Error)]
pub enum PacketError {
    #[error("buffer holds {have} bytes, packet claims {needed}")]
    Truncated { needed: usize, have: usize },

    #[error("not an IPv4 packet (version {version})")]
    NotIpv4 { version: u8 },

    #[error("header length {0} is shorter than the minimum IPv4 header")]
    BadHeaderLen(usize),
}

/// Mutable view over one IPv4 packet in a caller-owned buffer.
///
/// Construction validates version, header length, and that the buffer
/// really holds `tot_len` bytes; every later access stays inside those
/// bounds. Rewrites patch addresses/ports in place and recompute the IP
/// header checksum plus the TCP/UDP transport checksum.
pub struct Ipv4PacketMut<'a> {
    buf: &'a mut [u8],
    header_len: usize,
    total_len: usize,
}

impl<'a> Ipv4PacketMut<'a> {
    pub fn new(buf: &'a mut [u8]) -> Result<Self, PacketError> {
        if buf.len() < MIN_HEADER_LEN {
            return Err(PacketError::Truncated {
                needed: MIN_HEADER_LEN,
                have: buf.len(),
            });
        }
        let version = buf[0] >> 4;
        if version != 4 {
            return Err(PacketError::NotIpv4 { version });
        }
        let header_len = usize::from(buf[0] & 0x0F) * 4;
        if header_len < MIN_HEADER_LEN {
            return Err(PacketError::BadHeaderLen(header_len));
        }
        let total_len = usize::from(u16::from_be_bytes([buf[OFF_TOT_LEN], buf[OFF_TOT_LEN + 1]]));
        if total_len < header_len || buf.len() < total_len {
            return Err(PacketError::Truncated {
                needed: total_len.max(header_len),
                have: buf.len(),
            });
        }
        Ok(Self {
            buf,
            header_len,
            total_len,
        })
    }

    pub fn src_ip(&self) -> u32 {
        self.read_u32(OFF_SRC_ADDR)
    }

    pub fn dst_ip(&self) -> u32 {
        self.read_u32(OFF_DST_ADDR)
    }

    pub fn protocol(&self) -> u8 {
        self.buf[OFF_PROTOCOL]
    }

    pub fn header_len(&self) -> usize {
        self.header_len
    }

    pub fn total_len(&self) -> usize {
        self.total_len
    }

    /// IP payload length: total length minus header length.
    pub fn payload_len(&self) -> u32 {
        (self.total_len - self.header_len) as u32
    }

    fn has_ports(&self) -> bool {
        matches!(self.protocol(), PROTO_TCP | PROTO_UDP)
            && self.total_len >= self.header_len + 4
    }

    /// Transport ports; `(0, 0)` for protocols without them.
    pub fn ports(&self) -> (u16, u16) {
        if !self.has_ports() {
            return (0, 0);
        }
        let base = self.header_len;
        (
            self.read_u16(base + OFF_SRC_PORT),
            self.read_u16(base + OFF_DST_PORT),
        )
    }

    pub fn meta(&self) -> PacketMeta {
        let (src_port, dst_port) = self.ports();
        PacketMeta {
            src_ip: self.src_ip(),
            dst_ip: self.dst_ip(),
            src_port,
            dst_port,
            protocol: self.protocol(),
        }
    }

    /// Rewrite the source endpoint in place. The port is only written for
    /// TCP/UDP; both checksums are refreshed.
    pub fn rewrite_src(&mut self, ip: u32, port: u16) {
        self.buf[OFF_SRC_ADDR..OFF_SRC_ADDR + 4].copy_from_slice(&ip.to_be_bytes());
        if self.has_ports() {
            let base = self.header_len + OFF_SRC_PORT;
            self.buf[base..base + 2].copy_from_slice(&port.to_be_bytes());
        }
        self.refresh_checksums();
    }

    /// Rewrite the destination endpoint in place; see [`Self::rewrite_src`].
    pub fn rewrite_dst(&mut self, ip: u32, port: u16) {
        self.buf[OFF_DST_ADDR..OFF_DST_ADDR + 4].copy_from_slice(&ip.to_be_bytes());
        if self.has_ports() {
            let base = self.header_len + OFF_DST_PORT;
            self.buf[base..base + 2].copy_from_slice(&port.to_be_bytes());
        }
        self.refresh_checksums();
    }

    fn refresh_checksums(&mut self) {
        // IP header checksum is always recomputed from scratch.
        self.buf[OFF_IP_CSUM] = 0;
        self.buf[OFF_IP_CSUM + 1] = 0;
        let ip_csum = checksum::ipv4_header(&self.buf[..self.header_len]);
        self.buf[OFF_IP_CSUM..OFF_IP_CSUM + 2].copy_from_slice(&ip_csum.to_be_bytes());

        let src = self.src_ip();
        let dst = self.dst_ip();
        let base = self.header_len;
        match self.protocol() {
            PROTO_TCP if self.total_len >= base + OFF_TCP_CSUM + 2 => {
                let csum_at = base + OFF_TCP_CSUM;
                self.buf[csum_at] = 0;
                self.buf[csum_at + 1] = 0;
                let csum =
                    checksum::transport(src, dst, PROTO_TCP, &self.buf[base..self.total_len]);
                self.buf[csum_at..csum_at + 2].copy_from_slice(&csum.to_be_bytes());
            }
            PROTO_UDP if self.total_len >= base + OFF_UDP_CSUM + 2 => {
                let csum_at = base + OFF_UDP_CSUM;
                // A zero UDP checksum means "not computed" and stays zero.
                if self.read_u16(csum_at) == 0 {
                    return;
                }
                self.buf[csum_at] = 0;
                self.buf[csum_at + 1] = 0;
                let mut csum =
                    checksum::transport(src, dst, PROTO_UDP, &self.buf[base..self.total_len]);
                if csum == 0 {
                    csum = 0xFFFF;
                }
                self.buf[csum_at..csum_at + 2].copy_from_slice(&csum.to_be_bytes());
            }
            _ => {}
        }
    }

    fn read_u16(&self, off: usize) -> u16 {
        u16::from_be_bytes([self.buf[off], self.buf[off + 1]])
    }

    fn read_u32(&self, off: usize) -> u32 {
        u32::from_be_bytes([
            self.buf[off],
            self.buf[off + 1],
            self.buf[off + 2],
            self.buf[off + 3],
        ])
    }
}
