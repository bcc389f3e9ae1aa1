#![no_main]

use libfuzzer_sys::fuzz_target;

use domain::packet::Ipv4PacketMut;

// Fuzz the packet view: arbitrary buffers must never panic, and a buffer
// that parses must survive endpoint rewrites with its bounds intact.
fuzz_target!(|data: &[u8]| {
    let mut buf = data.to_vec();

    let Ok(mut pkt) = Ipv4PacketMut::new(&mut buf) else {
        return;
    };

    let meta = pkt.meta();
    let _ = pkt.payload_len();

    // Rewrites must stay in bounds for any accepted geometry.
    pkt.rewrite_src(meta.src_ip.wrapping_add(1), meta.src_port.wrapping_add(1));
    pkt.rewrite_dst(meta.dst_ip ^ 0xFFFF_0000, meta.dst_port);

    let after = pkt.meta();
    assert_eq!(after.protocol, meta.protocol);
});
