#![no_main]

use libfuzzer_sys::fuzz_target;

use domain::addr::entity::{Ipv4Net, PortRange};

// Fuzz the address utilities: network parsing/formatting and port-range
// packing.
//
// Layout:
//   [0]    = selector (0=parse/format, 1=port-range pack)
//   rest   = consumed per operation
fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    match data[0] % 2 {
        // Sub-target 0: parse arbitrary strings; whatever parses must
        // format back to something that re-parses to the same network.
        0 => {
            if let Ok(text) = std::str::from_utf8(&data[1..]) {
                if let Ok(net) = text.parse::<Ipv4Net>() {
                    let formatted = net.to_string();
                    let reparsed: Ipv4Net = formatted.parse().expect("formatted net must parse");
                    assert_eq!(reparsed.mask, net.mask);
                    assert_eq!(reparsed.addr & reparsed.mask, net.addr & net.mask);
                }
            }
        }
        // Sub-target 1: pack/unpack arbitrary port ranges.
        _ => {
            let mut cursor = 1;
            while cursor + 4 <= data.len() {
                let lo = u16::from_le_bytes([data[cursor], data[cursor + 1]]);
                let hi = u16::from_le_bytes([data[cursor + 2], data[cursor + 3]]);
                cursor += 4;

                let range = PortRange::new(lo, hi);
                if range.validate().is_ok() {
                    let packed = range.pack();
                    if packed != 0 {
                        assert_eq!(PortRange::unpack(packed), range);
                    }
                    for port in [lo, hi] {
                        assert!(range.contains(port));
                    }
                }
            }
        }
    }
});
