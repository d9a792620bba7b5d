//! Splitting recorded packets back into wire units.

use bytes::Bytes;
use groupwire::wire::{FRAGMENT_FLAG, HEADER_SIZE, WireHeader};

/// One header-delimited unit inside a packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireUnit {
    /// Raw type byte, fragment flag included.
    pub type_byte: u8,
    pub channel: u8,
    /// Bytes after the six-byte header, fragment sub-header included.
    pub body: Bytes,
}

impl WireUnit {
    /// Whether this unit is a fragment.
    #[must_use]
    pub fn is_fragment(&self) -> bool { self.type_byte & FRAGMENT_FLAG != 0 }

    /// Body with any fragment sub-header skipped.
    ///
    /// # Panics
    ///
    /// Panics if a fragment's sub-header is malformed.
    #[must_use]
    pub fn payload(&self) -> Bytes {
        if !self.is_fragment() {
            return self.body.clone();
        }
        let (_, used) = groupwire::fragment::FragmentSubHeader::decode(&self.body)
            .expect("well-formed fragment sub-header");
        self.body.slice(used..)
    }
}

/// Split a packet into its units.
///
/// # Panics
///
/// Panics if the packet is truncated.
#[must_use]
pub fn split_units(packet: &Bytes) -> Vec<WireUnit> {
    let mut units = Vec::new();
    let mut offset = 0;
    while offset < packet.len() {
        let head: [u8; HEADER_SIZE] = packet[offset..offset + HEADER_SIZE]
            .try_into()
            .expect("complete header");
        let header = WireHeader::decode(head);
        let start = offset + HEADER_SIZE;
        let end = start + header.body_len();
        assert!(end <= packet.len(), "truncated unit at offset {offset}");
        units.push(WireUnit {
            type_byte: head[0],
            channel: header.channel(),
            body: packet.slice(start..end),
        });
        offset = end;
    }
    units
}
