//! Byte order between the bus and the processor
//!
//! The bus carries multi-byte values most significant byte first while the
//! processor stores them least significant byte first. Every float crossing
//! the boundary is swapped, never reinterpreted in place.

/// Reverse the bytes of a word
///
/// Applying it twice gives back the input.
pub fn change_endian<const N: usize>(bytes: [u8; N]) -> [u8; N] {
    let mut out = bytes;
    out.reverse();
    out
}

/// Encode a float for the bus
pub fn f32_to_wire(value: f32) -> [u8; 4] {
    change_endian(value.to_le_bytes())
}

/// Decode a float received from the bus
pub fn f32_from_wire(bytes: [u8; 4]) -> f32 {
    f32::from_le_bytes(change_endian(bytes))
}

/// Encode a 32-bit word least significant byte first
///
/// Used by the RCA range replies, which the bus interface board reads as
/// native little-endian words.
pub fn u32_to_le_wire(value: u32) -> [u8; 4] {
    value.to_le_bytes()
}
