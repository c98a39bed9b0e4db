// Compact binary encoding for live network packets.
//
// A `Packet` is a growable byte buffer with typed append operations; a
// `PacketReader` walks a byte slice with the matching typed reads. All
// integers are big-endian and fixed width:
//
//   u32 / i32   4 bytes
//   u64         8 bytes
//   f64         8 bytes (IEEE 754 bit pattern)
//   bool        1 byte (0 or 1; any non-zero reads as true)
//   string      u32 byte length, then UTF-8 bytes
//   enum        u32 wire value (see `wire_enum.rs`)
//
// Fields carry no tags or delimiters: reader and writer must agree on the
// field order, which is fixed per record type by the code that owns the
// record (e.g. the trap registry in `keeper_sim`).
//
// `PacketWrite`/`PacketRead` let record code write `packet.push(&name)` and
// `reader.pull::<i32>()` without naming the width at each call site.

use crate::error::WireError;
use crate::wire_enum::WireEnum;

/// Values that can be appended to a `Packet`.
pub trait PacketWrite {
    fn write_to(&self, packet: &mut Packet);
}

/// Values that can be read back from a `PacketReader`.
pub trait PacketRead: Sized {
    fn read_from(reader: &mut PacketReader<'_>) -> Result<Self, WireError>;
}

/// Outgoing binary packet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Packet {
    bytes: Vec<u8>,
}

impl Packet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append any `PacketWrite` value. Returns `self` for chaining.
    pub fn push<T: PacketWrite + ?Sized>(&mut self, value: &T) -> &mut Self {
        value.write_to(self);
        self
    }

    pub fn push_enum<E: WireEnum>(&mut self, value: E) -> &mut Self {
        self.push_u32(value.to_wire())
    }

    pub fn push_u32(&mut self, value: u32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn push_i32(&mut self, value: i32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn push_u64(&mut self, value: u64) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn push_f64(&mut self, value: f64) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_bits().to_be_bytes());
        self
    }

    pub fn push_bool(&mut self, value: bool) -> &mut Self {
        self.bytes.push(u8::from(value));
        self
    }

    /// Length-prefixed UTF-8. Strings longer than `u32::MAX` bytes are
    /// truncated to the prefix length; no game string comes close.
    pub fn push_str(&mut self, value: &str) -> &mut Self {
        let len = u32::try_from(value.len()).unwrap_or(u32::MAX);
        self.push_u32(len);
        self.bytes
            .extend_from_slice(&value.as_bytes()[..len as usize]);
        self
    }

    /// Append raw bytes with no length prefix. Used to embed an already
    /// encoded record at the tail of another packet.
    pub fn push_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn reader(&self) -> PacketReader<'_> {
        PacketReader::new(&self.bytes)
    }
}

/// Cursor over an incoming packet.
#[derive(Clone, Debug)]
pub struct PacketReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn pull<T: PacketRead>(&mut self) -> Result<T, WireError> {
        T::read_from(self)
    }

    pub fn pull_enum<E: WireEnum>(&mut self) -> Result<E, WireError> {
        let raw = self.read_u32()?;
        E::from_wire(raw).ok_or(WireError::UnknownEnumValue {
            kind: E::KIND,
            value: raw,
        })
    }

    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, WireError> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, WireError> {
        Ok(u64::from_be_bytes(self.take_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, WireError> {
        Ok(f64::from_bits(u64::from_be_bytes(self.take_array()?)))
    }

    pub fn read_bool(&mut self) -> Result<bool, WireError> {
        let [b] = self.take_array::<1>()?;
        Ok(b != 0)
    }

    pub fn read_string(&mut self) -> Result<String, WireError> {
        let len = self.read_u32()? as usize;
        let raw = self.take(len)?;
        Ok(String::from_utf8(raw.to_vec())?)
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Consume and return everything that is left.
    pub fn take_rest(&mut self) -> &'a [u8] {
        let rest = &self.bytes[self.pos..];
        self.pos = self.bytes.len();
        rest
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.remaining() < n {
            return Err(WireError::UnexpectedEnd {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Primitive impls
// ---------------------------------------------------------------------------

macro_rules! packet_primitive {
    ($ty:ty, $push:ident, $read:ident) => {
        impl PacketWrite for $ty {
            fn write_to(&self, packet: &mut Packet) {
                packet.$push(*self);
            }
        }

        impl PacketRead for $ty {
            fn read_from(reader: &mut PacketReader<'_>) -> Result<Self, WireError> {
                reader.$read()
            }
        }
    };
}

packet_primitive!(u32, push_u32, read_u32);
packet_primitive!(i32, push_i32, read_i32);
packet_primitive!(u64, push_u64, read_u64);
packet_primitive!(f64, push_f64, read_f64);
packet_primitive!(bool, push_bool, read_bool);

impl PacketWrite for str {
    fn write_to(&self, packet: &mut Packet) {
        packet.push_str(self);
    }
}

impl PacketWrite for String {
    fn write_to(&self, packet: &mut Packet) {
        packet.push_str(self);
    }
}

impl PacketRead for String {
    fn read_from(reader: &mut PacketReader<'_>) -> Result<Self, WireError> {
        reader.read_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_width_big_endian_layout() {
        let mut packet = Packet::new();
        packet.push(&1u32).push(&-2i32).push(&true);
        assert_eq!(
            packet.as_bytes(),
            &[0, 0, 0, 1, 0xFF, 0xFF, 0xFF, 0xFE, 1]
        );
    }

    #[test]
    fn string_is_length_prefixed() {
        let mut packet = Packet::new();
        packet.push("Spike_4");
        assert_eq!(&packet.as_bytes()[..4], &[0, 0, 0, 7]);
        assert_eq!(&packet.as_bytes()[4..], b"Spike_4");
    }

    #[test]
    fn mixed_fields_read_back_in_order() {
        let mut packet = Packet::new();
        packet
            .push("Cannon_1")
            .push(&3i32)
            .push(&2u32)
            .push(&7u64)
            .push(&0.75f64);

        let mut reader = packet.reader();
        assert_eq!(reader.pull::<String>().unwrap(), "Cannon_1");
        assert_eq!(reader.pull::<i32>().unwrap(), 3);
        assert_eq!(reader.pull::<u32>().unwrap(), 2);
        assert_eq!(reader.pull::<u64>().unwrap(), 7);
        assert_eq!(reader.pull::<f64>().unwrap(), 0.75);
        assert!(reader.is_exhausted());
    }

    #[test]
    fn truncated_integer_reports_shortfall() {
        let mut reader = PacketReader::new(&[0, 0, 1]);
        match reader.read_u32() {
            Err(WireError::UnexpectedEnd { needed, remaining }) => {
                assert_eq!(needed, 4);
                assert_eq!(remaining, 3);
            }
            other => panic!("expected UnexpectedEnd, got {other:?}"),
        }
    }

    #[test]
    fn string_length_beyond_buffer_is_rejected() {
        let mut packet = Packet::new();
        packet.push_u32(100).push_raw(b"short");
        let mut reader = packet.reader();
        assert!(matches!(
            reader.read_string(),
            Err(WireError::UnexpectedEnd { needed: 100, .. })
        ));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let mut packet = Packet::new();
        packet.push_u32(2).push_raw(&[0xC3, 0x28]);
        assert!(matches!(
            packet.reader().read_string(),
            Err(WireError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn take_rest_consumes_tail() {
        let mut packet = Packet::new();
        packet.push(&9u32).push_raw(&[1, 2, 3]);
        let mut reader = packet.reader();
        reader.read_u32().unwrap();
        assert_eq!(reader.take_rest(), &[1, 2, 3]);
        assert!(reader.is_exhausted());
    }
}
