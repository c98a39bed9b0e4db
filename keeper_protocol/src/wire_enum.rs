// Fixed-width adapters for enums exchanged on the wire.
//
// Every enum that crosses a channel (save file or live packet) is written as
// a `u32` through the same `to_wire`/`from_wire` pair, so both channels agree
// on the representation and nothing else ever depends on an enum's memory
// layout. The discriminants are a persisted contract: once a value ships in
// a save file it must never be renumbered.
//
// `wire_enum!` declares the enum with explicit discriminants and generates the
// `WireEnum` impl plus the packet read/write impls in one place.
//
// See also: `packet.rs` (`Packet::push_enum`, `PacketReader::pull_enum`),
// `save.rs` (`SaveWriter::enum_token`, `SaveReader::enum_token`).

/// An enum with a stable `u32` wire representation.
pub trait WireEnum: Copy + Sized {
    /// Enum name used in error messages.
    const KIND: &'static str;

    fn to_wire(self) -> u32;

    /// `None` for values with no matching variant.
    fn from_wire(raw: u32) -> Option<Self>;
}

/// Declare an enum with explicit, stable wire values.
///
/// ```
/// keeper_protocol::wire_enum! {
///     /// Door state.
///     pub enum DoorState {
///         Closed = 0,
///         Open = 1,
///     }
/// }
///
/// use keeper_protocol::WireEnum;
/// assert_eq!(DoorState::Open.to_wire(), 1);
/// assert_eq!(DoorState::from_wire(0), Some(DoorState::Closed));
/// assert_eq!(DoorState::from_wire(9), None);
/// ```
#[macro_export]
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant = $value ),+
        }

        impl $crate::wire_enum::WireEnum for $name {
            const KIND: &'static str = stringify!($name);

            fn to_wire(self) -> u32 {
                self as u32
            }

            fn from_wire(raw: u32) -> Option<Self> {
                match raw {
                    $( $value => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl $crate::packet::PacketWrite for $name {
            fn write_to(&self, packet: &mut $crate::packet::Packet) {
                packet.push_enum(*self);
            }
        }

        impl $crate::packet::PacketRead for $name {
            fn read_from(
                reader: &mut $crate::packet::PacketReader<'_>,
            ) -> Result<Self, $crate::error::WireError> {
                reader.pull_enum()
            }
        }
    };
}
