// keeper_protocol: wire formats shared by the server, its clients, and the
// save-file code.
//
// This crate is the WireCodec of the project. It defines how typed values
// are laid out on the two channels the game uses and nothing about what those
// values mean; it has no dependency on the sim crate.
//
// Module overview:
// - `packet.rs`:    Compact binary packets (`Packet`, `PacketReader`,
//                   `PacketWrite`/`PacketRead`), big-endian fixed width.
// - `save.rs`:      Tab-delimited save streams (`SaveWriter`, `SaveReader`).
// - `wire_enum.rs`: `WireEnum` trait and `wire_enum!` macro: every enum is a
//                   stable `u32` on both channels.
// - `framing.rs`:   4-byte length prefix framing over `Read`/`Write`.
// - `message.rs`:   `NotificationType` tags and the client `Hello`.
// - `types.rs`:     `PlayerId`, `PROTOCOL_VERSION`.
// - `error.rs`:     `WireError`.
//
// Design decisions:
// - **Two encodings, one field order.** Record code writes the same fields in
//   the same order to both channels; only delimiters and widths differ.
// - **No async runtime.** Plain `std::io`, usable from blocking TCP threads
//   and from in-memory buffers in tests.

pub mod error;
pub mod framing;
pub mod message;
pub mod packet;
pub mod save;
pub mod types;
pub mod wire_enum;

pub use error::WireError;
pub use framing::{MAX_FRAME_SIZE, read_frame, write_frame};
pub use message::{Hello, NotificationType};
pub use packet::{Packet, PacketRead, PacketReader, PacketWrite};
pub use save::{SaveReader, SaveWriter};
pub use types::{PROTOCOL_VERSION, PlayerId};
pub use wire_enum::WireEnum;

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// Encode a hello, frame it, unframe it, decode it.
    #[test]
    fn framed_hello_roundtrip() {
        let hello = Hello::new("Overlord");
        let mut wire = Vec::new();
        write_frame(&mut wire, hello.encode().as_bytes()).unwrap();

        let mut cursor = Cursor::new(wire);
        let payload = read_frame(&mut cursor).unwrap();
        assert_eq!(Hello::decode(&payload).unwrap(), hello);
    }

    /// The same enum value is written as the same number on both channels.
    #[test]
    fn enum_representation_matches_across_channels() {
        let tag = NotificationType::TileFullnessChange;

        let mut packet = Packet::new();
        packet.push(&tag);
        let binary = packet.reader().read_u32().unwrap();

        let mut writer = SaveWriter::new(Vec::new());
        writer.enum_token(tag).unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();

        assert_eq!(binary, tag.to_wire());
        assert_eq!(text, tag.to_wire().to_string());

        let mut reader = SaveReader::new(Cursor::new(text));
        assert_eq!(reader.enum_token::<NotificationType>().unwrap(), tag);
    }
}
