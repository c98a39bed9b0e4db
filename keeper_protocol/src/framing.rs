// Length-delimited framing of packets over a byte stream.
//
// TCP gives us an ordered byte stream but no message boundaries. Each packet
// is therefore sent as a frame: a 4-byte big-endian length followed by the
// packet bytes. Framing knows nothing about packet contents; the server's
// dispatch thread frames whatever `ServerNotification::encode()` produced,
// and client reader threads hand unframed packets to the decoder.
//
// `MAX_FRAME_SIZE` bounds the allocation a corrupt or hostile length prefix
// can trigger. The largest legitimate frame is an add-trap notification for
// a very large trap; 1 MiB is far above that.

use std::io::{self, Read, Write};

/// Largest accepted frame payload in bytes (1 MiB).
pub const MAX_FRAME_SIZE: u32 = 1024 * 1024;

/// Write one frame and flush.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|&len| len <= MAX_FRAME_SIZE)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "frame too large: {} bytes (max {MAX_FRAME_SIZE})",
                    payload.len()
                ),
            )
        })?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()
}

/// Read one frame.
///
/// `UnexpectedEof` if the stream ends before or inside a frame,
/// `InvalidData` if the length prefix exceeds `MAX_FRAME_SIZE`.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {len} bytes (max {MAX_FRAME_SIZE})"),
        ));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}
