//! DCC SEND wire format.
//!
//! ```text
//! DATA (sender -> receiver): raw file bytes, no framing
//! ACK  (receiver -> sender): [4 bytes BE: bytes received so far, mod 2^32]
//! ```
//!
//! Acks are cumulative, so a reader that falls behind only needs the last
//! one. Files over 4 GiB wrap the counter; comparisons go through
//! [`ack_value`].

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of one acknowledgement on the wire.
pub const ACK_LEN: usize = 4;

/// Truncates a running byte count to its 32-bit ack value.
pub fn ack_value(total: u64) -> u32 {
    total as u32
}

/// Writes an acknowledgement for `total` received bytes.
pub async fn write_ack<W: AsyncWrite + Unpin>(writer: &mut W, total: u64) -> std::io::Result<()> {
    writer.write_u32(ack_value(total)).await
}

/// Reads the next acknowledgement.
///
/// Returns `None` on a clean EOF at an ack boundary.
pub async fn read_ack<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Option<u32>> {
    let mut buf = [0u8; ACK_LEN];
    let mut filled = 0;
    while filled < ACK_LEN {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "truncated acknowledgement",
            ));
        }
        filled += n;
    }
    Ok(Some(u32::from_be_bytes(buf)))
}
