use std::io;

use alloy_rlp::{Decodable, Encodable};
use containers::Status;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::commands::{
    Announce, BlockHeaders, GetBlockHeaders, LesMessage, ANNOUNCE, BLOCK_HEADERS,
    DEFAULT_CMD_ID_OFFSET, GET_BLOCK_HEADERS, STATUS,
};

pub const FRAME_HEADER_LEN: usize = 16;

/// Fixed header data following the frame size: `rlp([0, 0])`.
const FRAME_HEADER_DATA: [u8; 3] = [0xc2, 0x80, 0x80];

/// Frame bodies are padded to this many bytes.
const FRAME_PADDING: usize = 16;

/// The frame size field is 24 bits wide.
pub const MAX_FRAME_SIZE: usize = (1 << 24) - 1;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame header must be {FRAME_HEADER_LEN} bytes, got {0}")]
    BadHeader(usize),

    #[error("frame body holds {actual} bytes, header announces {expected}")]
    ShortBody { expected: usize, actual: usize },

    #[error("command id {cmd_id} is not an LES command at offset {offset}")]
    UnknownCommand { cmd_id: u64, offset: u64 },

    #[error("rlp: {0}")]
    Rlp(#[from] alloy_rlp::Error),

    #[error("{count} trailing bytes after {command} payload")]
    TrailingBytes { count: usize, command: &'static str },
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("frame of {0} bytes does not fit the 24-bit size field")]
    FrameTooLarge(usize),
}

/// Turns [`LesMessage`]s into frames and back for one connection.
///
/// A frame is a 16-byte header carrying the 24-bit body size, followed by
/// `rlp(cmd_id + offset) ++ rlp(payload)` zero-padded to 16 bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LesCodec {
    cmd_id_offset: u64,
}

impl Default for LesCodec {
    fn default() -> Self {
        Self::new(DEFAULT_CMD_ID_OFFSET)
    }
}

impl LesCodec {
    pub fn new(cmd_id_offset: u64) -> Self {
        Self { cmd_id_offset }
    }

    pub fn cmd_id_offset(&self) -> u64 {
        self.cmd_id_offset
    }

    pub fn encode(&self, message: &LesMessage) -> Result<(Vec<u8>, Vec<u8>), EncodeError> {
        let cmd_id = message.command_id() + self.cmd_id_offset;

        let mut body = Vec::new();
        cmd_id.encode(&mut body);
        match message {
            LesMessage::Status(status) => status.encode(&mut body),
            LesMessage::Announce(announce) => announce.encode(&mut body),
            LesMessage::GetBlockHeaders(request) => request.encode(&mut body),
            LesMessage::BlockHeaders(response) => response.encode(&mut body),
        }

        let frame_size = body.len();
        if frame_size > MAX_FRAME_SIZE {
            return Err(EncodeError::FrameTooLarge(frame_size));
        }

        let mut header = Vec::with_capacity(FRAME_HEADER_LEN);
        header.extend_from_slice(&(frame_size as u32).to_be_bytes()[1..]);
        header.extend_from_slice(&FRAME_HEADER_DATA);
        header.resize(FRAME_HEADER_LEN, 0);

        body.resize(padded_len(frame_size), 0);

        Ok((header, body))
    }

    pub fn decode(&self, header: &[u8], body: &[u8]) -> Result<LesMessage, DecodeError> {
        let frame_size = frame_size(header)?;
        if body.len() < frame_size {
            return Err(DecodeError::ShortBody {
                expected: frame_size,
                actual: body.len(),
            });
        }

        let mut buf = &body[..frame_size];
        let cmd_id = u64::decode(&mut buf)?;
        let unknown = DecodeError::UnknownCommand {
            cmd_id,
            offset: self.cmd_id_offset,
        };
        let Some(id) = cmd_id.checked_sub(self.cmd_id_offset) else {
            return Err(unknown);
        };

        let message = match id {
            STATUS => LesMessage::Status(Status::decode(&mut buf)?),
            ANNOUNCE => LesMessage::Announce(Announce::decode(&mut buf)?),
            GET_BLOCK_HEADERS => LesMessage::GetBlockHeaders(GetBlockHeaders::decode(&mut buf)?),
            BLOCK_HEADERS => LesMessage::BlockHeaders(BlockHeaders::decode(&mut buf)?),
            _ => return Err(unknown),
        };

        if !buf.is_empty() {
            return Err(DecodeError::TrailingBytes {
                count: buf.len(),
                command: message.name(),
            });
        }

        Ok(message)
    }

    /// Read one frame and decode it.
    ///
    /// Undecodable frames surface as [`io::ErrorKind::InvalidData`] wrapping
    /// the [`DecodeError`].
    pub async fn read_message<R>(&self, reader: &mut R) -> io::Result<LesMessage>
    where
        R: AsyncRead + Unpin,
    {
        let mut header = [0u8; FRAME_HEADER_LEN];
        reader.read_exact(&mut header).await?;
        let size = frame_size(&header).map_err(invalid_data)?;

        let mut body = vec![0u8; padded_len(size)];
        reader.read_exact(&mut body).await?;

        self.decode(&header, &body).map_err(invalid_data)
    }

    pub async fn write_message<W>(&self, writer: &mut W, message: &LesMessage) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let (header, body) = self
            .encode(message)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
        writer.write_all(&header).await?;
        writer.write_all(&body).await?;
        writer.flush().await
    }
}

/// Body size announced by a frame header.
pub fn frame_size(header: &[u8]) -> Result<usize, DecodeError> {
    let [a, b, c, ..] = header else {
        return Err(DecodeError::BadHeader(header.len()));
    };
    if header.len() != FRAME_HEADER_LEN {
        return Err(DecodeError::BadHeader(header.len()));
    }
    Ok(u32::from_be_bytes([0, *a, *b, *c]) as usize)
}

fn padded_len(size: usize) -> usize {
    size.div_ceil(FRAME_PADDING) * FRAME_PADDING
}

fn invalid_data(err: DecodeError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}
