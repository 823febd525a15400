//! The LES sub-protocol message layer.
//!
//! - **Commands**: the four messages a header-only light client exchanges
//! - **Codec**: framing and command-id offset handling
//! - **Server**: answering `GetBlockHeaders` from a local header store

pub mod codec;
pub mod commands;
pub mod server;

pub use codec::{DecodeError, EncodeError, LesCodec};
pub use commands::{
    Announce, AnnounceParam, BlockHeaders, GetBlockHeaders, HeaderQuery, LesMessage,
    DEFAULT_CMD_ID_OFFSET,
};
pub use server::{answer_query, MAX_HEADERS_SERVE};

#[cfg(test)]
mod tests;
