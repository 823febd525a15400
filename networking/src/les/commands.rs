use alloy_primitives::{B256, Bytes};
use alloy_rlp::{RlpDecodable, RlpEncodable};
use containers::{BlockHeader, BlockNumber, ChainHead, ChainScore, HashOrNumber, Status};

pub const STATUS: u64 = 0x00;
pub const ANNOUNCE: u64 = 0x01;
pub const GET_BLOCK_HEADERS: u64 = 0x02;
pub const BLOCK_HEADERS: u64 = 0x03;

/// Ids below this belong to the base devp2p protocol.
pub const DEFAULT_CMD_ID_OFFSET: u64 = 16;

/// Extra `[key, value]` entry attached to an announcement.
#[derive(Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct AnnounceParam {
    pub key: Bytes,
    pub value: Bytes,
}

/// Unsolicited notification that a peer's head moved.
#[derive(Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct Announce {
    pub head_hash: B256,
    pub head_number: BlockNumber,
    pub head_td: ChainScore,
    /// How many of the peer's previously announced headers were unwound.
    pub reorg_depth: u64,
    pub params: Vec<AnnounceParam>,
}

impl Announce {
    pub fn new(head: ChainHead, reorg_depth: u64) -> Self {
        Self {
            head_hash: head.hash,
            head_number: head.number,
            head_td: head.score,
            reorg_depth,
            params: Vec::new(),
        }
    }

    pub fn head(&self) -> ChainHead {
        ChainHead::new(self.head_hash, self.head_number, self.head_td)
    }
}

/// Which headers to return: `max_headers` headers starting at the anchor,
/// `skip` headers apart, walking towards genesis when `reverse` is set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct HeaderQuery {
    pub block_number_or_hash: HashOrNumber,
    pub max_headers: u64,
    pub skip: u64,
    pub reverse: bool,
}

impl HeaderQuery {
    /// Contiguous run of `max_headers` headers starting at `start`.
    pub fn forward(start: BlockNumber, max_headers: u64) -> Self {
        Self {
            block_number_or_hash: HashOrNumber::Number(start),
            max_headers,
            skip: 0,
            reverse: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct GetBlockHeaders {
    pub request_id: u64,
    pub query: HeaderQuery,
}

#[derive(Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct BlockHeaders {
    pub request_id: u64,
    /// Flow-control buffer the server reports; recorded, never enforced.
    pub buffer_value: u64,
    pub headers: Vec<BlockHeader>,
}

/// Every LES message this client understands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LesMessage {
    Status(Status),
    Announce(Announce),
    GetBlockHeaders(GetBlockHeaders),
    BlockHeaders(BlockHeaders),
}

impl LesMessage {
    /// Command id before the connection offset is applied.
    pub fn command_id(&self) -> u64 {
        match self {
            LesMessage::Status(_) => STATUS,
            LesMessage::Announce(_) => ANNOUNCE,
            LesMessage::GetBlockHeaders(_) => GET_BLOCK_HEADERS,
            LesMessage::BlockHeaders(_) => BLOCK_HEADERS,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LesMessage::Status(_) => "Status",
            LesMessage::Announce(_) => "Announce",
            LesMessage::GetBlockHeaders(_) => "GetBlockHeaders",
            LesMessage::BlockHeaders(_) => "BlockHeaders",
        }
    }
}
