use crate::{BlockNumber, ChainHead, ChainScore};
use alloy_primitives::{B256, Bytes};
use alloy_rlp::{BufMut, Decodable, Encodable, Header};

const PROTOCOL_VERSION: &[u8] = b"protocolVersion";
const NETWORK_ID: &[u8] = b"networkId";
const HEAD_TD: &[u8] = b"headTd";
const HEAD_HASH: &[u8] = b"headHash";
const HEAD_NUM: &[u8] = b"headNum";
const GENESIS_HASH: &[u8] = b"genesisHash";

/// LES handshake message.
///
/// Encoded as a list of `[key, value]` pairs. Keys this node does not know
/// (flow control parameters, serve flags) are skipped when decoding.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Status {
    pub protocol_version: u32,
    pub network_id: u64,
    pub head_td: ChainScore,
    pub head_hash: B256,
    pub head_number: BlockNumber,
    pub genesis_hash: B256,
}

impl Status {
    pub fn new(protocol_version: u32, network_id: u64, head: ChainHead, genesis_hash: B256) -> Self {
        Self {
            protocol_version,
            network_id,
            head_td: head.score,
            head_hash: head.hash,
            head_number: head.number,
            genesis_hash,
        }
    }

    /// The head the remote side advertised.
    pub fn head(&self) -> ChainHead {
        ChainHead::new(self.head_hash, self.head_number, self.head_td)
    }

    fn payload_length(&self) -> usize {
        pair_length(PROTOCOL_VERSION, &self.protocol_version)
            + pair_length(NETWORK_ID, &self.network_id)
            + pair_length(HEAD_TD, &self.head_td)
            + pair_length(HEAD_HASH, &self.head_hash)
            + pair_length(HEAD_NUM, &self.head_number)
            + pair_length(GENESIS_HASH, &self.genesis_hash)
    }
}

fn pair_length<T: Encodable>(key: &[u8], value: &T) -> usize {
    let payload_length = key.length() + value.length();
    payload_length + alloy_rlp::length_of_length(payload_length)
}

fn encode_pair<T: Encodable>(key: &[u8], value: &T, out: &mut dyn BufMut) {
    Header {
        list: true,
        payload_length: key.length() + value.length(),
    }
    .encode(out);
    key.encode(out);
    value.encode(out);
}

impl Encodable for Status {
    fn encode(&self, out: &mut dyn BufMut) {
        Header {
            list: true,
            payload_length: self.payload_length(),
        }
        .encode(out);
        encode_pair(PROTOCOL_VERSION, &self.protocol_version, out);
        encode_pair(NETWORK_ID, &self.network_id, out);
        encode_pair(HEAD_TD, &self.head_td, out);
        encode_pair(HEAD_HASH, &self.head_hash, out);
        encode_pair(HEAD_NUM, &self.head_number, out);
        encode_pair(GENESIS_HASH, &self.genesis_hash, out);
    }

    fn length(&self) -> usize {
        let payload_length = self.payload_length();
        payload_length + alloy_rlp::length_of_length(payload_length)
    }
}

impl Decodable for Status {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let header = Header::decode(buf)?;
        if !header.list {
            return Err(alloy_rlp::Error::UnexpectedString);
        }
        if buf.len() < header.payload_length {
            return Err(alloy_rlp::Error::InputTooShort);
        }
        let (mut payload, rest) = buf.split_at(header.payload_length);

        let mut protocol_version = None;
        let mut network_id = None;
        let mut head_td = None;
        let mut head_hash = None;
        let mut head_number = None;
        let mut genesis_hash = None;

        while !payload.is_empty() {
            let pair = Header::decode(&mut payload)?;
            if !pair.list {
                return Err(alloy_rlp::Error::UnexpectedString);
            }
            if payload.len() < pair.payload_length {
                return Err(alloy_rlp::Error::InputTooShort);
            }
            let (mut item, remaining) = payload.split_at(pair.payload_length);
            payload = remaining;

            let key = Bytes::decode(&mut item)?;
            match key.as_ref() {
                PROTOCOL_VERSION => protocol_version = Some(u32::decode(&mut item)?),
                NETWORK_ID => network_id = Some(u64::decode(&mut item)?),
                HEAD_TD => head_td = Some(ChainScore::decode(&mut item)?),
                HEAD_HASH => head_hash = Some(B256::decode(&mut item)?),
                HEAD_NUM => head_number = Some(BlockNumber::decode(&mut item)?),
                GENESIS_HASH => genesis_hash = Some(B256::decode(&mut item)?),
                _ => {}
            }
        }

        *buf = rest;

        Ok(Self {
            protocol_version: protocol_version
                .ok_or(alloy_rlp::Error::Custom("status: missing protocolVersion"))?,
            network_id: network_id.ok_or(alloy_rlp::Error::Custom("status: missing networkId"))?,
            head_td: head_td.ok_or(alloy_rlp::Error::Custom("status: missing headTd"))?,
            head_hash: head_hash.ok_or(alloy_rlp::Error::Custom("status: missing headHash"))?,
            head_number: head_number.ok_or(alloy_rlp::Error::Custom("status: missing headNum"))?,
            genesis_hash: genesis_hash
                .ok_or(alloy_rlp::Error::Custom("status: missing genesisHash"))?,
        })
    }
}
