use alloy_primitives::{B256, B512, U256};
use alloy_rlp::{BufMut, Decodable, Encodable, Header};
use hex::FromHex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type BlockNumber = u64;

/// Cumulative difficulty of the chain ending at a header.
pub type ChainScore = U256;

/// Identity of a remote node: its 64-byte uncompressed secp256k1 public key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct PeerId(pub B512);

impl PeerId {
    pub fn random() -> Self {
        let mut bytes = [0u8; 64];
        rand::thread_rng().fill(&mut bytes[..]);
        PeerId(B512::from(bytes))
    }
}

impl FromStr for PeerId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes: [u8; 64] = <[u8; 64]>::from_hex(s)?;
        Ok(PeerId(B512::from(bytes)))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form, enough to tell peers apart in logs.
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

/// Anchor of a header query: a 32-byte hash or a block number.
///
/// On the wire a 32-byte string is a hash, anything else is an integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HashOrNumber {
    Hash(B256),
    Number(BlockNumber),
}

impl From<B256> for HashOrNumber {
    fn from(hash: B256) -> Self {
        HashOrNumber::Hash(hash)
    }
}

impl From<BlockNumber> for HashOrNumber {
    fn from(number: BlockNumber) -> Self {
        HashOrNumber::Number(number)
    }
}

impl Encodable for HashOrNumber {
    fn encode(&self, out: &mut dyn BufMut) {
        match self {
            HashOrNumber::Hash(hash) => hash.encode(out),
            HashOrNumber::Number(number) => number.encode(out),
        }
    }

    fn length(&self) -> usize {
        match self {
            HashOrNumber::Hash(hash) => hash.length(),
            HashOrNumber::Number(number) => number.length(),
        }
    }
}

impl Decodable for HashOrNumber {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let mut peek = *buf;
        let header = Header::decode(&mut peek)?;
        if header.list {
            return Err(alloy_rlp::Error::UnexpectedList);
        }

        if header.payload_length == 32 {
            Ok(HashOrNumber::Hash(B256::decode(buf)?))
        } else {
            Ok(HashOrNumber::Number(u64::decode(buf)?))
        }
    }
}

impl fmt::Display for HashOrNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashOrNumber::Hash(hash) => write!(f, "{hash}"),
            HashOrNumber::Number(number) => write!(f, "#{number}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_roundtrips_through_hex() {
        let peer = PeerId::random();
        let parsed: PeerId = alloy_primitives::hex::encode(peer.0).parse().unwrap();
        assert_eq!(parsed, peer);
    }

    #[test]
    fn test_hash_or_number_wire_form() {
        let mut out = Vec::new();
        HashOrNumber::Number(0).encode(&mut out);
        assert_eq!(out, vec![0x80]);

        let mut out = Vec::new();
        HashOrNumber::Number(1024).encode(&mut out);
        assert_eq!(out, vec![0x82, 0x04, 0x00]);

        let mut out = Vec::new();
        HashOrNumber::Hash(B256::repeat_byte(0xab)).encode(&mut out);
        assert_eq!(out.len(), 33);
        assert_eq!(out[0], 0xa0);
    }

    #[test]
    fn test_hash_or_number_decode_by_length() {
        let hash = B256::repeat_byte(7);
        let encoded = alloy_rlp::encode(hash);
        assert_eq!(
            HashOrNumber::decode(&mut encoded.as_slice()).unwrap(),
            HashOrNumber::Hash(hash)
        );

        let encoded = alloy_rlp::encode(100u64);
        assert_eq!(
            HashOrNumber::decode(&mut encoded.as_slice()).unwrap(),
            HashOrNumber::Number(100)
        );
    }
}
