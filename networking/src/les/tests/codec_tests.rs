use std::io;

use alloy_primitives::{B256, U256};
use alloy_rlp::Encodable;
use containers::{ChainHead, HashOrNumber, Status};
use pretty_assertions::assert_eq;

use crate::les::codec::{DecodeError, FRAME_HEADER_LEN, LesCodec, frame_size};
use crate::les::commands::{
    Announce, AnnounceParam, BlockHeaders, GetBlockHeaders, HeaderQuery, LesMessage,
};
use crate::test_utils::{chain_store, extend_chain, genesis};

fn announce() -> LesMessage {
    LesMessage::Announce(Announce {
        head_hash: B256::repeat_byte(0xab),
        head_number: 100,
        head_td: U256::from(13_107_200u64),
        reorg_depth: 1,
        params: vec![AnnounceParam {
            key: b"serveHeaders".to_vec().into(),
            value: Default::default(),
        }],
    })
}

/// Frame carrying `payload` under a raw (already offset) command id.
fn raw_frame(cmd_id: u64, payload: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut body = Vec::new();
    cmd_id.encode(&mut body);
    body.extend_from_slice(payload);
    let size = body.len() as u32;
    let mut header = size.to_be_bytes()[1..].to_vec();
    header.extend_from_slice(&[0xc2, 0x80, 0x80]);
    header.resize(FRAME_HEADER_LEN, 0);
    (header, body)
}

#[test]
fn test_frame_header_layout() {
    let codec = LesCodec::default();
    let (header, body) = codec.encode(&announce()).unwrap();

    assert_eq!(header.len(), FRAME_HEADER_LEN);
    assert_eq!(&header[3..6], &[0xc2, 0x80, 0x80]);
    assert!(header[6..].iter().all(|byte| *byte == 0));
    assert_eq!(body.len() % 16, 0);

    let size = frame_size(&header).unwrap();
    assert!(size <= body.len() && body.len() - size < 16);
    // Announce is command 1, shifted past the 16 base protocol ids.
    assert_eq!(body[0], 0x11);
}

#[test]
fn test_get_block_headers_bytes() {
    let codec = LesCodec::default();
    let message = LesMessage::GetBlockHeaders(GetBlockHeaders {
        request_id: 7,
        query: HeaderQuery::forward(1, 20),
    });

    let (header, body) = codec.encode(&message).unwrap();

    assert_eq!(&header[..6], &[0x00, 0x00, 0x08, 0xc2, 0x80, 0x80]);
    assert_eq!(
        &body[..8],
        &[0x12, 0xc6, 0x07, 0xc4, 0x01, 0x14, 0x80, 0x80]
    );
    assert!(body[8..].iter().all(|byte| *byte == 0));
    assert_eq!(codec.decode(&header, &body).unwrap(), message);
}

#[test]
fn test_reverse_query_by_hash() {
    let codec = LesCodec::default();
    let hash = B256::repeat_byte(0x42);
    let message = LesMessage::GetBlockHeaders(GetBlockHeaders {
        request_id: 1,
        query: HeaderQuery {
            block_number_or_hash: HashOrNumber::Hash(hash),
            max_headers: 3,
            skip: 2,
            reverse: true,
        },
    });

    let (header, body) = codec.encode(&message).unwrap();
    let LesMessage::GetBlockHeaders(decoded) = codec.decode(&header, &body).unwrap() else {
        panic!("expected GetBlockHeaders");
    };

    assert_eq!(decoded.query.block_number_or_hash, HashOrNumber::Hash(hash));
    assert!(decoded.query.reverse);
    assert_eq!(decoded.query.skip, 2);
}

#[test]
fn test_block_headers_and_status_decode() {
    let codec = LesCodec::new(32);
    let (_, chain) = chain_store(3);
    let head = ChainHead::from_header(&chain[3], U256::from(4 * 131_072u64));
    let messages = vec![
        LesMessage::Status(Status::new(1, 3, head, genesis().hash())),
        LesMessage::BlockHeaders(BlockHeaders {
            request_id: 9,
            buffer_value: 300_000,
            headers: chain[1..].to_vec(),
        }),
    ];

    for message in messages {
        let (header, body) = codec.encode(&message).unwrap();
        assert_eq!(codec.decode(&header, &body).unwrap(), message);
    }
}

#[test]
fn test_offset_mismatch_is_unknown_command() {
    let (header, body) = LesCodec::new(16).encode(&announce()).unwrap();

    let err = LesCodec::new(32).decode(&header, &body).unwrap_err();

    assert!(matches!(
        err,
        DecodeError::UnknownCommand { cmd_id: 17, offset: 32 }
    ));
}

#[test]
fn test_unknown_command_id() {
    let (header, body) = raw_frame(16 + 9, &[0xc0]);

    let err = LesCodec::default().decode(&header, &body).unwrap_err();

    assert!(matches!(err, DecodeError::UnknownCommand { cmd_id: 25, .. }));
}

#[test]
fn test_trailing_bytes_rejected() {
    let mut payload = Vec::new();
    let LesMessage::Announce(announce) = announce() else {
        unreachable!()
    };
    announce.encode(&mut payload);
    payload.push(0x01);
    let (header, body) = raw_frame(17, &payload);

    let err = LesCodec::default().decode(&header, &body).unwrap_err();

    assert!(matches!(
        err,
        DecodeError::TrailingBytes { count: 1, command: "Announce" }
    ));
}

#[test]
fn test_malformed_payload_is_rlp_error() {
    // Announce expects a list.
    let (header, body) = raw_frame(17, &[0x05]);

    let err = LesCodec::default().decode(&header, &body).unwrap_err();

    assert!(matches!(err, DecodeError::Rlp(_)));
}

#[test]
fn test_short_header_and_body() {
    let codec = LesCodec::default();
    let (header, body) = codec.encode(&announce()).unwrap();

    assert!(matches!(
        codec.decode(&header[..10], &body),
        Err(DecodeError::BadHeader(10))
    ));
    assert!(matches!(
        codec.decode(&header, &body[..4]),
        Err(DecodeError::ShortBody { actual: 4, .. })
    ));
}

#[tokio::test]
async fn test_frames_over_a_stream() {
    let codec = LesCodec::default();
    let (mut client, mut server) = tokio::io::duplex(64 * 1024);
    let genesis = genesis();
    let headers = extend_chain(&genesis, 5, 10);
    let messages = vec![
        announce(),
        LesMessage::BlockHeaders(BlockHeaders {
            request_id: 1,
            buffer_value: 0,
            headers,
        }),
    ];

    for message in &messages {
        codec.write_message(&mut client, message).await.unwrap();
    }
    for message in messages {
        assert_eq!(codec.read_message(&mut server).await.unwrap(), message);
    }
}

#[tokio::test]
async fn test_garbage_frame_is_invalid_data() {
    use tokio::io::AsyncWriteExt;

    let (mut client, mut server) = tokio::io::duplex(1024);
    let (header, mut body) = raw_frame(17, &[0xff]);
    body.resize(16, 0);
    client.write_all(&header).await.unwrap();
    client.write_all(&body).await.unwrap();

    let err = LesCodec::default().read_message(&mut server).await.unwrap_err();

    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
}
