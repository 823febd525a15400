pub mod block;
pub mod head;
pub mod status;
pub mod types;

pub use block::BlockHeader;
pub use head::ChainHead;
pub use status::Status;
pub use types::{BlockNumber, ChainScore, HashOrNumber, PeerId};

pub use alloy_primitives::{Address, B256, Bytes, U256};
pub use alloy_rlp as rlp;
