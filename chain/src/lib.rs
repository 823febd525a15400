pub mod config;
pub mod memory;
pub mod store;

pub use config::{ChainConfig, MAINNET_CONFIG, ROPSTEN_CONFIG, mainnet_genesis, ropsten_genesis};
pub use memory::MemoryHeaderStore;
pub use store::{HeaderStore, PersistOutcome, StoreError};
