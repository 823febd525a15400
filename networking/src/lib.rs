pub mod les;
pub mod peer;
pub mod serde_utils;
pub mod sync;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;
