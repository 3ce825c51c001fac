pub mod client;
pub mod config;
pub mod contracts;
pub mod errors;
pub mod metadata;
pub mod provider;
pub mod session;
pub mod store;
pub mod types;

#[cfg(test)]
mod test_utils;
