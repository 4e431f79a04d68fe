pub mod jwt;
pub mod objects;

#[cfg(feature = "client")]
pub mod client;
