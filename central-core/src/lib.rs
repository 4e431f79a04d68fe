#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod credentials;
pub mod dispatch;
pub mod events;
pub mod github;
pub mod processors;
pub mod settle;
pub mod utils;
pub mod worker;
