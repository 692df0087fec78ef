pub extern crate actix_web;

mod admission;
pub mod config;
pub mod connection;
mod connection_tx_storage;
pub mod coordinator;
pub mod legacy;
pub mod roster;
pub mod server;
mod server_state;
pub mod session;
pub mod snapshot_file;
