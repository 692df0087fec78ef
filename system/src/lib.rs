pub extern crate bincode;
pub extern crate euclid;
pub extern crate serde;
pub extern crate serde_json;
pub extern crate uuid;

mod client_replica;
mod draw_command;
mod error;
pub mod legacy;
mod message;
mod snapshot;

pub use client_replica::*;
pub use draw_command::*;
pub use error::*;
pub use message::*;
pub use snapshot::*;
