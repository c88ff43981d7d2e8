//! Wire protocol for the single streaming control channel (§4.6 of the
//! memory-tier design): a tagged JSON message per frame, correlated by
//! `uid`, dispatched to a typed variant instead of ad-hoc dict access.

mod client;
mod server;

pub use client::{ChatTurn, ClientMessage, Role};
pub use server::ServerMessage;
