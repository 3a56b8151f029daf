#![forbid(unsafe_code)]

//! Text command front end for the manna ledger: configuration, command
//! parsing, reply rendering and an interactive console.

pub mod command;
pub mod config;
pub mod console;
pub mod dispatch;

pub use command::{parse, BuyItem, Command, ParseError};
pub use config::BotConfig;
pub use dispatch::{Dispatcher, Reply};
