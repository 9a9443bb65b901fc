#![no_std]

pub mod config;
pub mod display;
pub mod hardware;
pub mod model;
pub mod net;
pub mod request;
pub mod server;
pub mod traits;

extern crate alloc;
