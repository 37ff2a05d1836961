// src/lib.rs

pub mod cli;
pub mod config;
pub mod connection;
pub mod core;
pub mod server;
