pub mod access;
pub mod audit;
pub mod cli;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod logging;
pub mod remote;
pub mod service;
pub mod store;
