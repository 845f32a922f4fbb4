//! Zenoh bridge for Lambda heat pumps.
//!
//! Polls the heat pump's holding registers over Modbus TCP, decodes them
//! into physical values and publishes them as bus paths.
//!
//! # Key Expressions
//!
//! ```text
//! <key_prefix>/lambda_<NN>/<path>          published values
//! <key_prefix>/lambda_<NN>/@/set/<path>    external writes
//! <key_prefix>/@/status                    bridge status
//! ```
//!
//! Where `<NN>` is the zero-padded device instance and `<path>` a bus path
//! such as `Ac/Power` or `Ac/Energy/Forward`.

pub mod client;
pub mod config;
pub mod cycle;
pub mod decode;
pub mod format;
pub mod register;
pub mod scheduler;
pub mod service;
pub mod sink;
pub mod state;
pub mod store;
