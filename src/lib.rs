pub mod config;
pub mod connection;
pub mod console;
pub mod dispatcher;
pub mod display;
pub mod orders;
pub mod paper;
pub mod portfolio;
pub mod risk;
pub mod security_types;
pub mod tpsl_setter;
#[cfg(feature = "tws")]
pub mod tws;
