//! Host telemetry and USB/IP peripheral sampling for the uipm dashboard.

pub mod config;
pub mod error;
pub mod exec;
pub mod interfaces;
pub mod metrics;
pub mod network;
pub mod routes;
pub mod state;
pub mod types;
pub mod usb;
pub mod wifi;
