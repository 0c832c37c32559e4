//! Async raw-socket client for mobile hotspot router control endpoints.
//!
//! The router speaks a small CGI dialect (`/reqproc/proc_get`,
//! `/reqproc/proc_post`) over plain HTTP/1.1. This crate covers the wire:
//!
//! - **[`Transport`]**: one TCP connection per request, hand-built request
//!   text, read until the router closes, bounded by a timeout.
//! - **[`RawResponse`]** / [`decode_json`]: header/body split, cookie
//!   extraction, JSON decoding with embedded-object recovery.
//! - **[`parse_device_string`]**: order-independent decoding of the
//!   `sta_info<N>` slot strings, with MAC de-duplication.
//! - **[`SessionManager`]**: single-flight login holding the session cookie.
//! - **[`RouterClient`]**: per-endpoint calls and the concurrent poll batch.
//!
//! Domain modelling and metrics live in `mifimon-core`.

pub mod client;
pub mod device_string;
pub mod endpoints;
pub mod error;
pub mod models;
pub mod response;
pub mod session;
pub mod transport;

pub use client::{LATENCY_UNAVAILABLE, RouterClient};
pub use device_string::{RawDeviceRecord, dedupe_by_mac, parse_device_string, parse_link_time};
pub use error::Error;
pub use models::{
    DeviceListResponse, HostnameEntry, RawSystemStatus, RouterSnapshot, StationEntry,
};
pub use response::{RawResponse, decode_json, extract_body};
pub use session::{Credentials, SessionManager, SessionState};
pub use transport::{HttpRequest, Method, Transport, TransportConfig};
