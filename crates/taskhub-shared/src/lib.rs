//! # Taskhub Shared
//!
//! Wire types shared between the API server and its clients.

pub mod dto;
pub mod headers;
pub mod response;

pub use response::{DetailResponse, ErrorResponse};
