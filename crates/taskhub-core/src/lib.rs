//! # Taskhub Core
//!
//! The admission-control domain of the Taskhub backend.
//! Policy tables, client identities and the sliding-window admission
//! controller live here, with zero HTTP or Redis dependencies.

pub mod admission;
pub mod domain;
pub mod error;
pub mod ports;

pub use admission::{AdmissionConfig, AdmissionController, RequestFacts};
pub use domain::{ClientIdentity, Decision, EndpointPolicy, LimiterKey, PolicyTable, RouteClass};
pub use error::PolicyError;
