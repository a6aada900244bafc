//! Domain types - the vocabulary of admission control.

mod decision;
mod identity;
mod policy;

pub use decision::{Decision, QuotaHeaders};
pub use identity::{ClientIdentity, LimiterKey, UNKNOWN_CLIENT};
pub use policy::{EndpointPolicy, PolicyTable, PolicyTableBuilder, RouteClass, normalize_path};
