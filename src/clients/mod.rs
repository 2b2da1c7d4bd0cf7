//! Outbound integrations: distributor credential exchange and catalog API,
//! payment processor checkout sessions.

pub mod credentials;
pub mod distributor;
pub mod payments;
