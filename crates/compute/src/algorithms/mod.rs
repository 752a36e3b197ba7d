//! Hand-written learning algorithms used by the scorer and the policy.

pub mod isolation_forest;
pub mod linear_q;
