//! Model specification and its encoding over data.
//!
//! 1. **Specification** ([`spec`]): outcome, terms and priors as plain data
//! 2. **Design** ([`design`]): reference coding, sufficient statistics,
//!    identifiability checks and prior autoscaling

pub mod design;
pub mod spec;

pub use design::{check_identifiable, DesignLayout, EncodedTerm, ResolvedPriors, SufficientStats};
pub use spec::{ModelSpec, ModelSpecBuilder, Prior, Term};
