//! JWT issuance/validation, RBAC, signed genome constraints, and sandbox
//! path/command policy.

mod canonical;
mod constraints;
mod jwt;
mod rbac;
mod sandbox;
mod signing;

pub use canonical::canonical_bytes;
pub use constraints::GenomeConstraints;
pub use jwt::{dev_mode_claims, generate_token, validate_token, Claims};
pub use rbac::{is_authorized, Role};
pub use sandbox::{AutonomyLevel, SandboxPolicy, FORBIDDEN_PATH_PREFIXES};
pub use signing::{sign_constraints, verify_constraints};
