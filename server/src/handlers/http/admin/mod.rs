pub mod audit;

pub use audit::{handle_audit_log, require_role};
