//! Timeline unification
//!
//! Turns per-file parse results into one [`Session`](crate::types::Session):
//!
//! 1. [`correlate`] folds tool results into the calls they answer
//! 2. [`agent`] turns each file into an agent, discarding warmup runs
//! 3. [`hooks`] finds the lifecycle log written alongside the session
//! 4. [`builder`] attributes, merges and orders everything, then counts

pub mod agent;
pub mod builder;
pub mod correlate;
pub mod hooks;

pub use agent::{first_prompt, infer_role, is_boilerplate, is_warmup, BOILERPLATE_MARKERS};
pub use builder::SessionBuilder;
pub use correlate::{correlate, Correlated};
pub use hooks::{find_hook_log, is_error_detail, parse_hook_log, HookLogMatch, HOOK_EVENTS};
