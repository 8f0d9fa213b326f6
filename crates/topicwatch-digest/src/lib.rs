//! Digest emails: eligibility and frequency, composition, transport, and
//! the per-run cycle.

pub mod compose;
mod cycle;
pub mod eligibility;
mod error;
pub mod sender;

pub use compose::{compose_digest, ComposedDigest};
pub use cycle::{parse_user_ids, run_digest_cycle, DigestOptions, DigestReport, SkippedUser};
pub use eligibility::{evaluate, is_eligible, next_digest_date, DigestDecision};
pub use error::DigestError;
pub use sender::{BrevoSender, EmailSender, LogSender};
