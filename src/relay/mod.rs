//! Media relay: one bidirectional streaming session per live call.
//!
//! Each session pumps caller audio from the telephony transport into the
//! conversation engine and synthesized speech back out, recording every
//! spoken turn as an interaction. Sessions run as independent tasks; the
//! [`SessionRegistry`] is the only structure they share.

pub mod chunker;
pub mod registry;
pub mod session;

pub use chunker::{BoundaryPolicy, PunctuationBoundary, SentenceChunker};
pub use registry::{SessionHandle, SessionRegistry};
pub use session::{RelaySession, RelaySessionParams, RelayState};
