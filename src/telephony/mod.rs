//! Telephony transport wire contract.
//!
//! Covers the three surfaces the core interoperates with at the wire level:
//! the persistent duplex media stream ([`stream`]), one-shot status
//! callbacks ([`status`]), and the REST call that places the outbound dial
//! ([`dialer`]). Vendor quirks beyond these contracts are out of scope.

pub mod dialer;
pub mod signature;
pub mod status;
pub mod stream;

pub use dialer::{DialRequest, Dialer, DialerError, DialerResult, HttpDialer};
pub use signature::verify_signature;
pub use status::{StatusCallback, TransportCallStatus};
pub use stream::{StreamCommand, StreamEvent};
