//! Call lifecycle state machine.
//!
//! Transport status notifications arrive asynchronously and possibly out of
//! order; `apply` folds them into well-ordered lifecycle transitions. It is
//! a pure function over (call, event, now): no side effects, no clock reads,
//! which keeps every ordering scenario unit-testable.
//!
//! Rules:
//! - status only moves forward along `Scheduled -> Ringing -> InProgress ->
//!   {Completed, Failed}`; an event ranked at or behind the current status
//!   is ignored rather than regressing the call;
//! - duplicate terminal events are no-ops (duration is never recomputed
//!   from a stale timestamp);
//! - answering-machine detection is a side branch: at Ringing or later (but
//!   not after a terminal state) it sets `outcome = Voicemail` without
//!   touching the status path, and that outcome survives a later
//!   `Completed` event.

use chrono::{DateTime, Utc};

use super::types::{Call, CallOutcome, CallStatus};

/// Recording metadata carried by a completion callback.
#[derive(Debug, Clone, Default)]
pub struct RecordingInfo {
    pub url: Option<String>,
    pub duration_secs: Option<u32>,
}

/// A lifecycle event, translated from a transport status callback or raised
/// internally by the media relay.
#[derive(Debug, Clone)]
pub enum CallEvent {
    /// Far end is ringing
    Ringing,
    /// Call was answered
    Answered,
    /// Call ran to completion. The transport may report its own measured
    /// duration; if absent, duration is derived from the timestamps.
    Completed {
        duration_secs: Option<u32>,
        recording: RecordingInfo,
    },
    /// Terminal transport failures, mapped 1:1 to outcomes
    Busy,
    NoAnswer,
    TransportFailed,
    /// The media relay lost the session (engine or synthesis failure)
    RelayFailed,
    /// Answering machine detected; outcome side branch
    VoicemailDetected,
}

/// Result of applying an event to a call.
#[derive(Debug, Clone)]
pub struct Transition {
    /// The call after the event. Identical to the input when `changed` is
    /// false.
    pub call: Call,
    /// Whether anything was mutated (false for ignored events)
    pub changed: bool,
    /// Whether this event moved the call into a terminal status
    pub reached_terminal: bool,
}

impl Transition {
    fn ignored(call: &Call) -> Self {
        Self {
            call: call.clone(),
            changed: false,
            reached_terminal: false,
        }
    }
}

/// Apply one lifecycle event to a call.
///
/// `now` is injected so ordering scenarios can be tested deterministically.
pub fn apply(call: &Call, event: &CallEvent, now: DateTime<Utc>) -> Transition {
    // Terminal states absorb everything, including late AMD signals.
    if call.status.is_terminal() {
        return Transition::ignored(call);
    }

    match event {
        CallEvent::VoicemailDetected => {
            // Only meaningful once the call has at least started ringing.
            if call.status.rank() < CallStatus::Ringing.rank() {
                return Transition::ignored(call);
            }
            if call.outcome == Some(CallOutcome::Voicemail) {
                return Transition::ignored(call);
            }
            let mut next = call.clone();
            next.outcome = Some(CallOutcome::Voicemail);
            Transition {
                call: next,
                changed: true,
                reached_terminal: false,
            }
        }

        CallEvent::Ringing => advance(call, CallStatus::Ringing, |_| {}),

        CallEvent::Answered => advance(call, CallStatus::InProgress, |next| {
            if next.started_at.is_none() {
                next.started_at = Some(now);
            }
        }),

        CallEvent::Completed {
            duration_secs,
            recording,
        } => advance(call, CallStatus::Completed, |next| {
            finish(next, now);
            if let Some(d) = duration_secs {
                next.duration_secs = Some(*d);
            }
            if recording.url.is_some() {
                next.recording_url = recording.url.clone();
            }
            if recording.duration_secs.is_some() {
                next.recording_duration_secs = recording.duration_secs;
            }
            // A voicemail outcome set by AMD is stickier than the generic
            // completion class; leave it in place.
        }),

        CallEvent::Busy => fail(call, CallOutcome::Busy, now),
        CallEvent::NoAnswer => fail(call, CallOutcome::NoAnswer, now),
        CallEvent::TransportFailed => fail(call, CallOutcome::Failed, now),
        CallEvent::RelayFailed => fail(call, CallOutcome::Failed, now),
    }
}

/// Move the call to `target` if that is strictly forward; otherwise ignore.
fn advance(call: &Call, target: CallStatus, mutate: impl FnOnce(&mut Call)) -> Transition {
    if target.rank() <= call.status.rank() {
        return Transition::ignored(call);
    }
    let mut next = call.clone();
    next.status = target;
    mutate(&mut next);
    Transition {
        reached_terminal: target.is_terminal(),
        call: next,
        changed: true,
    }
}

fn fail(call: &Call, outcome: CallOutcome, now: DateTime<Utc>) -> Transition {
    advance(call, CallStatus::Failed, |next| {
        finish(next, now);
        // AMD wins here too: a voicemail call dropped by the transport
        // still reads as voicemail.
        if next.outcome.is_none() {
            next.outcome = Some(outcome);
        }
    })
}

/// Stamp `ended_at` and derive duration: seconds between answer and end,
/// zero if the call was never answered.
fn finish(next: &mut Call, now: DateTime<Utc>) {
    next.ended_at = Some(now);
    next.duration_secs = Some(match next.started_at {
        Some(started) => (now - started).num_seconds().max(0) as u32,
        None => 0,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn call() -> Call {
        Call::new(Uuid::new_v4(), None)
    }

    fn completed() -> CallEvent {
        CallEvent::Completed {
            duration_secs: None,
            recording: RecordingInfo::default(),
        }
    }

    fn run(call: &Call, events: &[(CallEvent, DateTime<Utc>)]) -> Call {
        let mut current = call.clone();
        for (event, at) in events {
            current = apply(&current, event, *at).call;
        }
        current
    }

    #[test]
    fn test_happy_path() {
        let t0 = Utc::now();
        let result = run(
            &call(),
            &[
                (CallEvent::Ringing, t0),
                (CallEvent::Answered, t0 + Duration::seconds(5)),
                (completed(), t0 + Duration::seconds(65)),
            ],
        );
        assert_eq!(result.status, CallStatus::Completed);
        assert_eq!(result.duration_secs, Some(60));
        assert!(result.started_at.is_some());
        assert!(result.ended_at.is_some());
    }

    #[test]
    fn test_duplicate_completed_is_noop() {
        let t0 = Utc::now();
        let sequence = run(
            &call(),
            &[
                (CallEvent::Ringing, t0),
                (CallEvent::Answered, t0 + Duration::seconds(1)),
                (completed(), t0 + Duration::seconds(31)),
            ],
        );

        // A second completed callback with a much later (stale-processing)
        // timestamp must not recompute anything.
        let again = apply(&sequence, &completed(), t0 + Duration::seconds(600));
        assert!(!again.changed);
        assert_eq!(again.call.duration_secs, Some(30));
        assert_eq!(again.call.ended_at, sequence.ended_at);
    }

    #[test]
    fn test_out_of_order_ringing_after_completed_ignored() {
        let t0 = Utc::now();
        let done = run(
            &call(),
            &[
                (CallEvent::Answered, t0),
                (completed(), t0 + Duration::seconds(10)),
            ],
        );
        assert_eq!(done.status, CallStatus::Completed);

        let late = apply(&done, &CallEvent::Ringing, t0 + Duration::seconds(11));
        assert!(!late.changed);
        assert_eq!(late.call.status, CallStatus::Completed);
    }

    #[test]
    fn test_ringing_after_answered_ignored() {
        let t0 = Utc::now();
        let answered = run(
            &call(),
            &[(CallEvent::Ringing, t0), (CallEvent::Answered, t0)],
        );
        let result = apply(&answered, &CallEvent::Ringing, t0);
        assert!(!result.changed);
        assert_eq!(result.call.status, CallStatus::InProgress);
    }

    #[test]
    fn test_answered_can_skip_ringing() {
        let t0 = Utc::now();
        let result = apply(&call(), &CallEvent::Answered, t0);
        assert!(result.changed);
        assert_eq!(result.call.status, CallStatus::InProgress);
        assert_eq!(result.call.started_at, Some(t0));
    }

    #[test]
    fn test_completed_without_answer_has_zero_duration() {
        let t0 = Utc::now();
        let result = apply(&call(), &completed(), t0);
        assert_eq!(result.call.status, CallStatus::Completed);
        assert_eq!(result.call.duration_secs, Some(0));
        assert!(result.call.started_at.is_none());
    }

    #[test]
    fn test_transport_duration_overrides_derived() {
        let t0 = Utc::now();
        let answered = apply(&call(), &CallEvent::Answered, t0).call;
        let result = apply(
            &answered,
            &CallEvent::Completed {
                duration_secs: Some(42),
                recording: RecordingInfo::default(),
            },
            t0 + Duration::seconds(100),
        );
        assert_eq!(result.call.duration_secs, Some(42));
    }

    #[test]
    fn test_failure_outcome_mapping() {
        let t0 = Utc::now();
        for (event, outcome) in [
            (CallEvent::Busy, CallOutcome::Busy),
            (CallEvent::NoAnswer, CallOutcome::NoAnswer),
            (CallEvent::TransportFailed, CallOutcome::Failed),
            (CallEvent::RelayFailed, CallOutcome::Failed),
        ] {
            let ringing = apply(&call(), &CallEvent::Ringing, t0).call;
            let result = apply(&ringing, &event, t0);
            assert_eq!(result.call.status, CallStatus::Failed);
            assert_eq!(result.call.outcome, Some(outcome));
            assert!(result.reached_terminal);
        }
    }

    #[test]
    fn test_voicemail_requires_ringing() {
        let t0 = Utc::now();
        let result = apply(&call(), &CallEvent::VoicemailDetected, t0);
        assert!(!result.changed);
        assert!(result.call.outcome.is_none());
    }

    #[test]
    fn test_voicemail_does_not_alter_status_path() {
        let t0 = Utc::now();
        let ringing = apply(&call(), &CallEvent::Ringing, t0).call;
        let amd = apply(&ringing, &CallEvent::VoicemailDetected, t0);
        assert!(amd.changed);
        assert_eq!(amd.call.status, CallStatus::Ringing);
        assert_eq!(amd.call.outcome, Some(CallOutcome::Voicemail));
        assert!(!amd.reached_terminal);
    }

    #[test]
    fn test_voicemail_outcome_survives_completion() {
        let t0 = Utc::now();
        let result = run(
            &call(),
            &[
                (CallEvent::Ringing, t0),
                (CallEvent::VoicemailDetected, t0),
                (CallEvent::Answered, t0 + Duration::seconds(2)),
                (completed(), t0 + Duration::seconds(20)),
            ],
        );
        assert_eq!(result.status, CallStatus::Completed);
        assert_eq!(result.outcome, Some(CallOutcome::Voicemail));
        assert_eq!(result.duration_secs, Some(18));
    }

    #[test]
    fn test_voicemail_outcome_survives_transport_failure() {
        let t0 = Utc::now();
        let result = run(
            &call(),
            &[
                (CallEvent::Ringing, t0),
                (CallEvent::VoicemailDetected, t0),
                (CallEvent::TransportFailed, t0 + Duration::seconds(3)),
            ],
        );
        assert_eq!(result.status, CallStatus::Failed);
        assert_eq!(result.outcome, Some(CallOutcome::Voicemail));
    }

    #[test]
    fn test_amd_after_terminal_ignored() {
        let t0 = Utc::now();
        let done = run(&call(), &[(CallEvent::Answered, t0), (completed(), t0)]);
        let late = apply(&done, &CallEvent::VoicemailDetected, t0);
        assert!(!late.changed);
        assert!(late.call.outcome.is_none());
    }

    #[test]
    fn test_recording_fields_stamped_on_completion() {
        let t0 = Utc::now();
        let result = apply(
            &call(),
            &CallEvent::Completed {
                duration_secs: Some(12),
                recording: RecordingInfo {
                    url: Some("https://recordings.example/abc.wav".to_string()),
                    duration_secs: Some(11),
                },
            },
            t0,
        );
        assert_eq!(
            result.call.recording_url.as_deref(),
            Some("https://recordings.example/abc.wav")
        );
        assert_eq!(result.call.recording_duration_secs, Some(11));
    }

    #[test]
    fn test_idempotence_sequences_match() {
        // [ringing, answered, completed, completed] equals
        // [ringing, answered, completed].
        let t0 = Utc::now();
        let base = call();
        let shorter = run(
            &base,
            &[
                (CallEvent::Ringing, t0),
                (CallEvent::Answered, t0 + Duration::seconds(2)),
                (completed(), t0 + Duration::seconds(32)),
            ],
        );
        let longer = run(
            &base,
            &[
                (CallEvent::Ringing, t0),
                (CallEvent::Answered, t0 + Duration::seconds(2)),
                (completed(), t0 + Duration::seconds(32)),
                (completed(), t0 + Duration::seconds(90)),
            ],
        );

        assert_eq!(shorter.status, longer.status);
        assert_eq!(shorter.duration_secs, longer.duration_secs);
        assert_eq!(shorter.ended_at, longer.ended_at);
        assert_eq!(shorter.outcome, longer.outcome);
    }
}
