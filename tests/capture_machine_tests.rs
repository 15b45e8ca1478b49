// State machine tests
//
// These drive `CaptureMachine` directly with engine events and check the
// effects it asks the driver to perform. No engine, no clock.

use speech_capture::capture::{CaptureMachine, Effect, Input};
use speech_capture::{
    CaptureError, CaptureEvent, CaptureState, EngineErrorKind, RecognitionEvent, RetryPolicy,
};
use std::time::Duration;

fn machine(continuous: bool) -> CaptureMachine {
    CaptureMachine::new(continuous, RetryPolicy::default())
}

fn engine(machine: &mut CaptureMachine, event: RecognitionEvent) -> Vec<Effect> {
    machine.handle(Input::Engine(event))
}

fn error(machine: &mut CaptureMachine, kind: EngineErrorKind) -> Vec<Effect> {
    engine(machine, RecognitionEvent::Error(kind))
}

fn notifications(effects: &[Effect]) -> Vec<CaptureEvent> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Notify(event) => Some(event.clone()),
            _ => None,
        })
        .collect()
}

fn final_text(text: &str) -> RecognitionEvent {
    RecognitionEvent::FinalText(text.to_string())
}

/// Run one full restart cycle: `RestartDue` then `Started`
fn restart(machine: &mut CaptureMachine) {
    assert_eq!(machine.handle(Input::RestartDue), vec![Effect::LaunchEngine]);
    engine(machine, RecognitionEvent::Started);
}

#[test]
fn test_begin_launches_engine() {
    let mut m = machine(false);

    assert_eq!(m.state(), CaptureState::Idle);
    assert_eq!(m.begin(), vec![Effect::LaunchEngine]);
    assert_eq!(m.state(), CaptureState::Starting);
    assert!(!m.is_active());

    let effects = engine(&mut m, RecognitionEvent::Started);
    assert_eq!(notifications(&effects), vec![CaptureEvent::Started]);
    assert_eq!(m.state(), CaptureState::Listening);
    assert!(m.is_active());
}

#[test]
fn test_begin_while_running_is_rejected() {
    let mut m = machine(false);
    m.begin();

    assert!(m.begin().is_empty());
    assert_eq!(m.state(), CaptureState::Starting);
}

#[test]
fn test_on_start_fires_once_across_restarts() {
    let mut m = machine(false);
    m.begin();

    let mut started = notifications(&engine(&mut m, RecognitionEvent::Started));
    for _ in 0..5 {
        engine(&mut m, RecognitionEvent::Ended);
        assert_eq!(m.handle(Input::RestartDue), vec![Effect::LaunchEngine]);
        started.extend(notifications(&engine(&mut m, RecognitionEvent::Started)));
    }

    assert_eq!(started, vec![CaptureEvent::Started]);
    assert_eq!(m.session().unwrap().restarts, 5);
}

#[test]
fn test_natural_end_schedules_short_restart() {
    let mut m = machine(false);
    m.begin();
    engine(&mut m, RecognitionEvent::Started);

    let effects = engine(&mut m, RecognitionEvent::Ended);
    assert_eq!(
        effects,
        vec![
            Effect::ReleaseEngine,
            Effect::ScheduleRestart(Duration::from_millis(300)),
        ]
    );
    assert_eq!(m.state(), CaptureState::RestartScheduled);
    assert!(!m.is_active());
}

#[test]
fn test_no_speech_schedules_restart_after_engine_ends() {
    let mut m = machine(false);
    m.begin();
    engine(&mut m, RecognitionEvent::Started);

    assert_eq!(
        error(&mut m, EngineErrorKind::NoSpeech),
        vec![Effect::AbortEngine]
    );
    assert_eq!(m.state(), CaptureState::Listening);

    // The aborted engine reports `aborted` before it ends
    assert!(error(&mut m, EngineErrorKind::Aborted).is_empty());

    let effects = engine(&mut m, RecognitionEvent::Ended);
    assert!(effects.contains(&Effect::ScheduleRestart(Duration::from_millis(500))));
}

#[test]
fn test_repeated_recoverable_errors_abort_once() {
    let mut m = machine(false);
    m.begin();
    engine(&mut m, RecognitionEvent::Started);

    assert_eq!(
        error(&mut m, EngineErrorKind::Network),
        vec![Effect::AbortEngine]
    );
    assert!(error(&mut m, EngineErrorKind::NoSpeech).is_empty());

    let effects = engine(&mut m, RecognitionEvent::Ended);
    assert!(effects.contains(&Effect::ScheduleRestart(Duration::from_millis(500))));
    assert_eq!(m.session().unwrap().network_failure_count, 1);
}

#[test]
fn test_terminal_error_before_started() {
    let mut m = machine(false);
    m.begin();

    let effects = error(&mut m, EngineErrorKind::NotAllowed);
    assert_eq!(effects, vec![Effect::AbortEngine]);
    assert_eq!(m.state(), CaptureState::Stopping);

    let effects = engine(&mut m, RecognitionEvent::Ended);
    assert_eq!(
        notifications(&effects),
        vec![CaptureEvent::Error(CaptureError::PermissionDenied)]
    );
    assert_eq!(m.state(), CaptureState::Stopped);
    assert!(!m.session().unwrap().start_notified);
}

#[test]
fn test_continuous_mode_ends_on_natural_end() {
    let mut m = machine(true);
    m.begin();
    assert!(m.session().unwrap().continuous_mode);
    engine(&mut m, RecognitionEvent::Started);
    engine(&mut m, final_text("tamam"));

    let effects = engine(&mut m, RecognitionEvent::Ended);
    assert_eq!(
        notifications(&effects),
        vec![CaptureEvent::Ended("tamam ".to_string())]
    );
    assert_eq!(m.state(), CaptureState::Stopped);
}

#[test]
fn test_continuous_mode_still_restarts_after_no_speech() {
    let mut m = machine(true);
    m.begin();
    engine(&mut m, RecognitionEvent::Started);
    error(&mut m, EngineErrorKind::NoSpeech);

    let effects = engine(&mut m, RecognitionEvent::Ended);
    assert!(effects.contains(&Effect::ScheduleRestart(Duration::from_millis(500))));
    assert_eq!(m.state(), CaptureState::RestartScheduled);
}

#[test]
fn test_recoverable_cycles_never_notify_end_or_error() {
    let mut m = machine(false);
    m.begin();
    engine(&mut m, RecognitionEvent::Started);

    let mut seen = Vec::new();
    for i in 0..20 {
        if i % 2 == 0 {
            seen.extend(notifications(&error(&mut m, EngineErrorKind::NoSpeech)));
        }
        seen.extend(notifications(&engine(&mut m, RecognitionEvent::Ended)));
        restart(&mut m);
    }

    assert!(seen
        .iter()
        .all(|event| !matches!(event, CaptureEvent::Ended(_) | CaptureEvent::Error(_))));
    assert_eq!(m.state(), CaptureState::Listening);
}

#[test]
fn test_network_backoff_grows_then_gives_up() {
    let mut m = machine(false);
    m.begin();
    engine(&mut m, RecognitionEvent::Started);

    error(&mut m, EngineErrorKind::Network);
    let effects = engine(&mut m, RecognitionEvent::Ended);
    assert!(effects.contains(&Effect::ScheduleRestart(Duration::from_millis(1000))));
    restart(&mut m);

    error(&mut m, EngineErrorKind::Network);
    let effects = engine(&mut m, RecognitionEvent::Ended);
    assert!(effects.contains(&Effect::ScheduleRestart(Duration::from_millis(2000))));
    restart(&mut m);

    let effects = error(&mut m, EngineErrorKind::Network);
    assert_eq!(effects, vec![Effect::AbortEngine]);
    assert_eq!(m.state(), CaptureState::Stopping);

    let effects = engine(&mut m, RecognitionEvent::Ended);
    assert_eq!(
        notifications(&effects),
        vec![CaptureEvent::Error(CaptureError::NetworkExhausted(3))]
    );
    assert_eq!(m.state(), CaptureState::Stopped);
    assert!(m.handle(Input::RestartDue).is_empty());
}

#[test]
fn test_recognised_text_resets_network_failures() {
    let mut m = machine(false);
    m.begin();
    engine(&mut m, RecognitionEvent::Started);

    for _ in 0..2 {
        error(&mut m, EngineErrorKind::Network);
        engine(&mut m, RecognitionEvent::Ended);
        restart(&mut m);
    }
    engine(&mut m, RecognitionEvent::PartialText("iy".to_string()));
    assert_eq!(m.session().unwrap().network_failure_count, 0);

    error(&mut m, EngineErrorKind::Network);
    let effects = engine(&mut m, RecognitionEvent::Ended);
    assert!(effects.contains(&Effect::ScheduleRestart(Duration::from_millis(1000))));
}

#[test]
fn test_permission_errors_are_terminal() {
    for (kind, expected) in [
        (EngineErrorKind::NotAllowed, CaptureError::PermissionDenied),
        (EngineErrorKind::ServiceNotAllowed, CaptureError::ServiceUnavailable),
        (
            EngineErrorKind::AudioCapture,
            CaptureError::Engine("audio-capture".to_string()),
        ),
    ] {
        let mut m = machine(false);
        m.begin();
        engine(&mut m, RecognitionEvent::Started);

        assert_eq!(error(&mut m, kind), vec![Effect::AbortEngine]);
        let effects = engine(&mut m, RecognitionEvent::Ended);

        assert_eq!(notifications(&effects), vec![CaptureEvent::Error(expected)]);
        assert!(!effects
            .iter()
            .any(|effect| matches!(effect, Effect::ScheduleRestart(_))));
    }
}

#[test]
fn test_aborted_is_ignored() {
    let mut m = machine(false);
    m.begin();
    engine(&mut m, RecognitionEvent::Started);

    assert!(error(&mut m, EngineErrorKind::Aborted).is_empty());
    assert_eq!(m.state(), CaptureState::Listening);
}

#[test]
fn test_interim_text_is_not_accumulated() {
    let mut m = machine(false);
    m.begin();
    engine(&mut m, RecognitionEvent::Started);

    let effects = engine(&mut m, RecognitionEvent::PartialText("Merha".to_string()));
    assert_eq!(
        notifications(&effects),
        vec![CaptureEvent::Result {
            text: "Merha".to_string(),
            is_interim: true,
        }]
    );

    let effects = engine(&mut m, final_text("Merhaba"));
    assert_eq!(
        notifications(&effects),
        vec![CaptureEvent::Result {
            text: "Merhaba ".to_string(),
            is_interim: false,
        }]
    );

    let effects = engine(&mut m, RecognitionEvent::PartialText("nas".to_string()));
    assert_eq!(
        notifications(&effects),
        vec![CaptureEvent::Result {
            text: "Merhaba nas".to_string(),
            is_interim: true,
        }]
    );
    assert_eq!(m.session().unwrap().accumulated_text, "Merhaba ");
}

#[test]
fn test_stop_while_listening_waits_for_engine() {
    let mut m = machine(false);
    m.begin();
    engine(&mut m, RecognitionEvent::Started);
    engine(&mut m, final_text("iyi"));

    assert_eq!(m.handle(Input::StopRequested), vec![Effect::StopEngine]);
    assert_eq!(m.state(), CaptureState::Stopping);

    // Graceful stop flushes the last fragment
    engine(&mut m, final_text("günler"));
    assert!(error(&mut m, EngineErrorKind::Aborted).is_empty());

    let effects = engine(&mut m, RecognitionEvent::Ended);
    assert_eq!(
        notifications(&effects),
        vec![CaptureEvent::Ended("iyi günler ".to_string())]
    );
    assert_eq!(m.state(), CaptureState::Stopped);
}

#[test]
fn test_stop_while_restart_pending_cancels_it() {
    let mut m = machine(false);
    m.begin();
    engine(&mut m, RecognitionEvent::Started);
    engine(&mut m, final_text("bir"));
    engine(&mut m, RecognitionEvent::Ended);
    assert_eq!(m.state(), CaptureState::RestartScheduled);

    let effects = m.handle(Input::StopRequested);
    assert_eq!(
        effects,
        vec![
            Effect::CancelRestart,
            Effect::Notify(CaptureEvent::Ended("bir ".to_string())),
        ]
    );
    assert!(m.handle(Input::RestartDue).is_empty());
}

#[test]
fn test_stop_is_idempotent() {
    let mut m = machine(false);
    assert!(m.handle(Input::StopRequested).is_empty());

    m.begin();
    engine(&mut m, RecognitionEvent::Started);
    assert_eq!(m.handle(Input::StopRequested), vec![Effect::StopEngine]);
    assert!(m.handle(Input::StopRequested).is_empty());
}

#[test]
fn test_launch_failure_is_terminal() {
    let mut m = machine(false);
    m.begin();

    let effects = m.handle(Input::LaunchFailed("no microphone".to_string()));
    assert_eq!(
        notifications(&effects),
        vec![CaptureEvent::Error(CaptureError::StartFailure(
            "no microphone".to_string()
        ))]
    );
    assert_eq!(m.state(), CaptureState::Stopped);
    assert_eq!(m.begin(), vec![Effect::LaunchEngine]);
}
