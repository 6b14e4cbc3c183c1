use crate::error::{Result, TransportError};
use crate::infrastructure::transport::{Transport, TransportEvent};
use crate::link::EstablishedLink;
use quizlink_core::traits::{EmoteInventory, ResultSink};
use quizlink_core::{
    Session, SessionEffect, SessionEvent, SessionLoop, SessionOutcome, SessionSnapshot,
    ANSWER_WINDOW,
};
use tokio::sync::{mpsc, watch};

/// Depth of the trigger and presentation channels
const CHANNEL_DEPTH: usize = 32;

/// Trigger events the presentation layer can raise.
#[derive(Debug, Clone, PartialEq)]
pub enum UiTrigger {
    /// Local selection (1..4); the timeout path is internal
    Answer(u8),
    /// Local emote pick, checked against the owned set before it applies
    Emote(String),
    Quit,
}

/// Presentation-side handle: push triggers in, read effects and snapshots
/// out. The runtime keeps the session opaque otherwise.
pub struct RuntimeHandle {
    pub triggers: mpsc::Sender<UiTrigger>,
    pub effects: mpsc::Receiver<SessionEffect>,
    pub snapshots: watch::Receiver<SessionSnapshot>,
}

/// The single-consumer session actor.
///
/// Everything that can mutate the session (transport events, UI triggers,
/// the answer countdown) funnels through one `select!` loop into the
/// bounded `SessionLoop`, so events apply strictly one at a time. Effects
/// flow back out: sends to the transport, timer arm/disarm internally, the
/// rest to the presentation channel.
pub struct SessionRuntime {
    session_loop: SessionLoop,
    transport: Option<Box<dyn Transport>>,
    transport_events: Option<mpsc::Receiver<TransportEvent>>,
    triggers_rx: mpsc::Receiver<UiTrigger>,
    effects_tx: mpsc::Sender<SessionEffect>,
    snapshots_tx: watch::Sender<SessionSnapshot>,
    result_sink: Box<dyn ResultSink>,
    emotes: Box<dyn EmoteInventory>,
    deadline: Option<tokio::time::Instant>,
    outcome: Option<SessionOutcome>,
    result_recorded: bool,
    triggers_closed: bool,
}

impl SessionRuntime {
    /// Single-player runtime: no transport at all.
    pub fn single(
        session: Session,
        result_sink: Box<dyn ResultSink>,
        emotes: Box<dyn EmoteInventory>,
    ) -> (Self, RuntimeHandle) {
        Self::build(session, None, None, result_sink, emotes)
    }

    /// Peer-mode runtime over an established link.
    ///
    /// The link produced by the setup flow is consumed here; the session's
    /// role must be the one the link resolved.
    pub fn versus(
        link: EstablishedLink,
        session: Session,
        transport: Box<dyn Transport>,
        transport_events: mpsc::Receiver<TransportEvent>,
        result_sink: Box<dyn ResultSink>,
        emotes: Box<dyn EmoteInventory>,
    ) -> (Self, RuntimeHandle) {
        debug_assert_eq!(link.role, session.role());
        tracing::info!(peer = %link.peer_name, kind = %link.kind, role = ?link.role, "session runtime starting");
        Self::build(
            session,
            Some(transport),
            Some(transport_events),
            result_sink,
            emotes,
        )
    }

    fn build(
        session: Session,
        transport: Option<Box<dyn Transport>>,
        transport_events: Option<mpsc::Receiver<TransportEvent>>,
        result_sink: Box<dyn ResultSink>,
        emotes: Box<dyn EmoteInventory>,
    ) -> (Self, RuntimeHandle) {
        let (triggers_tx, triggers_rx) = mpsc::channel(CHANNEL_DEPTH);
        let (effects_tx, effects_rx) = mpsc::channel(CHANNEL_DEPTH);
        let (snapshots_tx, snapshots_rx) = watch::channel(session.snapshot());

        let runtime = SessionRuntime {
            session_loop: SessionLoop::new(session),
            transport,
            transport_events,
            triggers_rx,
            effects_tx,
            snapshots_tx,
            result_sink,
            emotes,
            deadline: None,
            outcome: None,
            result_recorded: false,
            triggers_closed: false,
        };
        let handle = RuntimeHandle {
            triggers: triggers_tx,
            effects: effects_rx,
            snapshots: snapshots_rx,
        };
        (runtime, handle)
    }

    /// Drive the session to its terminal state and return the outcome.
    pub async fn run(mut self) -> Result<SessionOutcome> {
        let initial = self.session_loop.begin();
        self.dispatch(initial).await;

        while self.outcome.is_none() {
            if self.inputs_exhausted() {
                tracing::warn!("all inputs exhausted before the session finished");
                break;
            }

            let Some(event) = self.next_event().await else {
                continue;
            };
            let transport_died = matches!(
                event,
                SessionEvent::PeerDisconnected(_) | SessionEvent::TransportFailed(_)
            );

            if let Err(err) = self.session_loop.submit(event) {
                tracing::warn!(error = %err, "event queue full, dropping event");
                continue;
            }
            let effects = self.session_loop.poll();
            self.dispatch(effects).await;
            let _ = self.snapshots_tx.send(self.session_loop.session().snapshot());

            // A dead link with a session that never went live cannot finish;
            // surface it instead of idling forever
            if transport_died && self.outcome.is_none() && !self.session_loop.session().in_progress()
            {
                if let Some(mut transport) = self.transport.take() {
                    transport.stop().await;
                }
                return Err(TransportError::Disconnected(
                    "link lost before the session started".to_string(),
                ));
            }
        }

        if let Some(mut transport) = self.transport.take() {
            transport.stop().await;
            transport.cleanup().await;
        }

        self.outcome.ok_or(TransportError::ChannelClosed)
    }

    fn inputs_exhausted(&self) -> bool {
        self.triggers_closed && self.transport_events.is_none() && self.deadline.is_none()
    }

    /// Wait for the next input from any source. `None` means "nothing to
    /// apply, re-check the loop conditions".
    async fn next_event(&mut self) -> Option<SessionEvent> {
        let deadline = self.deadline;

        tokio::select! {
            maybe = recv_transport(&mut self.transport_events) => {
                match maybe {
                    Some(TransportEvent::Message(message)) => {
                        Some(SessionEvent::MessageReceived(message))
                    }
                    Some(TransportEvent::Disconnected(reason)) => {
                        Some(SessionEvent::PeerDisconnected(reason))
                    }
                    Some(TransportEvent::ConnectionFailed(reason)) => {
                        Some(SessionEvent::TransportFailed(reason))
                    }
                    Some(other) => {
                        tracing::debug!(?other, "transport event ignored during session");
                        None
                    }
                    None => {
                        self.transport_events = None;
                        Some(SessionEvent::TransportFailed(
                            "transport event channel closed".to_string(),
                        ))
                    }
                }
            }
            maybe = self.triggers_rx.recv(), if !self.triggers_closed => {
                match maybe {
                    Some(UiTrigger::Answer(option)) => Some(SessionEvent::LocalAnswer(option)),
                    Some(UiTrigger::Emote(id)) => {
                        if self.emotes.owns(&id) {
                            Some(SessionEvent::EmoteSelected(id))
                        } else {
                            tracing::warn!(emote = %id, "emote not owned, ignoring");
                            None
                        }
                    }
                    Some(UiTrigger::Quit) => Some(SessionEvent::QuitRequested),
                    None => {
                        // The presentation side went away; treat as a quit
                        self.triggers_closed = true;
                        Some(SessionEvent::QuitRequested)
                    }
                }
            }
            _ = sleep_until_deadline(deadline), if deadline.is_some() => {
                Some(SessionEvent::TimerExpired)
            }
        }
    }

    async fn dispatch(&mut self, effects: Vec<SessionEffect>) {
        for effect in effects {
            match effect {
                SessionEffect::Send(message) => {
                    if let Some(transport) = &mut self.transport {
                        transport.send(message).await;
                    }
                }
                SessionEffect::TimerStart => {
                    self.deadline = Some(tokio::time::Instant::now() + ANSWER_WINDOW);
                }
                SessionEffect::TimerStop => {
                    self.deadline = None;
                }
                SessionEffect::Finished(outcome) => {
                    if !self.result_recorded {
                        self.result_recorded = true;
                        self.result_sink.record_result(
                            outcome.local_score,
                            outcome.mode,
                            outcome.verdict.is_win(),
                        );
                    }
                    self.outcome = Some(outcome.clone());
                    let _ = self.effects_tx.send(SessionEffect::Finished(outcome)).await;
                }
                other => {
                    let _ = self.effects_tx.send(other).await;
                }
            }
        }
    }
}

async fn recv_transport(
    events: &mut Option<mpsc::Receiver<TransportEvent>>,
) -> Option<TransportEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_deadline(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizlink_core::domain::question::OPTION_COUNT;
    use quizlink_core::traits::NullResultSink;
    use quizlink_core::{GameMode, Phase, Question, Verdict};
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    struct OpenInventory;

    impl EmoteInventory for OpenInventory {
        fn owned_emote_ids(&self) -> HashSet<String> {
            HashSet::from(["laugh".to_string()])
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink(Arc<Mutex<Vec<(u32, GameMode, bool)>>>);

    impl ResultSink for RecordingSink {
        fn record_result(&mut self, score: u32, mode: GameMode, won: bool) {
            self.0.lock().unwrap().push((score, mode, won));
        }
    }

    fn bank() -> Vec<Question> {
        (1..=5)
            .map(|id| {
                let options: [String; OPTION_COUNT] =
                    ["A".to_string(), "B".to_string(), "C".to_string(), "D".to_string()];
                Question::new(id, format!("Question {id}"), options, 1).unwrap()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_single_player_run_to_completion() {
        let session = Session::single(bank(), "Alice").unwrap();
        let sink = RecordingSink::default();
        let records = sink.0.clone();
        let (runtime, mut handle) =
            SessionRuntime::single(session, Box::new(sink), Box::new(OpenInventory));

        let driver = tokio::spawn(async move {
            while let Some(effect) = handle.effects.recv().await {
                match effect {
                    SessionEffect::PresentQuestion { .. } => {
                        handle.triggers.send(UiTrigger::Answer(1)).await.unwrap();
                    }
                    SessionEffect::Finished(_) => break,
                    _ => {}
                }
            }
            handle
        });

        let outcome = runtime.run().await.unwrap();
        assert_eq!(outcome.local_score, 100);
        assert_eq!(outcome.verdict, Verdict::Win);
        assert_eq!(outcome.remote_score, None);

        // Result recorded exactly once
        let recorded = records.lock().unwrap();
        assert_eq!(recorded.as_slice(), &[(100, GameMode::Single, true)]);

        let handle = driver.await.unwrap();
        assert_eq!(handle.snapshots.borrow().phase, Phase::Finished);
    }

    #[tokio::test]
    async fn test_unowned_emote_is_filtered() {
        let session = Session::single(bank(), "Alice").unwrap();
        let (runtime, mut handle) = SessionRuntime::single(
            session,
            Box::new(NullResultSink),
            Box::new(OpenInventory),
        );

        let driver = tokio::spawn(async move {
            let mut local_emotes = Vec::new();
            handle.triggers.send(UiTrigger::Emote("stolen".into())).await.unwrap();
            handle.triggers.send(UiTrigger::Emote("laugh".into())).await.unwrap();
            handle.triggers.send(UiTrigger::Quit).await.unwrap();

            while let Some(effect) = handle.effects.recv().await {
                match effect {
                    SessionEffect::LocalEmote(name) => local_emotes.push(name),
                    SessionEffect::Finished(_) => break,
                    _ => {}
                }
            }
            local_emotes
        });

        let outcome = runtime.run().await.unwrap();
        assert_eq!(outcome.verdict, Verdict::Loss);

        let local_emotes = driver.await.unwrap();
        assert_eq!(local_emotes, vec!["laugh".to_string()]);
    }

    #[tokio::test]
    async fn test_dropped_ui_counts_as_quit() {
        let session = Session::single(bank(), "Alice").unwrap();
        let (runtime, handle) = SessionRuntime::single(
            session,
            Box::new(NullResultSink),
            Box::new(OpenInventory),
        );
        drop(handle);

        let outcome = runtime.run().await.unwrap();
        assert_eq!(outcome.verdict, Verdict::Loss);
        assert_eq!(outcome.local_score, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires_after_answer_window() {
        let session = Session::single(bank(), "Alice").unwrap();
        let sink = RecordingSink::default();
        let records = sink.0.clone();
        let (runtime, mut handle) =
            SessionRuntime::single(session, Box::new(sink), Box::new(OpenInventory));

        // Nobody answers; paused time auto-advances through all five windows
        let driver = tokio::spawn(async move {
            while let Some(effect) = handle.effects.recv().await {
                if matches!(effect, SessionEffect::Finished(_)) {
                    break;
                }
            }
            handle
        });

        let outcome = runtime.run().await.unwrap();
        assert_eq!(outcome.local_score, 0);
        assert_eq!(outcome.verdict, Verdict::Loss);
        assert_eq!(records.lock().unwrap().len(), 1);

        drop(driver);
    }
}
