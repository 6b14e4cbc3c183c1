use crate::domain::{
    normalize_emote_id, GamePayload, Message, NameExchange, PlayerAnswer, Question, SessionEffect,
    SessionOutcome, Verdict,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Questions per session; the host loads exactly this many
pub const TOTAL_QUESTIONS: usize = 5;

/// Answer window while a side is active
pub const ANSWER_WINDOW: Duration = Duration::from_secs(15);

/// Points per correct answer in single-player mode
pub const SINGLE_PLAYER_AWARD: u32 = 20;

/// Points per correct answer in peer mode
pub const VERSUS_AWARD: u32 = 25;

/// Points awarded to the remaining player when the peer drops mid-game
pub const DISCONNECT_BONUS: u32 = 20;

/// Opponent display name used until the name exchange completes
pub const DEFAULT_OPPONENT_NAME: &str = "Opponent";

/// Whether the session has a peer at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMode {
    Single,
    Versus,
}

/// Resolved once at connection time; the accepting / negotiation-winning
/// side is the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Host,
    Client,
}

/// Where the local side is in the turn cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Client only: connected, question set not yet received
    AwaitingStart,
    /// The local answer window is open
    Active,
    /// The opponent's answer window is open
    Waiting,
    Finished,
}

/// Errors that can occur when constructing a session
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("a session needs at least one question")]
    NoQuestions,
}

/// Read-only view of the session for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub mode: GameMode,
    pub phase: Phase,
    pub question_index: usize,
    pub total_questions: usize,
    pub local_score: u32,
    pub remote_score: u32,
    pub opponent_name: String,
    pub current_question: Option<Question>,
    pub outcome: Option<SessionOutcome>,
}

/// The turn-based session state machine.
///
/// Single-owner, mutated only through the methods below; every method
/// returns the effects the caller must execute. All game-state decisions
/// live here; the machine never touches sockets, timers or screens.
#[derive(Debug, Clone)]
pub struct Session {
    mode: GameMode,
    role: Role,
    phase: Phase,
    question_index: usize,
    questions: Vec<Question>,
    local_score: u32,
    remote_score: u32,
    host_answered: bool,
    client_answered: bool,
    started: bool,
    in_progress: bool,
    local_name: String,
    opponent_name: String,
    outcome: Option<SessionOutcome>,
}

impl Session {
    /// Single-player session: no peer, no role, no alternation.
    pub fn single(
        questions: Vec<Question>,
        local_name: impl Into<String>,
    ) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::NoQuestions);
        }
        Ok(Self::with_state(GameMode::Single, Role::Host, questions, local_name))
    }

    /// Peer-mode host: owns the question set and answers first.
    pub fn host(
        questions: Vec<Question>,
        local_name: impl Into<String>,
    ) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::NoQuestions);
        }
        Ok(Self::with_state(GameMode::Versus, Role::Host, questions, local_name))
    }

    /// Peer-mode client: the question set arrives via `StartGame`.
    pub fn client(local_name: impl Into<String>) -> Self {
        Self::with_state(GameMode::Versus, Role::Client, Vec::new(), local_name)
    }

    fn with_state(
        mode: GameMode,
        role: Role,
        questions: Vec<Question>,
        local_name: impl Into<String>,
    ) -> Self {
        Session {
            mode,
            role,
            phase: Phase::AwaitingStart,
            question_index: 0,
            questions,
            local_score: 0,
            remote_score: 0,
            host_answered: false,
            client_answered: false,
            started: false,
            in_progress: false,
            local_name: local_name.into(),
            opponent_name: DEFAULT_OPPONENT_NAME.to_string(),
            outcome: None,
        }
    }

    // ===== Getters =====

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn question_index(&self) -> usize {
        self.question_index
    }

    pub fn local_score(&self) -> u32 {
        self.local_score
    }

    pub fn remote_score(&self) -> u32 {
        self.remote_score
    }

    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    pub fn opponent_name(&self) -> &str {
        &self.opponent_name
    }

    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.mode,
            phase: self.phase,
            question_index: self.question_index,
            total_questions: self.total_questions(),
            local_score: self.local_score,
            remote_score: self.remote_score,
            opponent_name: self.opponent_name.clone(),
            current_question: self.questions.get(self.question_index).cloned(),
            outcome: self.outcome.clone(),
        }
    }

    fn total_questions(&self) -> usize {
        match (self.mode, self.role) {
            // The client learns the total from StartGame
            (GameMode::Versus, Role::Client) if self.questions.is_empty() => TOTAL_QUESTIONS,
            _ => self.questions.len(),
        }
    }

    // ===== Lifecycle =====

    /// Open the session. Host and single-player become active on question 0;
    /// the client waits for the host's question set.
    pub fn begin(&mut self) -> Vec<SessionEffect> {
        if self.started {
            tracing::warn!("begin called twice, ignoring");
            return Vec::new();
        }
        self.started = true;

        match (self.mode, self.role) {
            (GameMode::Single, _) => {
                self.in_progress = true;
                self.phase = Phase::Active;
                vec![self.present_current(), SessionEffect::TimerStart]
            }
            (GameMode::Versus, Role::Host) => {
                self.in_progress = true;
                self.phase = Phase::Active;
                vec![
                    SessionEffect::Send(Message::name_request()),
                    SessionEffect::Send(Message::Game(GamePayload::StartGame {
                        questions: self.questions.clone(),
                    })),
                    self.present_current(),
                    SessionEffect::TimerStart,
                ]
            }
            (GameMode::Versus, Role::Client) => {
                self.phase = Phase::AwaitingStart;
                vec![
                    SessionEffect::Send(Message::name_request()),
                    SessionEffect::ShowWaiting,
                ]
            }
        }
    }

    // ===== Local triggers =====

    /// A local selection event; 0 means the answer window elapsed.
    pub fn local_answer(&mut self, selected_option: u8) -> Vec<SessionEffect> {
        if self.phase != Phase::Active || !self.in_progress {
            tracing::debug!(
                phase = ?self.phase,
                "local answer outside an open window, ignoring"
            );
            return Vec::new();
        }
        if self.local_answered() {
            tracing::debug!(index = self.question_index, "duplicate local answer, ignoring");
            return Vec::new();
        }
        let Some(question) = self.questions.get(self.question_index) else {
            return Vec::new();
        };

        let is_correct = question.is_correct(selected_option);
        if is_correct {
            self.local_score += self.award();
        }
        let answer = PlayerAnswer {
            question_index: self.question_index,
            selected_option,
            is_correct,
        };

        let mut effects = vec![
            SessionEffect::TimerStop,
            SessionEffect::LocalAnswerRecorded(answer.clone()),
        ];

        match self.mode {
            GameMode::Single => {
                effects.extend(self.advance());
            }
            GameMode::Versus => {
                self.set_local_answered();
                effects.push(SessionEffect::Send(Message::Game(
                    GamePayload::AnswerSubmitted(answer),
                )));

                if self.role == Role::Host && self.client_answered {
                    // Client's answer arrived before ours (out of the strict
                    // cycle, but both sides have now answered)
                    effects.extend(self.advance());
                } else {
                    self.phase = Phase::Waiting;
                    effects.push(SessionEffect::ShowWaiting);
                }
            }
        }

        effects
    }

    /// The 15-second countdown elapsed: equivalent to selecting nothing.
    pub fn timer_expired(&mut self) -> Vec<SessionEffect> {
        self.local_answer(0)
    }

    /// Explicit local quit: best-effort notify, zero the score, lose.
    pub fn quit(&mut self) -> Vec<SessionEffect> {
        if !self.in_progress {
            return Vec::new();
        }

        let mut effects = vec![SessionEffect::TimerStop];
        if self.mode == GameMode::Versus {
            effects.push(SessionEffect::Send(Message::Game(GamePayload::GameOver)));
        }
        self.local_score = 0;
        effects.push(self.finalize(Verdict::Loss));
        effects
    }

    /// A locally selected emote; ownership is checked by the caller.
    pub fn emote(&mut self, emote_id: &str) -> Vec<SessionEffect> {
        let name = normalize_emote_id(emote_id);
        let mut effects = vec![SessionEffect::LocalEmote(name.clone())];
        if self.mode == GameMode::Versus {
            // Fire-and-forget: drop-safe if the peer is already gone
            effects.push(SessionEffect::Send(Message::Game(GamePayload::EmoteUsed {
                emote_id: name,
            })));
        }
        effects
    }

    // ===== Peer input =====

    /// Apply a decoded message from the peer.
    pub fn receive_message(&mut self, message: Message) -> Vec<SessionEffect> {
        if let Some(exchange) = message.as_name_exchange() {
            return self.handle_name_exchange(exchange);
        }

        match message {
            Message::Game(GamePayload::StartGame { questions }) => self.handle_start_game(questions),
            Message::Game(GamePayload::AnswerSubmitted(answer)) => self.handle_remote_answer(answer),
            Message::Game(GamePayload::EmoteUsed { emote_id }) => {
                vec![SessionEffect::OpponentEmote(normalize_emote_id(&emote_id))]
            }
            Message::Game(GamePayload::GameOver) => self.handle_game_over(),
            Message::Text(text) => {
                tracing::debug!(len = text.len(), "ignoring unrecognized text payload");
                Vec::new()
            }
        }
    }

    /// The link dropped while the session was live: the remaining player
    /// gets the disconnect bonus before finalizing.
    pub fn peer_disconnected(&mut self, reason: &str) -> Vec<SessionEffect> {
        if self.mode != GameMode::Versus || !self.in_progress {
            tracing::debug!(reason, "disconnect outside a live session, ignoring");
            return Vec::new();
        }
        tracing::info!(reason, "peer disconnected mid-game, applying bonus");

        self.local_score += DISCONNECT_BONUS;
        vec![
            SessionEffect::TimerStop,
            self.finalize(Verdict::from_scores(self.local_score, self.remote_score)),
        ]
    }

    /// The transport reported a failure other than a clean drop. The session
    /// ends with the accumulated comparison, without a bonus.
    pub fn transport_failed(&mut self, reason: &str) -> Vec<SessionEffect> {
        if self.mode != GameMode::Versus || !self.in_progress {
            return Vec::new();
        }
        tracing::warn!(reason, "transport failure mid-game, finalizing");

        vec![
            SessionEffect::TimerStop,
            self.finalize(Verdict::from_scores(self.local_score, self.remote_score)),
        ]
    }

    // ===== Message handlers =====

    fn handle_name_exchange(&mut self, exchange: NameExchange<'_>) -> Vec<SessionEffect> {
        match exchange {
            NameExchange::Request => {
                vec![SessionEffect::Send(Message::name_announce(&self.local_name))]
            }
            NameExchange::Announce(name) if !name.is_empty() => {
                self.opponent_name = name.to_string();
                vec![SessionEffect::OpponentNamed(self.opponent_name.clone())]
            }
            NameExchange::Announce(_) => Vec::new(),
        }
    }

    fn handle_start_game(&mut self, questions: Vec<Question>) -> Vec<SessionEffect> {
        if self.mode != GameMode::Versus
            || self.role != Role::Client
            || self.phase != Phase::AwaitingStart
        {
            tracing::warn!(role = ?self.role, phase = ?self.phase, "unexpected StartGame, ignoring");
            return Vec::new();
        }
        if questions.is_empty() {
            tracing::warn!("StartGame with no questions, ignoring");
            return Vec::new();
        }

        tracing::info!(count = questions.len(), "question set received");
        self.questions = questions;
        self.in_progress = true;
        // The client stays waiting (no timer) until the host's first answer
        self.phase = Phase::Waiting;
        vec![SessionEffect::ShowWaiting]
    }

    fn handle_remote_answer(&mut self, answer: PlayerAnswer) -> Vec<SessionEffect> {
        if self.mode != GameMode::Versus || !self.in_progress {
            return Vec::new();
        }

        match self.role {
            Role::Client => self.handle_host_answer(answer),
            Role::Host => self.handle_client_answer(answer),
        }
    }

    /// Client side: the host answered, which opens our window.
    fn handle_host_answer(&mut self, answer: PlayerAnswer) -> Vec<SessionEffect> {
        if answer.question_index == self.question_index && !self.host_answered {
            // Host answered the question we are on
        } else if answer.question_index == self.question_index + 1
            && answer.question_index < self.questions.len()
        {
            // Host advanced past the question we both answered; adopt its
            // index (the host owns advancement)
            self.question_index = answer.question_index;
            self.host_answered = false;
            self.client_answered = false;
        } else {
            tracing::debug!(
                got = answer.question_index,
                at = self.question_index,
                "stale or duplicate host answer, ignoring"
            );
            return Vec::new();
        }

        self.host_answered = true;
        if answer.is_correct {
            self.remote_score += VERSUS_AWARD;
        }
        self.phase = Phase::Active;
        vec![
            SessionEffect::RemoteAnswerRecorded(answer),
            self.present_current(),
            SessionEffect::TimerStart,
        ]
    }

    /// Host side: the client answered, which lets us advance.
    fn handle_client_answer(&mut self, answer: PlayerAnswer) -> Vec<SessionEffect> {
        if answer.question_index != self.question_index || self.client_answered {
            tracing::debug!(
                got = answer.question_index,
                at = self.question_index,
                "stale or duplicate client answer, ignoring"
            );
            return Vec::new();
        }

        self.client_answered = true;
        if answer.is_correct {
            self.remote_score += VERSUS_AWARD;
        }

        let mut effects = vec![SessionEffect::RemoteAnswerRecorded(answer)];
        if self.host_answered {
            effects.extend(self.advance());
        }
        effects
    }

    fn handle_game_over(&mut self) -> Vec<SessionEffect> {
        if !self.in_progress {
            tracing::debug!("GameOver outside a live session, ignoring");
            return Vec::new();
        }
        // Peer-initiated end: stop with the scores accumulated so far and
        // do not echo GameOver back
        vec![
            SessionEffect::TimerStop,
            self.finalize(Verdict::from_scores(self.local_score, self.remote_score)),
        ]
    }

    // ===== Progression =====

    fn advance(&mut self) -> Vec<SessionEffect> {
        self.question_index += 1;
        self.host_answered = false;
        self.client_answered = false;

        if self.question_index < self.questions.len() {
            self.phase = Phase::Active;
            vec![self.present_current(), SessionEffect::TimerStart]
        } else {
            let verdict = match self.mode {
                GameMode::Single => {
                    if self.local_score > 0 {
                        Verdict::Win
                    } else {
                        Verdict::Loss
                    }
                }
                GameMode::Versus => Verdict::from_scores(self.local_score, self.remote_score),
            };

            let mut effects = Vec::new();
            if self.mode == GameMode::Versus {
                effects.push(SessionEffect::Send(Message::Game(GamePayload::GameOver)));
            }
            effects.push(self.finalize(verdict));
            effects
        }
    }

    fn finalize(&mut self, verdict: Verdict) -> SessionEffect {
        self.phase = Phase::Finished;
        self.in_progress = false;

        let outcome = SessionOutcome {
            mode: self.mode,
            verdict,
            local_score: self.local_score,
            remote_score: match self.mode {
                GameMode::Single => None,
                GameMode::Versus => Some(self.remote_score),
            },
        };
        self.outcome = Some(outcome.clone());
        tracing::info!(?verdict, local = self.local_score, remote = self.remote_score, "session finished");
        SessionEffect::Finished(outcome)
    }

    // ===== Helpers =====

    /// Only called with `question_index` in bounds
    fn present_current(&self) -> SessionEffect {
        SessionEffect::PresentQuestion {
            index: self.question_index,
            question: self.questions[self.question_index].clone(),
        }
    }

    fn award(&self) -> u32 {
        match self.mode {
            GameMode::Single => SINGLE_PLAYER_AWARD,
            GameMode::Versus => VERSUS_AWARD,
        }
    }

    fn local_answered(&self) -> bool {
        match (self.mode, self.role) {
            (GameMode::Single, _) => false,
            (GameMode::Versus, Role::Host) => self.host_answered,
            (GameMode::Versus, Role::Client) => self.client_answered,
        }
    }

    fn set_local_answered(&mut self) {
        match self.role {
            Role::Host => self.host_answered = true,
            Role::Client => self.client_answered = true,
        }
    }
}
