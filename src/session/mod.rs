pub mod export;

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::models::{FileState, GoalType, StudyGoal, StudySet, TutorMessage, View};
use crate::services::auth::{AuthClient, AuthError, AuthUser};
use crate::services::gemini::GeminiClient;
use crate::services::generation::{generate_study_set, GenerationError};
use crate::services::goal_store::{GoalStoreClient, GoalStoreError, NewGoal};
use crate::services::tutor::{TutorError, TutorReply, TutorSession};

/// Correlates a generation result with the session state it was started
/// against. A result carrying a stale ticket (a newer generation started, or
/// the session was reset or logged out while the call was suspended) is
/// discarded as a no-op.
#[must_use]
#[derive(Debug, Clone, Copy)]
pub struct GenerationTicket {
    epoch: u64,
}

/// Top-level orchestrator: holds the authenticated identity, the uploaded
/// file, the generated study set, the goal mirror, the selected view, at most
/// one pending error, and the queue of pending goal completions.
///
/// All methods run on one logical task; the only suspension points are the
/// remote calls on the service clients.
pub struct StudySession {
    auth: AuthClient,
    gemini: GeminiClient,
    store: GoalStoreClient,
    identity: Option<AuthUser>,
    file: Option<FileState>,
    study_set: Option<StudySet>,
    goals: Vec<StudyGoal>,
    view: View,
    error: Option<String>,
    completions: VecDeque<StudyGoal>,
    tutor: Option<TutorSession>,
    epoch: u64,
}

impl StudySession {
    pub fn new(auth: AuthClient, gemini: GeminiClient, store: GoalStoreClient) -> Self {
        Self {
            auth,
            gemini,
            store,
            identity: None,
            file: None,
            study_set: None,
            goals: Vec::new(),
            view: View::Flashcards,
            error: None,
            completions: VecDeque::new(),
            tutor: None,
            epoch: 0,
        }
    }

    pub fn from_env() -> Self {
        Self::new(AuthClient::from_env(), GeminiClient::from_env(), GoalStoreClient::from_env())
    }

    // --- Identity ---

    pub fn identity(&self) -> Option<&AuthUser> {
        self.identity.as_ref()
    }

    pub fn auth(&self) -> &AuthClient {
        &self.auth
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<(), AuthError> {
        let user = self.auth.sign_in(email, password).await?;
        self.set_identity(Some(user));
        self.refresh_goals().await;
        Ok(())
    }

    pub async fn sign_up(&mut self, email: &str, password: &str) -> Result<(), AuthError> {
        let user = self.auth.sign_up(email, password).await?;
        self.set_identity(Some(user));
        self.refresh_goals().await;
        Ok(())
    }

    /// Applies an identity change observed on the auth subscription. Losing
    /// the identity empties the goal mirror; gaining one authorizes the goal
    /// store with the current token. The caller follows a new identity with
    /// [`refresh_goals`].
    ///
    /// [`refresh_goals`]: StudySession::refresh_goals
    pub fn set_identity(&mut self, user: Option<AuthUser>) {
        match user {
            Some(user) => {
                self.store.set_bearer_token(self.auth.id_token().map(str::to_string));
                self.identity = Some(user);
            }
            None => {
                self.identity = None;
                self.store.set_bearer_token(None);
                self.goals.clear();
                self.completions.clear();
            }
        }
    }

    /// Re-mirrors the remote goal collection. A fetch failure logs and leaves
    /// the mirror empty rather than surfacing an error.
    pub async fn refresh_goals(&mut self) {
        let Some(user) = self.identity.clone() else {
            self.goals.clear();
            return;
        };
        match self.store.fetch_all(&user.uid).await {
            Ok(goals) => self.goals = goals,
            Err(err) => {
                warn!(error = %err, uid = %user.uid, "failed to load goals");
                self.goals.clear();
            }
        }
    }

    /// Invalidates the identity first, then clears session-scoped state.
    /// The goal mirror empties with the identity; remote goals are untouched.
    pub fn logout(&mut self) {
        self.auth.sign_out();
        self.identity = None;
        self.store.set_bearer_token(None);
        self.reset();
        self.goals.clear();
        self.completions.clear();
    }

    // --- Generation ---

    /// Stores the file and clears the previous study set and error, returning
    /// the ticket the eventual result must present to be applied. Starting
    /// again supersedes any ticket still outstanding, so only the newest
    /// call's result can land.
    pub fn start_generation(&mut self, file: FileState) -> GenerationTicket {
        self.epoch += 1;
        self.error = None;
        self.study_set = None;
        self.tutor = None;
        self.file = Some(file);
        GenerationTicket { epoch: self.epoch }
    }

    /// Clone of the generation client, for running the call outside the
    /// session borrow while the UI stays interactive.
    pub fn generation_client(&self) -> GeminiClient {
        self.gemini.clone()
    }

    /// Applies a finished generation. Success stores the study set, seeds a
    /// fresh tutor session from the summary, and lands on the flashcards
    /// view; failure records the user-facing message and stays on upload.
    /// Stale results (ticket superseded by a newer start, a reset, or a
    /// logout) are discarded.
    pub fn finish_generation(
        &mut self,
        ticket: GenerationTicket,
        result: Result<StudySet, GenerationError>,
    ) {
        if ticket.epoch != self.epoch {
            debug!("discarding generation result for a reset session");
            return;
        }

        match result {
            Ok(set) => {
                self.tutor = Some(TutorSession::new(self.gemini.clone(), Some(&set.summary)));
                self.study_set = Some(set);
                self.view = View::Flashcards;
            }
            Err(err) => {
                self.error = Some(err.user_message());
            }
        }
    }

    /// Convenience path for shells that do not interleave other work with the
    /// generation call.
    pub async fn submit_file(&mut self, file: FileState) {
        let ticket = self.start_generation(file.clone());
        let client = self.generation_client();
        let result = generate_study_set(&client, &file).await;
        self.finish_generation(ticket, result);
    }

    /// Clears file, study set, and error together; goals and identity are
    /// never touched. Any in-flight generation becomes stale.
    pub fn reset(&mut self) {
        self.file = None;
        self.study_set = None;
        self.error = None;
        self.tutor = None;
        self.epoch += 1;
    }

    // --- Views ---

    pub fn select_view(&mut self, view: View) {
        self.view = view;
    }

    pub fn selected_view(&self) -> View {
        self.view
    }

    /// The view to render, or `None` for the upload surface: without a study
    /// set, view selection has no effect beyond the fallback.
    pub fn active_view(&self) -> Option<View> {
        self.study_set.as_ref().map(|_| self.view)
    }

    pub fn study_set(&self) -> Option<&StudySet> {
        self.study_set.as_ref()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file.as_ref().map(|f| f.name.as_str())
    }

    // --- Errors and notifications ---

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn report_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Pending completion notifications, oldest first. Queued so that two
    /// goals completing in the same record call are both surfaced.
    pub fn pop_completed_goal(&mut self) -> Option<StudyGoal> {
        self.completions.pop_front()
    }

    pub fn pending_completions(&self) -> usize {
        self.completions.len()
    }

    // --- Goals ---

    pub fn goals(&self) -> &[StudyGoal] {
        &self.goals
    }

    /// Installs a goal collection fetched or cached outside the session as
    /// the local mirror.
    pub fn set_goals(&mut self, goals: Vec<StudyGoal>) {
        self.goals = goals;
    }

    /// Creates the goal remotely, then mirrors it locally. A session without
    /// an identity has nothing to attach the goal to and no-ops.
    pub async fn add_goal(&mut self, goal: NewGoal) -> Result<(), GoalStoreError> {
        let Some(user) = self.identity.clone() else {
            debug!("add_goal without identity ignored");
            return Ok(());
        };
        let created = self.store.create(&user.uid, goal).await?;
        self.goals.push(created);
        Ok(())
    }

    pub async fn delete_goal(&mut self, goal_id: &str) -> Result<(), GoalStoreError> {
        let Some(user) = self.identity.clone() else {
            debug!("delete_goal without identity ignored");
            return Ok(());
        };
        self.store.delete(&user.uid, goal_id).await?;
        self.goals.retain(|g| g.id != goal_id);
        Ok(())
    }

    /// Records one review activity: advances every matching goal locally,
    /// queues completion notifications, then persists each new progress
    /// value. The local state is committed first and stands even when a
    /// write fails — accepted eventual consistency, never reconciled.
    pub async fn record_activity(&mut self, activity: GoalType) {
        let Some(user) = self.identity.clone() else {
            return;
        };

        let outcome = crate::goals::record(&mut self.goals, activity);
        self.completions.extend(outcome.completed);

        for update in outcome.updates {
            if let Err(err) = self
                .store
                .update_progress(&user.uid, &update.goal_id, update.progress)
                .await
            {
                warn!(
                    error = %err,
                    goal_id = %update.goal_id,
                    "goal progress write failed; optimistic local state stands"
                );
            }
        }
    }

    // --- Tutor ---

    /// The active tutor session, creating the general-knowledge fallback on
    /// first use so tutoring works before any document is processed.
    pub fn tutor_mut(&mut self) -> &mut TutorSession {
        self.tutor
            .get_or_insert_with(|| TutorSession::new(self.gemini.clone(), None))
    }

    pub async fn ask_tutor(&mut self, message: &str) -> Result<TutorReply, TutorError> {
        self.tutor_mut().ask(message).await
    }

    pub fn tutor_transcript(&self) -> &[TutorMessage] {
        self.tutor.as_ref().map(|t| t.transcript()).unwrap_or(&[])
    }

    pub fn tutor_apply_chunk(&mut self, text: &str) {
        if let Some(tutor) = &mut self.tutor {
            tutor.apply_chunk(text);
        }
    }

    pub fn tutor_abort_reply(&mut self) {
        if let Some(tutor) = &mut self.tutor {
            tutor.abort_reply();
        }
    }
}
