//! The upload workflow state machine.
//!
//! [`Workflow`] owns every user-facing transition of a submission and writes
//! the results to a [`PresentationSurface`]. It performs no I/O and never
//! waits: anything that must happen later (ticks, the request, the hide
//! timer, notice expiry) is returned as a [`Command`] for the driver in
//! [`crate::controller`] to schedule. Events produced by those commands come
//! back tagged with their [`SubmissionId`] or [`NoticeId`].
//!
//! ```text
//!            submit(file)              reply Ok
//!  Idle ─────────────────▶ InProgress ──────────▶ Success ─┐
//!   ▲                        │  ▲  tick (≤ ceiling)         │ submit(file)
//!   │                        │  └──────┘                    ▼
//!   │                        └─────────────────▶ Failed ──▶ InProgress …
//!   │                              reply Err
//! ```
//!
//! A submission that is no longer current can still deliver ticks, replies
//! and hide timers. They are dropped here, which is what keeps overlapping
//! submissions from touching each other's display.

use crate::artifact::{Artifact, ClipboardChain, CopyMethod, Downloader, MARKDOWN_MEDIA_TYPE};
use crate::config::WorkflowConfig;
use crate::error::{ActionError, ConversionFailure};
use crate::input::{interpret, InputAction, InputEvent};
use crate::notice::{Notice, NoticeBoard, NoticeId, Severity};
use crate::progress::ProgressState;
use crate::submission::{FileRef, Submission, SubmissionId};
use crate::surface::PresentationSurface;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const NO_FILE_MESSAGE: &str = "No file selected";
pub const UNSUPPORTED_FILE_MESSAGE: &str = "File type not supported";
pub const CONVERTED_MESSAGE: &str = "File converted successfully!";
pub const DOWNLOADED_MESSAGE: &str = "Markdown file downloaded";
pub const COPIED_MESSAGE: &str = "Copied to clipboard";

/// Visible phase of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UiPhase {
    Idle,
    InProgress,
    Success,
    Failed,
}

impl UiPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UiPhase::Success | UiPhase::Failed)
    }
}

/// Deferred work requested by the workflow.
#[derive(Debug, Clone)]
pub enum Command {
    /// Begin delivering ticks for this submission.
    StartTicker(SubmissionId),
    /// Stop delivering ticks for this submission.
    StopTicker(SubmissionId),
    /// Issue the single conversion request for this submission.
    SendRequest(Submission),
    /// Deliver a hide event for this submission after `after`.
    ScheduleHide { id: SubmissionId, after: Duration },
    /// Deliver an expiry event for this notice after `after`.
    ScheduleNoticeExpiry { id: NoticeId, after: Duration },
}

/// Result of handling one input event.
#[derive(Debug)]
pub struct Handled {
    /// The host must suppress its default handling of the event.
    pub prevent_default: bool,
    pub commands: Vec<Command>,
}

/// Result of an artifact action.
#[derive(Debug)]
pub struct ActionOutcome<T> {
    pub result: Result<T, ActionError>,
    pub commands: Vec<Command>,
}

/// Point-in-time view of the workflow for hosts and tests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowSnapshot {
    pub phase: UiPhase,
    pub current: Option<u64>,
    pub file_name: Option<String>,
    pub progress: u8,
    pub progress_visible: bool,
    pub notice: Option<Notice>,
    pub has_artifact: bool,
    /// Number of submissions that have reached a terminal phase.
    pub settled: u64,
    /// Number of files turned away by the extension allow-list. A rejected
    /// file never becomes a submission, so it is not counted in `settled`.
    pub rejected: u64,
}

/// The upload workflow state machine.
pub struct Workflow<S: PresentationSurface> {
    surface: S,
    phase: UiPhase,
    current: Option<Submission>,
    next_id: u64,
    progress: ProgressState,
    progress_visible: bool,
    artifact: Option<Artifact>,
    notices: NoticeBoard,
    config: WorkflowConfig,
    settled: u64,
    rejected: u64,
}

impl<S: PresentationSurface> Workflow<S> {
    /// Create the workflow and render the idle state.
    pub fn new(mut surface: S, config: &WorkflowConfig) -> Self {
        surface.set_drop_active(false);
        surface.set_progress_visible(false);
        surface.set_preview(None);
        surface.set_help_visible(true);
        Self {
            surface,
            phase: UiPhase::Idle,
            current: None,
            next_id: 1,
            progress: ProgressState::new(config.progress_ceiling),
            progress_visible: false,
            artifact: None,
            notices: NoticeBoard::new(config.notice_dismiss()),
            config: config.clone(),
            settled: 0,
            rejected: 0,
        }
    }

    pub fn phase(&self) -> UiPhase {
        self.phase
    }

    pub fn current_id(&self) -> Option<SubmissionId> {
        self.current.as_ref().map(|s| s.id)
    }

    pub fn progress(&self) -> u8 {
        self.progress.value()
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            phase: self.phase,
            current: self.current.as_ref().map(|s| s.id.0),
            file_name: self.current.as_ref().map(|s| s.display_name().to_string()),
            progress: self.progress.value(),
            progress_visible: self.progress_visible,
            notice: self.notices.current().cloned(),
            has_artifact: self.artifact.is_some(),
            settled: self.settled,
            rejected: self.rejected,
        }
    }

    // ── Input ────────────────────────────────────────────────────────────

    pub fn handle_input(&mut self, event: InputEvent) -> Handled {
        let interpretation = interpret(event);
        if let Some(active) = interpretation.drop_active {
            self.surface.set_drop_active(active);
        }
        let commands = match interpretation.action {
            InputAction::None => Vec::new(),
            InputAction::OpenPicker => {
                self.surface.open_file_picker();
                Vec::new()
            }
            InputAction::Submit(file) => self.submit(file),
        };
        Handled {
            prevent_default: interpretation.prevent_default,
            commands,
        }
    }

    /// Start a submission for `file`, or post the benign notice when absent.
    pub fn submit(&mut self, file: Option<FileRef>) -> Vec<Command> {
        let Some(file) = file else {
            debug!("Empty selection, nothing to submit");
            return self.post(NO_FILE_MESSAGE, Severity::Info).into_iter().collect();
        };

        if !self.config.accepts(file.name()) {
            info!("Rejected '{}': extension not accepted", file.name());
            self.surface.clear_file_input();
            self.rejected += 1;
            return self
                .post(UNSUPPORTED_FILE_MESSAGE, Severity::Danger)
                .into_iter()
                .collect();
        }

        let mut commands = Vec::new();
        if let Some(prev) = &self.current {
            if self.phase == UiPhase::InProgress {
                debug!("Submission {} superseded while pending", prev.id);
                commands.push(Command::StopTicker(prev.id));
            }
        }

        let submission = Submission {
            id: SubmissionId(self.next_id),
            file,
        };
        self.next_id += 1;
        info!("Submission {} started for '{}'", submission.id, submission.display_name());

        // Stale results must not stay visible during the new attempt.
        self.surface.set_preview(None);
        if self.notices.clear() {
            self.surface.clear_notice();
        }
        self.surface.set_help_visible(false);
        self.artifact = None;

        self.progress.reset();
        self.surface.set_progress(0);
        self.surface.set_progress_visible(true);
        self.progress_visible = true;

        self.phase = UiPhase::InProgress;
        self.current = Some(submission.clone());

        commands.push(Command::StartTicker(submission.id));
        commands.push(Command::SendRequest(submission));
        commands
    }

    // ── Async events ─────────────────────────────────────────────────────

    /// Apply one simulated progress step.
    pub fn on_tick(&mut self, id: SubmissionId, step: u8) {
        if !self.is_pending(id) {
            return;
        }
        let value = self.progress.advance(step);
        self.surface.set_progress(value);
    }

    /// Settle submission `id` with the classified reply.
    ///
    /// The first command is always `StopTicker(id)`; since ticks are also
    /// gated on the phase, a tick already queued behind this reply is a no-op.
    pub fn on_response(
        &mut self,
        id: SubmissionId,
        outcome: Result<String, ConversionFailure>,
    ) -> Vec<Command> {
        if !self.is_pending(id) {
            debug!("Ignoring reply for stale submission {}", id);
            return Vec::new();
        }
        let source_name = self
            .current
            .as_ref()
            .map(|s| s.display_name().to_string())
            .unwrap_or_default();

        let mut commands = vec![Command::StopTicker(id)];

        match outcome {
            Ok(markdown) => {
                info!("Submission {} converted ({} bytes)", id, markdown.len());
                self.progress.complete();
                self.surface.set_progress(100);
                self.surface.set_preview(Some(&markdown));
                self.surface.set_help_visible(false);
                self.artifact = Some(Artifact {
                    markdown,
                    source_name,
                });
                self.phase = UiPhase::Success;
                commands.extend(self.post(CONVERTED_MESSAGE, Severity::Success));
            }
            Err(failure) => {
                warn!("Submission {} failed: {}", id, failure);
                self.surface.set_preview(None);
                self.surface.set_help_visible(true);
                self.phase = UiPhase::Failed;
                commands.extend(self.post(failure.to_string(), Severity::Danger));
            }
        }

        self.surface.clear_file_input();
        self.settled += 1;
        commands.push(Command::ScheduleHide {
            id,
            after: self.config.hide_delay(),
        });
        commands
    }

    /// Retire the progress bar after the grace period.
    pub fn on_hide_timer(&mut self, id: SubmissionId) {
        let is_current = self.current_id() == Some(id);
        if !is_current || !self.phase.is_terminal() || !self.progress_visible {
            debug!("Ignoring hide timer for submission {}", id);
            return;
        }
        self.surface.set_progress_visible(false);
        self.progress_visible = false;
        self.progress.reset();
        self.surface.set_progress(0);
    }

    pub fn on_notice_expired(&mut self, id: NoticeId) {
        if self.notices.expire(id) {
            self.surface.clear_notice();
        }
    }

    /// The user closed the notice.
    pub fn dismiss_notice(&mut self) {
        if self.notices.clear() {
            self.surface.clear_notice();
        }
    }

    // ── Artifact actions ─────────────────────────────────────────────────

    /// Save the bound artifact as `<stem>.md` through `downloader`.
    pub fn download(&mut self, downloader: &mut dyn Downloader) -> ActionOutcome<PathBuf> {
        let result = match &self.artifact {
            None => Err(ActionError::NoArtifact),
            Some(a) => {
                let name = a.file_name(&self.config.default_artifact_stem);
                downloader.save(&name, MARKDOWN_MEDIA_TYPE, &a.markdown)
            }
        };
        let commands = match &result {
            Ok(path) => {
                info!("Downloaded artifact to {}", path.display());
                self.post(DOWNLOADED_MESSAGE, Severity::Success)
            }
            Err(e) => self.post(format!("Failed to download: {e}"), Severity::Danger),
        };
        ActionOutcome {
            result,
            commands: commands.into_iter().collect(),
        }
    }

    /// Copy the bound artifact's text through `clipboard`.
    pub fn copy(&mut self, clipboard: &mut ClipboardChain) -> ActionOutcome<CopyMethod> {
        let result = match &self.artifact {
            None => Err(ActionError::NoArtifact),
            Some(a) => clipboard.copy(&a.markdown),
        };
        let commands = match &result {
            Ok(_) => self.post(COPIED_MESSAGE, Severity::Success),
            Err(e) => self.post(format!("Failed to copy: {e}"), Severity::Danger),
        };
        ActionOutcome {
            result,
            commands: commands.into_iter().collect(),
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    fn is_pending(&self, id: SubmissionId) -> bool {
        self.phase == UiPhase::InProgress && self.current_id() == Some(id)
    }

    /// Replace the notice; returns the expiry command when one is due.
    fn post(&mut self, message: impl Into<String>, severity: Severity) -> Option<Command> {
        let (notice, expiry) = self.notices.post(message, severity);
        self.surface.show_notice(&notice);
        expiry.map(|after| Command::ScheduleNoticeExpiry {
            id: notice.id,
            after,
        })
    }
}
