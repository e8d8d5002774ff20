//! Async driver for the upload workflow.
//!
//! ## Event loop
//!
//! One tokio task owns the [`Workflow`] and drains an unbounded queue. User
//! input, ticks, replies, timers and artifact actions all arrive on that
//! queue, so handlers never overlap and the surface is written from one place
//! only.
//!
//! ```text
//!  ControllerHandle ──input/actions──┐
//!  ticker task ──────Tick(id)────────┤
//!  request task ─────Response(id)────┼──▶ queue ──▶ Workflow ──▶ Surface
//!  timer tasks ──────Hide(id)/Expiry─┘                 │
//!                        ▲                             │ Commands
//!                        └──────────── spawn ◀─────────┘
//! ```
//!
//! Spawned tasks hold only a weak sender. Once every [`ControllerHandle`] is
//! dropped the queue closes and the loop exits, aborting the ticker.
//!
//! ## Settling a reply
//!
//! The reply handler's first command is `StopTicker`, executed in the same
//! loop iteration that renders the terminal state. A tick that was already
//! queued is rejected by the workflow because the submission is no longer
//! pending, so no tick can land after the reply.

use crate::artifact::{ClipboardChain, CopyMethod, DirectoryDownloader, Downloader};
use crate::config::WorkflowConfig;
use crate::error::{ActionError, ConversionFailure, MdropError};
use crate::input::InputEvent;
use crate::notice::NoticeId;
use crate::progress::StepSource;
use crate::service::{self, ConversionService, HttpConversionService};
use crate::submission::{FileRef, Submission, SubmissionId};
use crate::surface::PresentationSurface;
use crate::workflow::{Command, UiPhase, Workflow, WorkflowSnapshot};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

enum Event {
    Input(InputEvent),
    Tick {
        id: SubmissionId,
        step: u8,
    },
    Response {
        id: SubmissionId,
        outcome: Result<String, ConversionFailure>,
    },
    HideProgress(SubmissionId),
    NoticeExpired(NoticeId),
    DismissNotice,
    Download(oneshot::Sender<Result<PathBuf, ActionError>>),
    Copy(oneshot::Sender<Result<CopyMethod, ActionError>>),
    Shutdown,
}

/// Owns the workflow and executes its commands. Run it with
/// [`UploadController::spawn`] or await [`UploadController::run`] directly.
pub struct UploadController<S: PresentationSurface> {
    workflow: Workflow<S>,
    config: WorkflowConfig,
    service: Arc<dyn ConversionService>,
    downloader: Box<dyn Downloader>,
    clipboard: Option<ClipboardChain>,
    rx: mpsc::UnboundedReceiver<Event>,
    weak_tx: mpsc::WeakUnboundedSender<Event>,
    snapshots: watch::Sender<WorkflowSnapshot>,
    ticker: Option<(SubmissionId, JoinHandle<()>)>,
}

impl<S: PresentationSurface + 'static> UploadController<S> {
    /// Create a controller around `service`, rendering onto `surface`.
    ///
    /// Downloads default to the current directory and the clipboard chain
    /// is opened on first use; override both with the `with_*` methods.
    pub fn new(
        config: &WorkflowConfig,
        surface: S,
        service: Arc<dyn ConversionService>,
    ) -> (Self, ControllerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let workflow = Workflow::new(surface, config);
        let (snapshots, snapshot_rx) = watch::channel(workflow.snapshot());

        let controller = Self {
            workflow,
            config: config.clone(),
            service,
            downloader: Box::new(DirectoryDownloader::new(".")),
            clipboard: None,
            rx,
            weak_tx: tx.downgrade(),
            snapshots,
            ticker: None,
        };
        let handle = ControllerHandle {
            tx,
            snapshots: snapshot_rx,
        };
        (controller, handle)
    }

    /// Create a controller posting to `config.endpoint` over HTTP.
    pub fn http(config: &WorkflowConfig, surface: S) -> Result<(Self, ControllerHandle), MdropError> {
        let service = HttpConversionService::new(config)?;
        Ok(Self::new(config, surface, Arc::new(service)))
    }

    pub fn with_downloader(mut self, downloader: Box<dyn Downloader>) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn with_clipboard(mut self, clipboard: ClipboardChain) -> Self {
        self.clipboard = Some(clipboard);
        self
    }

    /// Run the event loop on a new tokio task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run the event loop until shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        info!("Upload controller started (endpoint {})", self.config.endpoint);
        while let Some(event) = self.rx.recv().await {
            if matches!(event, Event::Shutdown) {
                break;
            }
            self.dispatch(event);
            self.snapshots.send_replace(self.workflow.snapshot());
        }
        self.stop_ticker(None);
        info!("Upload controller stopped");
    }

    fn dispatch(&mut self, event: Event) {
        match event {
            Event::Input(input) => {
                let handled = self.workflow.handle_input(input);
                self.execute(handled.commands);
            }
            Event::Tick { id, step } => self.workflow.on_tick(id, step),
            Event::Response { id, outcome } => {
                let commands = self.workflow.on_response(id, outcome);
                self.execute(commands);
            }
            Event::HideProgress(id) => self.workflow.on_hide_timer(id),
            Event::NoticeExpired(id) => self.workflow.on_notice_expired(id),
            Event::DismissNotice => self.workflow.dismiss_notice(),
            Event::Download(reply) => {
                let outcome = self.workflow.download(self.downloader.as_mut());
                self.execute(outcome.commands);
                let _ = reply.send(outcome.result);
            }
            Event::Copy(reply) => {
                let clipboard = self.clipboard.get_or_insert_with(ClipboardChain::platform);
                let outcome = self.workflow.copy(clipboard);
                self.execute(outcome.commands);
                let _ = reply.send(outcome.result);
            }
            Event::Shutdown => {}
        }
    }

    fn execute(&mut self, commands: Vec<Command>) {
        for command in commands {
            match command {
                Command::StartTicker(id) => self.start_ticker(id),
                Command::StopTicker(id) => self.stop_ticker(Some(id)),
                Command::SendRequest(submission) => self.send_request(submission),
                Command::ScheduleHide { id, after } => {
                    self.schedule(after, Event::HideProgress(id));
                }
                Command::ScheduleNoticeExpiry { id, after } => {
                    self.schedule(after, Event::NoticeExpired(id));
                }
            }
        }
    }

    fn start_ticker(&mut self, id: SubmissionId) {
        self.stop_ticker(None);

        let weak = self.weak_tx.clone();
        let period = self.config.tick_interval();
        let seed = self.config.seed.map(|s| s.wrapping_add(id.0));
        let mut steps = StepSource::new(self.config.min_step, self.config.max_step, seed);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                let Some(tx) = weak.upgrade() else { break };
                let step = steps.next_step();
                if tx.send(Event::Tick { id, step }).is_err() {
                    break;
                }
            }
        });
        debug!("Ticker started for submission {}", id);
        self.ticker = Some((id, handle));
    }

    /// Abort the running ticker, or only the one belonging to `id`.
    fn stop_ticker(&mut self, id: Option<SubmissionId>) {
        let matches = match (&self.ticker, id) {
            (Some((running, _)), Some(id)) => *running == id,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if matches {
            if let Some((running, handle)) = self.ticker.take() {
                handle.abort();
                debug!("Ticker stopped for submission {}", running);
            }
        }
    }

    fn send_request(&self, submission: Submission) {
        let weak = self.weak_tx.clone();
        let service = Arc::clone(&self.service);
        let id = submission.id;

        tokio::spawn(async move {
            // Run the exchange on its own task so a panic inside the service
            // still settles the submission.
            let exchange = tokio::spawn(async move {
                service::convert(service.as_ref(), &submission.file).await
            });
            let outcome = match exchange.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Request task for submission {} aborted: {}", id, e);
                    Err(ConversionFailure::transport(e))
                }
            };
            if let Some(tx) = weak.upgrade() {
                let _ = tx.send(Event::Response { id, outcome });
            }
        });
    }

    fn schedule(&self, after: Duration, event: Event) {
        let weak = self.weak_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(tx) = weak.upgrade() {
                let _ = tx.send(event);
            }
        });
    }
}

/// How the workflow finished with one selected file.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    /// The request completed; the snapshot's phase says how.
    Settled(WorkflowSnapshot),
    /// The extension allow-list turned the file away. No request was sent.
    Rejected(WorkflowSnapshot),
}

impl Settlement {
    pub fn snapshot(&self) -> &WorkflowSnapshot {
        match self {
            Settlement::Settled(s) | Settlement::Rejected(s) => s,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Settlement::Settled(s) if s.phase == UiPhase::Success)
    }
}

/// Cloneable handle used by hosts to feed input and trigger actions.
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<Event>,
    snapshots: watch::Receiver<WorkflowSnapshot>,
}

impl ControllerHandle {
    /// Forward a raw input event.
    ///
    /// Hosts decide synchronously whether to suppress default handling via
    /// [`InputEvent::is_drag`]; the workflow applies the event asynchronously.
    pub fn input(&self, event: InputEvent) -> Result<(), MdropError> {
        self.send(Event::Input(event))
    }

    /// Equivalent to a file-picker change. `None` is a cancelled picker.
    pub fn select_file(&self, file: Option<FileRef>) -> Result<(), MdropError> {
        self.input(InputEvent::PickerChange {
            files: file.into_iter().collect(),
        })
    }

    /// Equivalent to dropping `files` on the drop target.
    pub fn drop_files(&self, files: Vec<FileRef>) -> Result<(), MdropError> {
        self.input(InputEvent::Drop { files })
    }

    pub fn dismiss_notice(&self) -> Result<(), MdropError> {
        self.send(Event::DismissNotice)
    }

    /// Download the current artifact.
    pub async fn download(&self) -> Result<Result<PathBuf, ActionError>, MdropError> {
        let (reply, rx) = oneshot::channel();
        self.send(Event::Download(reply))?;
        rx.await.map_err(|_| MdropError::ControllerClosed)
    }

    /// Copy the current artifact to the clipboard.
    pub async fn copy(&self) -> Result<Result<CopyMethod, ActionError>, MdropError> {
        let (reply, rx) = oneshot::channel();
        self.send(Event::Copy(reply))?;
        rx.await.map_err(|_| MdropError::ControllerClosed)
    }

    /// Latest published state.
    pub fn snapshot(&self) -> WorkflowSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkflowSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until a published snapshot satisfies `predicate`.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&WorkflowSnapshot) -> bool,
    ) -> Result<WorkflowSnapshot, MdropError> {
        let mut rx = self.snapshots.clone();
        let snapshot = rx
            .wait_for(predicate)
            .await
            .map_err(|_| MdropError::ControllerClosed)?;
        Ok(snapshot.clone())
    }

    /// Wait until `count` submissions have reached a terminal phase.
    pub async fn wait_for_settled(&self, count: u64) -> Result<WorkflowSnapshot, MdropError> {
        self.wait_for(|s| s.settled >= count).await
    }

    /// Select `file` and wait until the workflow is done with it: either the
    /// submission settled or the file was rejected before any request.
    ///
    /// Selections must not overlap; the outcome is read from the settled and
    /// rejected counters, which only one caller at a time can attribute.
    pub async fn submit_and_wait(&self, file: FileRef) -> Result<Settlement, MdropError> {
        let before = self.snapshot();
        self.select_file(Some(file))?;
        let after = self
            .wait_for(|s| s.settled > before.settled || s.rejected > before.rejected)
            .await?;
        if after.rejected > before.rejected {
            Ok(Settlement::Rejected(after))
        } else {
            Ok(Settlement::Settled(after))
        }
    }

    /// Stop the event loop. Pending replies are discarded.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Event::Shutdown);
    }

    fn send(&self, event: Event) -> Result<(), MdropError> {
        self.tx.send(event).map_err(|_| MdropError::ControllerClosed)
    }
}
