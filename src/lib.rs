//! # mdrop
//!
//! Submit a document to a Markdown conversion service, watch progress, then
//! preview, copy or download the converted text.
//!
//! ## What lives here
//!
//! The conversion itself happens on a remote service. This crate owns the
//! part with real control flow: the upload workflow. It accepts a file from a
//! drop or a picker, shows simulated progress while the one request per file
//! is outstanding, classifies the reply, and moves the display to a success
//! or failure state. A newer submission always wins over an older one, even
//! when the older reply arrives last.
//!
//! ## Architecture
//!
//! ```text
//! host (terminal, web view, …)
//!  │  InputEvent / actions                 writes
//!  ├──────────────▶ ControllerHandle ──▶ UploadController ──▶ PresentationSurface
//!  │                                        │   ▲
//!  │                                        │   └─ Tick / Response / timers
//!  │                                        ▼
//!  │                              ConversionService (HTTP multipart)
//!  └─ download / copy ──▶ Downloader / ClipboardChain
//! ```
//!
//! * [`workflow`]: the pure state machine, usable without a runtime
//! * [`controller`]: the tokio event loop that schedules ticks, requests
//!   and timers for it
//! * [`surface`], [`service`], [`artifact`]: the ports to the outside world
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mdrop::{FileRef, HeadlessSurface, UploadController, WorkflowConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WorkflowConfig::builder()
//!         .endpoint("http://localhost:5000/convert")
//!         .build()?;
//!     let surface = HeadlessSurface::new();
//!     let (controller, handle) = UploadController::http(&config, surface.clone())?;
//!     controller.spawn();
//!
//!     handle.select_file(Some(FileRef::from_path("report.pdf")))?;
//!     let snapshot = handle.wait_for_settled(1).await?;
//!     println!("{:?}: {:?}", snapshot.phase, surface.snapshot().preview);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mdrop` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod artifact;
pub mod config;
pub mod controller;
pub mod error;
pub mod input;
pub mod notice;
pub mod progress;
pub mod service;
pub mod submission;
pub mod surface;
pub mod workflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use artifact::{
    download_name, Artifact, ClipboardBackend, ClipboardChain, CopyMethod, DirectoryDownloader,
    Downloader, Osc52Clipboard, SystemClipboard,
};
pub use config::{WorkflowConfig, WorkflowConfigBuilder};
pub use controller::{ControllerHandle, Settlement, UploadController};
pub use error::{ActionError, ConversionFailure, MdropError};
pub use input::{InputEvent, Key};
pub use notice::{Notice, NoticeId, Severity};
pub use service::{classify, ConversionService, HttpConversionService, ServiceReply};
pub use submission::{FileRef, Submission, SubmissionId};
pub use surface::{HeadlessSurface, PresentationSurface, SurfaceState};
pub use workflow::{UiPhase, Workflow, WorkflowSnapshot};
