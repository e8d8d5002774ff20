//! Artifact actions: download and copy-to-clipboard.
//!
//! Both actions operate on the [`Artifact`] bound by the most recent
//! successful conversion and are idempotent: running them twice writes the
//! same file or clipboard content twice.
//!
//! Platform facilities are ports:
//!
//! * [`Downloader`] materialises a named text file.
//!   [`DirectoryDownloader`] writes into a directory through a temp file that
//!   is persisted (and thereby released) inside the same call.
//! * [`ClipboardBackend`] puts text on a clipboard. [`ClipboardChain`] tries
//!   the primary backend when one is available and otherwise falls back to a
//!   synchronous mechanism such as [`Osc52Clipboard`].

use crate::error::ActionError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use tracing::{debug, info, warn};

/// Media type of every produced artifact.
pub const MARKDOWN_MEDIA_TYPE: &str = "text/markdown";

/// Extension appended to derived download names.
pub const MARKDOWN_EXTENSION: &str = "md";

/// Converted text together with the name of the file it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub markdown: String,
    pub source_name: String,
}

impl Artifact {
    /// Download file name: the source name without its extension plus `.md`,
    /// or `<fallback>.md` when no stem remains.
    pub fn file_name(&self, fallback_stem: &str) -> String {
        download_name(&self.source_name, fallback_stem)
    }
}

/// Strip the last extension from `name`.
///
/// Everything from the last dot on is removed, so a dot-file such as
/// `.bashrc` has an empty stem and a trailing dot (`report.`) is dropped.
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(i) => &name[..i],
        None => name,
    }
}

/// Final component of a name that may carry `/` or `\` separators.
fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Derive the download name for an artifact converted from `original`.
///
/// Directory parts of `original` are discarded, so the result is always a
/// single plain file name.
pub fn download_name(original: &str, fallback_stem: &str) -> String {
    let stem = strip_extension(base_name(original.trim()).trim());
    let stem = if stem.trim().is_empty() || stem == "." {
        fallback_stem
    } else {
        stem
    };
    format!("{stem}.{MARKDOWN_EXTENSION}")
}

// ── Download ─────────────────────────────────────────────────────────────

/// Platform download facility.
pub trait Downloader: Send {
    /// Save `contents` under `file_name`. Returns where it landed.
    fn save(&mut self, file_name: &str, media_type: &str, contents: &str)
        -> Result<PathBuf, ActionError>;
}

/// Saves downloads into a fixed directory, replacing same-named files.
#[derive(Debug, Clone)]
pub struct DirectoryDownloader {
    dir: PathBuf,
}

impl DirectoryDownloader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Downloader for DirectoryDownloader {
    fn save(
        &mut self,
        file_name: &str,
        media_type: &str,
        contents: &str,
    ) -> Result<PathBuf, ActionError> {
        if !is_plain_file_name(file_name) {
            return Err(ActionError::Download {
                path: PathBuf::from(file_name),
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "file name must not contain a directory part",
                ),
            });
        }

        let target = self.dir.join(file_name);
        let io_err = |source| ActionError::Download {
            path: target.clone(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(io_err)?;

        // Write to a temp file first so a failed write never leaves a
        // truncated download behind.
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(contents.as_bytes()).map_err(io_err)?;
        tmp.flush().map_err(io_err)?;
        tmp.persist(&target).map_err(|e| io_err(e.error))?;

        debug!("Saved {} ({} bytes) to {}", media_type, contents.len(), target.display());
        Ok(target)
    }
}

/// True when `name` is exactly one normal path component.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

// ── Clipboard ────────────────────────────────────────────────────────────

/// A clipboard mechanism.
pub trait ClipboardBackend: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn write_text(&mut self, text: &str) -> Result<(), ActionError>;
}

type CopyRequest = (String, mpsc::Sender<Result<(), String>>);

/// The operating system clipboard via `arboard`.
///
/// One `arboard::Clipboard` is opened by [`SystemClipboard::open`] and kept
/// on a dedicated owner thread for as long as this value lives. On X11 and
/// Wayland the owning process serves the copied text, so the handle must
/// outlive each write. Dropping the value closes the handle and waits for
/// the owner thread, which lets arboard hand the contents to a clipboard
/// manager before the process exits.
pub struct SystemClipboard {
    requests: Option<mpsc::Sender<CopyRequest>>,
    owner: Option<thread::JoinHandle<()>>,
}

impl SystemClipboard {
    /// Open the platform clipboard. Returns `None` when it is unavailable
    /// (no display server, sandboxed session, unsupported platform).
    pub fn open() -> Option<Self> {
        let opened = Self::open_with(|| {
            let mut clipboard = arboard::Clipboard::new().map_err(|e| e.to_string())?;
            Ok(move |text: String| clipboard.set_text(text).map_err(|e| e.to_string()))
        });
        match opened {
            Ok(clipboard) => Some(clipboard),
            Err(e) => {
                debug!("System clipboard unavailable: {}", e);
                None
            }
        }
    }

    /// Start the owner thread. `open` runs on that thread and yields the
    /// writer every later copy goes through.
    fn open_with<F, W>(open: F) -> Result<Self, String>
    where
        F: FnOnce() -> Result<W, String> + Send + 'static,
        W: FnMut(String) -> Result<(), String> + 'static,
    {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();
        let (requests, inbox) = mpsc::channel::<CopyRequest>();

        let owner = thread::Builder::new()
            .name("mdrop-clipboard".into())
            .spawn(move || {
                let mut write = match open() {
                    Ok(write) => {
                        let _ = ready_tx.send(Ok(()));
                        write
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                for (text, reply) in inbox {
                    let _ = reply.send(write(text));
                }
            })
            .map_err(|e| e.to_string())?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                requests: Some(requests),
                owner: Some(owner),
            }),
            Ok(Err(e)) => {
                let _ = owner.join();
                Err(e)
            }
            Err(_) => Err("clipboard thread exited during startup".into()),
        }
    }
}

impl ClipboardBackend for SystemClipboard {
    fn name(&self) -> &'static str {
        "system"
    }

    fn write_text(&mut self, text: &str) -> Result<(), ActionError> {
        let closed = || ActionError::Clipboard("system clipboard is closed".into());
        let requests = self.requests.as_ref().ok_or_else(closed)?;
        let (reply, outcome) = mpsc::channel();
        requests
            .send((text.to_owned(), reply))
            .map_err(|_| closed())?;
        outcome
            .recv()
            .map_err(|_| closed())?
            .map_err(ActionError::Clipboard)
    }
}

impl Drop for SystemClipboard {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(owner) = self.owner.take() {
            let _ = owner.join();
        }
    }
}

/// Copies through the terminal's selection using the OSC 52 control
/// sequence. Works over SSH and without a display server as long as the
/// terminal emulator honours it.
pub struct Osc52Clipboard<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> Osc52Clipboard<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl Osc52Clipboard<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

/// Encode `text` as an OSC 52 "set clipboard" sequence.
pub fn osc52_sequence(text: &str) -> String {
    format!("\x1b]52;c;{}\x07", STANDARD.encode(text.as_bytes()))
}

impl<W: Write + Send> ClipboardBackend for Osc52Clipboard<W> {
    fn name(&self) -> &'static str {
        "osc52"
    }

    fn write_text(&mut self, text: &str) -> Result<(), ActionError> {
        let sequence = osc52_sequence(text);
        self.out
            .write_all(sequence.as_bytes())
            .and_then(|_| self.out.flush())
            .map_err(|e| ActionError::Clipboard(e.to_string()))
    }
}

/// Which mechanism performed a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMethod {
    Primary,
    Fallback,
}

/// Primary clipboard (when available) with a synchronous fallback.
pub struct ClipboardChain {
    primary: Option<Box<dyn ClipboardBackend>>,
    fallback: Box<dyn ClipboardBackend>,
}

impl ClipboardChain {
    pub fn new(
        primary: Option<Box<dyn ClipboardBackend>>,
        fallback: Box<dyn ClipboardBackend>,
    ) -> Self {
        Self { primary, fallback }
    }

    /// System clipboard when it can be opened, OSC 52 on stderr otherwise.
    pub fn platform() -> Self {
        let primary = SystemClipboard::open().map(|c| Box::new(c) as Box<dyn ClipboardBackend>);
        Self::new(primary, Box::new(Osc52Clipboard::stderr()))
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    /// Copy `text`. The fallback is used only when no primary exists; a
    /// primary that fails is reported as a failure.
    pub fn copy(&mut self, text: &str) -> Result<CopyMethod, ActionError> {
        let (backend, method) = match self.primary.as_mut() {
            Some(p) => (p, CopyMethod::Primary),
            None => (&mut self.fallback, CopyMethod::Fallback),
        };
        match backend.write_text(text) {
            Ok(()) => {
                info!("Copied {} chars via {} clipboard", text.chars().count(), backend.name());
                Ok(method)
            }
            Err(e) => {
                warn!("{} clipboard failed: {}", backend.name(), e);
                Err(e)
            }
        }
    }
}
