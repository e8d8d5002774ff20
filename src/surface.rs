//! Presentation port driven by the workflow.
//!
//! The surface is a passive renderer: it never reads workflow state, it only
//! receives writes. Hosts implement [`PresentationSurface`] for whatever they
//! draw on (a terminal, a web view, a GUI toolkit). [`HeadlessSurface`]
//! records every write so embedders and tests can run the workflow without
//! any display at all.
//!
//! All methods have default no-op implementations so a host only overrides
//! what it actually renders.

use crate::notice::Notice;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

/// Rendering port written to by [`crate::workflow::Workflow`].
///
/// Calls are serialised by the controller's event loop; an implementation
/// never sees two writes concurrently.
pub trait PresentationSurface: Send {
    /// Mark or unmark the drop target as an active drop candidate.
    fn set_drop_active(&mut self, active: bool) {
        let _ = active;
    }

    fn set_progress_visible(&mut self, visible: bool) {
        let _ = visible;
    }

    /// Percentage in `0..=100`.
    fn set_progress(&mut self, percent: u8) {
        let _ = percent;
    }

    /// Populate and show the preview (`Some`) or hide it (`None`).
    fn set_preview(&mut self, markdown: Option<&str>) {
        let _ = markdown;
    }

    /// Show or hide the explanatory "how it works" section.
    fn set_help_visible(&mut self, visible: bool) {
        let _ = visible;
    }

    /// Replace whatever notice is showing with `notice`.
    fn show_notice(&mut self, notice: &Notice) {
        let _ = notice;
    }

    fn clear_notice(&mut self) {}

    /// Reset the file picker so choosing the same file again fires a change.
    fn clear_file_input(&mut self) {}

    fn open_file_picker(&mut self) {}
}

impl<S: PresentationSurface + ?Sized> PresentationSurface for Box<S> {
    fn set_drop_active(&mut self, active: bool) {
        (**self).set_drop_active(active)
    }
    fn set_progress_visible(&mut self, visible: bool) {
        (**self).set_progress_visible(visible)
    }
    fn set_progress(&mut self, percent: u8) {
        (**self).set_progress(percent)
    }
    fn set_preview(&mut self, markdown: Option<&str>) {
        (**self).set_preview(markdown)
    }
    fn set_help_visible(&mut self, visible: bool) {
        (**self).set_help_visible(visible)
    }
    fn show_notice(&mut self, notice: &Notice) {
        (**self).show_notice(notice)
    }
    fn clear_notice(&mut self) {
        (**self).clear_notice()
    }
    fn clear_file_input(&mut self) {
        (**self).clear_file_input()
    }
    fn open_file_picker(&mut self) {
        (**self).open_file_picker()
    }
}

/// Everything a [`HeadlessSurface`] has been told to display.
#[derive(Debug, Clone, Serialize)]
pub struct SurfaceState {
    pub drop_active: bool,
    pub progress_visible: bool,
    pub progress: u8,
    /// Every value written to the bar, in order.
    pub progress_history: Vec<u8>,
    pub preview: Option<String>,
    pub help_visible: bool,
    pub notice: Option<Notice>,
    /// Every notice ever shown, in order.
    pub notice_history: Vec<Notice>,
    pub file_input_clears: usize,
    pub picker_opens: usize,
}

impl Default for SurfaceState {
    fn default() -> Self {
        Self {
            drop_active: false,
            progress_visible: false,
            progress: 0,
            progress_history: Vec::new(),
            preview: None,
            help_visible: true,
            notice: None,
            notice_history: Vec::new(),
            file_input_clears: 0,
            picker_opens: 0,
        }
    }
}

/// Recording surface. Clones share the same state, so a host can keep one
/// clone for inspection while the controller owns another.
#[derive(Debug, Clone, Default)]
pub struct HeadlessSurface {
    state: Arc<Mutex<SurfaceState>>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current display state.
    pub fn snapshot(&self) -> SurfaceState {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, SurfaceState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PresentationSurface for HeadlessSurface {
    fn set_drop_active(&mut self, active: bool) {
        self.lock().drop_active = active;
    }

    fn set_progress_visible(&mut self, visible: bool) {
        self.lock().progress_visible = visible;
    }

    fn set_progress(&mut self, percent: u8) {
        let mut s = self.lock();
        s.progress = percent;
        s.progress_history.push(percent);
    }

    fn set_preview(&mut self, markdown: Option<&str>) {
        self.lock().preview = markdown.map(str::to_owned);
    }

    fn set_help_visible(&mut self, visible: bool) {
        self.lock().help_visible = visible;
    }

    fn show_notice(&mut self, notice: &Notice) {
        let mut s = self.lock();
        s.notice = Some(notice.clone());
        s.notice_history.push(notice.clone());
    }

    fn clear_notice(&mut self) {
        self.lock().notice = None;
    }

    fn clear_file_input(&mut self) {
        self.lock().file_input_clears += 1;
    }

    fn open_file_picker(&mut self) {
        self.lock().picker_opens += 1;
    }
}
