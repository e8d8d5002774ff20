//! Notification surface: at most one notice visible at a time.
//!
//! A new notice replaces the previous one instead of stacking on it. Success
//! and info notices carry an expiry so the controller can schedule their
//! dismissal; danger notices stay until replaced or dismissed by the user.
//! Expiry timers are matched by [`NoticeId`], so a timer for a notice that
//! has already been replaced is a no-op.

use serde::Serialize;
use std::time::Duration;

/// Visual severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Danger,
}

impl Severity {
    /// Style class for HTML-like renderers.
    ///
    /// ```
    /// use mdrop::Severity;
    ///
    /// let html = format!("<div class=\"alert {}\">Saved</div>", Severity::Success.class());
    /// assert_eq!(html, "<div class=\"alert alert-success\">Saved</div>");
    /// ```
    pub fn class(&self) -> &'static str {
        match self {
            Severity::Info => "alert-info",
            Severity::Success => "alert-success",
            Severity::Danger => "alert-danger",
        }
    }

    /// Glyph for terminal renderers.
    pub fn icon(&self) -> &'static str {
        match self {
            Severity::Info => "ℹ",
            Severity::Success => "✔",
            Severity::Danger => "✘",
        }
    }

    pub fn self_dismisses(&self) -> bool {
        !matches!(self, Severity::Danger)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NoticeId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub id: NoticeId,
    pub message: String,
    pub severity: Severity,
}

/// Single-slot holder for the current notice.
#[derive(Debug)]
pub struct NoticeBoard {
    current: Option<Notice>,
    next_id: u64,
    dismiss_after: Duration,
}

impl NoticeBoard {
    pub fn new(dismiss_after: Duration) -> Self {
        Self {
            current: None,
            next_id: 1,
            dismiss_after,
        }
    }

    pub fn current(&self) -> Option<&Notice> {
        self.current.as_ref()
    }

    /// Replace the current notice. Returns the new notice and, for
    /// self-dismissing severities, the delay after which it should expire.
    pub fn post(&mut self, message: impl Into<String>, severity: Severity) -> (Notice, Option<Duration>) {
        let notice = Notice {
            id: NoticeId(self.next_id),
            message: message.into(),
            severity,
        };
        self.next_id += 1;
        self.current = Some(notice.clone());
        let expiry = severity.self_dismisses().then_some(self.dismiss_after);
        (notice, expiry)
    }

    /// Clear the current notice if it is still `id`. Returns whether it was cleared.
    pub fn expire(&mut self, id: NoticeId) -> bool {
        if self.current.as_ref().is_some_and(|n| n.id == id) {
            self.current = None;
            true
        } else {
            false
        }
    }

    /// Clear whatever is showing. Returns whether anything was cleared.
    pub fn clear(&mut self) -> bool {
        self.current.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_notice_replaces_old() {
        let mut board = NoticeBoard::new(Duration::from_secs(5));
        let (first, _) = board.post("one", Severity::Danger);
        let (second, _) = board.post("two", Severity::Success);
        assert_ne!(first.id, second.id);
        assert_eq!(board.current().map(|n| n.message.as_str()), Some("two"));
    }

    #[test]
    fn only_danger_persists() {
        let mut board = NoticeBoard::new(Duration::from_secs(5));
        assert_eq!(board.post("ok", Severity::Success).1, Some(Duration::from_secs(5)));
        assert_eq!(board.post("fyi", Severity::Info).1, Some(Duration::from_secs(5)));
        assert_eq!(board.post("bad", Severity::Danger).1, None);
    }

    #[test]
    fn stale_expiry_is_ignored() {
        let mut board = NoticeBoard::new(Duration::from_secs(5));
        let (old, _) = board.post("converted", Severity::Success);
        let (_new, _) = board.post("failed", Severity::Danger);
        assert!(!board.expire(old.id));
        assert_eq!(board.current().map(|n| n.severity), Some(Severity::Danger));
    }

    #[test]
    fn expiry_clears_matching_notice() {
        let mut board = NoticeBoard::new(Duration::from_secs(5));
        let (n, _) = board.post("converted", Severity::Success);
        assert!(board.expire(n.id));
        assert!(board.current().is_none());
        assert!(!board.clear());
    }

    #[test]
    fn severity_classes() {
        assert_eq!(Severity::Success.class(), "alert-success");
        assert_eq!(Severity::Danger.class(), "alert-danger");
    }
}
