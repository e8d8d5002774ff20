//! Input acquisition: fold the drop target and file picker into one event.
//!
//! Two channels can produce a file (a drag-and-drop onto the drop target and
//! a change on the file picker) and two can open the picker (pointer click
//! and keyboard activation). [`interpret`] maps each raw [`InputEvent`] to an
//! [`Interpretation`]: whether the host must suppress its default handling,
//! how the drop-target marking changes, and what the workflow should do.

use crate::submission::FileRef;

/// A keyboard key delivered while the drop target has focus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Enter,
    Space,
    Other(String),
}

impl Key {
    /// Primary activation keys open the file picker.
    pub fn is_activation(&self) -> bool {
        matches!(self, Key::Enter | Key::Space)
    }
}

/// Raw user input arriving from the presentation layer.
#[derive(Debug, Clone)]
pub enum InputEvent {
    DragEnter,
    DragOver,
    DragLeave,
    /// Files carried by a drop. May be empty.
    Drop { files: Vec<FileRef> },
    /// Files chosen in the picker. Empty when the picker was cancelled.
    PickerChange { files: Vec<FileRef> },
    /// Pointer activation of the drop target.
    Click,
    Key(Key),
}

impl InputEvent {
    pub fn is_drag(&self) -> bool {
        matches!(
            self,
            InputEvent::DragEnter
                | InputEvent::DragOver
                | InputEvent::DragLeave
                | InputEvent::Drop { .. }
        )
    }
}

/// What the workflow should do in response to an input event.
#[derive(Debug, Clone)]
pub enum InputAction {
    None,
    OpenPicker,
    /// A file-bearing channel fired. `None` means no file was present.
    Submit(Option<FileRef>),
}

/// Result of [`interpret`].
#[derive(Debug, Clone)]
pub struct Interpretation {
    /// Host must cancel default handling (browser navigation on drop).
    pub prevent_default: bool,
    /// New drop-target marking, when the event changes it.
    pub drop_active: Option<bool>,
    pub action: InputAction,
}

/// Normalise one raw input event.
///
/// Only the first file of a multi-file drop or selection is taken.
pub fn interpret(event: InputEvent) -> Interpretation {
    let prevent_default = event.is_drag();
    let (drop_active, action) = match event {
        InputEvent::DragEnter | InputEvent::DragOver => (Some(true), InputAction::None),
        InputEvent::DragLeave => (Some(false), InputAction::None),
        InputEvent::Drop { files } => (Some(false), InputAction::Submit(files.into_iter().next())),
        InputEvent::PickerChange { files } => (None, InputAction::Submit(files.into_iter().next())),
        InputEvent::Click => (None, InputAction::OpenPicker),
        InputEvent::Key(key) if key.is_activation() => (None, InputAction::OpenPicker),
        InputEvent::Key(_) => (None, InputAction::None),
    };
    Interpretation {
        prevent_default,
        drop_active,
        action,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drag_events_mark_and_unmark() {
        let i = interpret(InputEvent::DragEnter);
        assert!(i.prevent_default);
        assert_eq!(i.drop_active, Some(true));

        let i = interpret(InputEvent::DragOver);
        assert_eq!(i.drop_active, Some(true));

        let i = interpret(InputEvent::DragLeave);
        assert!(i.prevent_default);
        assert_eq!(i.drop_active, Some(false));
    }

    #[test]
    fn empty_drop_still_clears_marking() {
        let i = interpret(InputEvent::Drop { files: vec![] });
        assert!(i.prevent_default);
        assert_eq!(i.drop_active, Some(false));
        assert!(matches!(i.action, InputAction::Submit(None)));
    }

    #[test]
    fn multi_file_drop_takes_first() {
        let files = vec![
            FileRef::from_bytes("a.pdf", b"a".to_vec()),
            FileRef::from_bytes("b.pdf", b"b".to_vec()),
        ];
        match interpret(InputEvent::Drop { files }).action {
            InputAction::Submit(Some(f)) => assert_eq!(f.name(), "a.pdf"),
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn picker_change_does_not_touch_marking() {
        let i = interpret(InputEvent::PickerChange { files: vec![] });
        assert!(!i.prevent_default);
        assert_eq!(i.drop_active, None);
        assert!(matches!(i.action, InputAction::Submit(None)));
    }

    #[test]
    fn activation_keys_open_picker() {
        for key in [Key::Enter, Key::Space] {
            assert!(matches!(
                interpret(InputEvent::Key(key)).action,
                InputAction::OpenPicker
            ));
        }
        assert!(matches!(
            interpret(InputEvent::Key(Key::Other("Tab".into()))).action,
            InputAction::None
        ));
        assert!(matches!(
            interpret(InputEvent::Click).action,
            InputAction::OpenPicker
        ));
    }
}
