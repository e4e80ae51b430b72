//! Per-session dispatch state.
//!
//! Everything the operator configures before pressing send lives here and is
//! owned by exactly one controller: the selection mode, the explicit
//! selection, the message draft, staged resources, and which dialog is open.

use std::collections::HashSet;

use cardmail_common::error::ValidationFailure;
use cardmail_common::types::{
    CanonicalEmail, ContactRecord, RecipientSet, Resource, ResourceKind, SelectionMode,
    StorageRef,
};

use crate::job::MessageDraft;
use crate::resolver::RecipientResolver;

/// Which overlay the view layer should render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DialogState {
    #[default]
    Closed,
    /// Picking people to include or exclude.
    PeoplePicker(SelectionMode),
    /// Previewing an uploaded image, such as the signature.
    ImageViewer(StorageRef),
}

#[derive(Debug, Clone, Default)]
pub struct DispatchSession {
    pub draft: MessageDraft,
    /// Explicit sender identity; overrides the selected catalog name.
    pub sender: Option<String>,
    mode: Option<SelectionMode>,
    selection: Vec<CanonicalEmail>,
    attachment: Option<Resource>,
    signature: Option<Resource>,
    dialog: DialogState,
}

impl DispatchSession {
    pub fn new(draft: MessageDraft) -> Self {
        Self {
            draft,
            ..Default::default()
        }
    }

    pub fn mode(&self) -> Option<SelectionMode> {
        self.mode
    }

    pub fn dialog(&self) -> &DialogState {
        &self.dialog
    }

    /// Choose a selection mode. Include/exclude start from an empty
    /// selection and open the people picker.
    pub fn set_mode(&mut self, mode: SelectionMode) {
        if self.mode != Some(mode) {
            self.selection.clear();
        }
        self.mode = Some(mode);
        self.dialog = match mode {
            SelectionMode::All => DialogState::Closed,
            picking => DialogState::PeoplePicker(picking),
        };
    }

    /// Add the email if absent, remove it if present. Returns whether it is
    /// selected afterwards.
    pub fn toggle(&mut self, email: CanonicalEmail) -> bool {
        if let Some(pos) = self.selection.iter().position(|e| *e == email) {
            self.selection.remove(pos);
            false
        } else {
            self.selection.push(email);
            true
        }
    }

    pub fn is_selected(&self, email: &CanonicalEmail) -> bool {
        self.selection.contains(email)
    }

    /// Explicit selection in the order it was made.
    pub fn selection(&self) -> &[CanonicalEmail] {
        &self.selection
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Resolve recipients against the given (currently filtered) population.
    pub fn resolve(&self, population: &[ContactRecord]) -> Result<RecipientSet, ValidationFailure> {
        let mode = self.mode.ok_or(ValidationFailure::NoSelectionMode)?;
        let explicit: HashSet<CanonicalEmail> = self.selection.iter().cloned().collect();
        Ok(RecipientResolver::resolve(population, mode, &explicit))
    }

    /// Stage a resource in its slot, replacing any previous one.
    pub fn stage(&mut self, resource: Resource) {
        match resource.kind {
            ResourceKind::Attachment => self.attachment = Some(resource),
            ResourceKind::Signature => self.signature = Some(resource),
        }
    }

    pub fn unstage(&mut self, kind: ResourceKind) -> Option<Resource> {
        match kind {
            ResourceKind::Attachment => self.attachment.take(),
            ResourceKind::Signature => self.signature.take(),
        }
    }

    pub fn attachment(&self) -> Option<&Resource> {
        self.attachment.as_ref()
    }

    pub fn signature(&self) -> Option<&Resource> {
        self.signature.as_ref()
    }

    pub fn open_image(&mut self, reference: StorageRef) {
        self.dialog = DialogState::ImageViewer(reference);
    }

    pub fn close_dialog(&mut self) {
        self.dialog = DialogState::Closed;
    }

    /// Uploaded references are single-use, so staged files are dropped
    /// once a job carrying them has been accepted.
    pub fn reset_after_dispatch(&mut self) {
        self.attachment = None;
        self.signature = None;
        self.dialog = DialogState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(raw: &str) -> CanonicalEmail {
        CanonicalEmail::parse(raw).unwrap()
    }

    fn population() -> Vec<ContactRecord> {
        ["p1@x.com", "p2@x.com", "p3@x.com"]
            .iter()
            .map(|e| ContactRecord {
                name: e.to_string(),
                email: e.to_string(),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_resolve_without_mode_fails() {
        let session = DispatchSession::default();
        assert_eq!(
            session.resolve(&population()).unwrap_err(),
            ValidationFailure::NoSelectionMode
        );
    }

    #[test]
    fn test_exclude_mode_opens_picker_and_resolves() {
        let mut session = DispatchSession::default();
        session.set_mode(SelectionMode::Exclude);
        assert_eq!(
            session.dialog(),
            &DialogState::PeoplePicker(SelectionMode::Exclude)
        );
        assert!(session.toggle(email("p2@x.com")));
        session.close_dialog();

        let set = session.resolve(&population()).unwrap();
        let emails: Vec<&str> = set.emails().map(|e| e.as_str()).collect();
        assert_eq!(emails, vec!["p1@x.com", "p3@x.com"]);
    }

    #[test]
    fn test_toggle_twice_deselects() {
        let mut session = DispatchSession::default();
        session.set_mode(SelectionMode::Include);
        assert!(session.toggle(email("p1@x.com")));
        assert!(!session.toggle(email("p1@x.com")));
        assert!(session.selection().is_empty());
    }

    #[test]
    fn test_switching_mode_clears_selection() {
        let mut session = DispatchSession::default();
        session.set_mode(SelectionMode::Include);
        session.toggle(email("p1@x.com"));
        session.set_mode(SelectionMode::Exclude);
        assert!(session.selection().is_empty());

        // Re-choosing the same mode keeps what was picked
        session.toggle(email("p3@x.com"));
        session.set_mode(SelectionMode::Exclude);
        assert_eq!(session.selection(), &[email("p3@x.com")]);
    }

    #[test]
    fn test_include_selection_rescoped_to_filtered_population() {
        let mut session = DispatchSession::default();
        session.set_mode(SelectionMode::Include);
        session.toggle(email("p1@x.com"));
        session.toggle(email("elsewhere@y.com"));

        let set = session.resolve(&population()).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.contains(&email("p1@x.com")));
    }

    #[test]
    fn test_stage_and_reset() {
        let mut session = DispatchSession::default();
        session.stage(Resource::new(ResourceKind::Attachment, "deck.pdf", vec![1, 2]));
        session.stage(Resource::new(ResourceKind::Signature, "sig.png", vec![3]));
        session.open_image(StorageRef("./attachments/sig.png".to_string()));
        assert!(session.attachment().is_some());

        session.reset_after_dispatch();
        assert!(session.attachment().is_none());
        assert!(session.signature().is_none());
        assert_eq!(session.dialog(), &DialogState::Closed);
    }
}
