//! Notifier that records what it is told.

use crate::application::ports::DenialNotifier;
use crate::domain::decision::DenialNotice;
use crate::error::NotifierError;
use std::sync::{Arc, Mutex};

/// Collects every [`DenialNotice`], optionally failing each call afterwards.
///
/// Notices are recorded even when the call fails, so tests can assert on
/// attempts as well as outcomes.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notices: Arc<Mutex<Vec<DenialNotice>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `notify` fail with `reason`.
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self
            .failure
            .lock()
            .expect("RecordingNotifier mutex poisoned") = Some(reason.into());
    }

    /// Stop failing.
    pub fn recover(&self) {
        *self
            .failure
            .lock()
            .expect("RecordingNotifier mutex poisoned") = None;
    }

    pub fn notices(&self) -> Vec<DenialNotice> {
        self.notices
            .lock()
            .expect("RecordingNotifier mutex poisoned")
            .clone()
    }

    /// Denied addresses in notification order.
    pub fn addresses(&self) -> Vec<String> {
        self.notices()
            .into_iter()
            .map(|notice| notice.address)
            .collect()
    }
}

impl DenialNotifier for RecordingNotifier {
    fn notify(&self, notice: &DenialNotice) -> Result<(), NotifierError> {
        self.notices
            .lock()
            .expect("RecordingNotifier mutex poisoned")
            .push(notice.clone());

        match self
            .failure
            .lock()
            .expect("RecordingNotifier mutex poisoned")
            .as_ref()
        {
            Some(reason) => Err(NotifierError::new(reason.clone())),
            None => Ok(()),
        }
    }
}
