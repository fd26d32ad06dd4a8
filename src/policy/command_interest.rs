use std::cell::RefCell;
use std::rc::Rc;

use crate::fetcher::CertificateRequest;
use crate::packet::{Data, Interest};
use crate::replay::{extract_timestamp, CommandInterestReplayTracker};
use crate::state::ValidationState;

use super::{key_locator_name, ValidationPolicy};

/// Wraps an inner policy with command-Interest replay defense: on `Data`,
/// defers entirely to the inner policy; on `Interest`,
/// checks the embedded timestamp against the replay tracker before
/// delegating signature validation, and arranges for the tracker to be
/// updated only once the signature ultimately verifies.
#[derive(Debug)]
pub struct CommandInterest {
    inner: Box<dyn ValidationPolicy>,
    tracker: Rc<RefCell<CommandInterestReplayTracker>>,
}

impl CommandInterest {
    /// Wraps `inner`, sharing `tracker` with whoever else needs to inspect
    /// replay state (tests, metrics).
    pub fn new(inner: Box<dyn ValidationPolicy>, tracker: Rc<RefCell<CommandInterestReplayTracker>>) -> Self {
        CommandInterest { inner, tracker }
    }
}

impl ValidationPolicy for CommandInterest {
    fn check_policy_data(&self, data: &Data, state: &ValidationState) -> Option<CertificateRequest> {
        self.inner.check_policy_data(data, state)
    }

    fn check_policy_interest(&self, interest: &Interest, state: &ValidationState) -> Option<CertificateRequest> {
        let timestamp = match extract_timestamp(&interest.name) {
            Ok(t) => t,
            Err(e) => {
                state.fail(e);
                return None;
            }
        };
        let key_name = key_locator_name(interest.signature_info.as_ref(), state)?;

        if let Err(e) = self.tracker.borrow_mut().check_timestamp(&key_name, timestamp) {
            state.fail(e);
            return None;
        }

        let request = self.inner.check_policy_interest(interest, state);
        if state.has_outcome() {
            // The inner policy already failed this packet synchronously.
            return None;
        }

        let tracker = self.tracker.clone();
        state.add_success_hook(Box::new(move |_packet| {
            tracker.borrow_mut().insert_new_record(key_name, timestamp);
        }));
        request
    }
}
