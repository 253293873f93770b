use std::sync::Mutex;

use campus_security::Navigator;

/// Navigator that records every redirect instead of performing it.
#[derive(Default)]
pub struct RecordingNavigator {
    calls: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("navigator lock poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().expect("navigator lock poisoned").len()
    }

    pub fn last(&self) -> Option<String> {
        self.calls.lock().expect("navigator lock poisoned").last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        self.calls
            .lock()
            .expect("navigator lock poisoned")
            .push(path.to_string());
    }
}
