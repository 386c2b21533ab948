use serde::{Deserialize, Serialize};

/// Path segments handed to the admin router.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Route(pub Vec<String>);

impl Route {
    pub fn chat_detail(chat_id: &str) -> Self {
        Route(vec![
            "/admin".to_string(),
            "support-chat".to_string(),
            chat_id.to_string(),
        ])
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

/// Which part of a chat row received the click.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClickTarget {
    Row,
    ResolveButton,
}

/// A click on a row of the admin chat list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowEvent {
    pub chat_id: String,
    pub target: ClickTarget,
    propagation_stopped: bool,
}

impl RowEvent {
    pub fn new(chat_id: &str, target: ClickTarget) -> Self {
        Self {
            chat_id: chat_id.to_string(),
            target,
            propagation_stopped: false,
        }
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    /// Where the row itself navigates once the event bubbles up to it.
    pub fn route(&self) -> Option<Route> {
        if self.propagation_stopped {
            None
        } else {
            Some(Route::chat_detail(&self.chat_id))
        }
    }
}
