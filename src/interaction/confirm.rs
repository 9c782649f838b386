//! Asynchronous yes/no gate for destructive operations.
//!
//! The requesting side gets a [`Confirmation`] it can await; the host answers
//! through [`ConfirmationFlow::respond`]. Only one prompt can be outstanding.

use serde::Serialize;
use tokio::sync::oneshot;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConfirmPrompt {
    pub title: String,
    pub message: String,
}

/// Awaitable answer to a prompt. Resolves to `false` if the flow is torn down
/// before the user answers.
#[derive(Debug)]
pub struct Confirmation {
    inner: ConfirmationInner,
}

#[derive(Debug)]
enum ConfirmationInner {
    Ready(bool),
    Waiting(oneshot::Receiver<bool>),
}

impl Confirmation {
    pub fn resolved(answer: bool) -> Self {
        Self { inner: ConfirmationInner::Ready(answer) }
    }

    pub async fn wait(self) -> bool {
        match self.inner {
            ConfirmationInner::Ready(answer) => answer,
            ConfirmationInner::Waiting(rx) => rx.await.unwrap_or(false),
        }
    }

    /// Non-blocking check, for hosts without an async runtime.
    pub fn try_answer(&mut self) -> Option<bool> {
        match &mut self.inner {
            ConfirmationInner::Ready(answer) => Some(*answer),
            ConfirmationInner::Waiting(rx) => match rx.try_recv() {
                Ok(answer) => Some(answer),
                Err(oneshot::error::TryRecvError::Empty) => None,
                Err(oneshot::error::TryRecvError::Closed) => Some(false),
            },
        }
    }
}

#[derive(Debug, Default)]
pub struct ConfirmationFlow {
    pending: Option<(ConfirmPrompt, oneshot::Sender<bool>)>,
}

impl ConfirmationFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The prompt the host should currently show.
    pub fn prompt(&self) -> Option<&ConfirmPrompt> {
        self.pending.as_ref().map(|(p, _)| p)
    }

    /// Open a prompt. While another is outstanding the new request is refused
    /// with an immediate `false`.
    pub fn request(&mut self, prompt: ConfirmPrompt) -> Confirmation {
        if self.pending.is_some() {
            log::warn!("confirmation already pending; refusing \"{}\"", prompt.title);
            return Confirmation::resolved(false);
        }
        let (tx, rx) = oneshot::channel();
        self.pending = Some((prompt, tx));
        Confirmation { inner: ConfirmationInner::Waiting(rx) }
    }

    /// Deliver the user's answer and clear the prompt. Returns false when no
    /// prompt was open.
    pub fn respond(&mut self, answer: bool) -> bool {
        match self.pending.take() {
            Some((_, tx)) => {
                // The requester may have stopped waiting; the prompt is cleared either way.
                let _ = tx.send(answer);
                true
            }
            None => false,
        }
    }

    /// Drop any open prompt; its waiter sees `false`.
    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt() -> ConfirmPrompt {
        ConfirmPrompt { title: "Delete Confirmation".into(), message: "sure?".into() }
    }

    #[tokio::test]
    async fn answer_reaches_waiter_and_clears_prompt() {
        let mut flow = ConfirmationFlow::new();
        let c = flow.request(prompt());
        assert!(flow.is_pending());
        assert!(flow.respond(true));
        assert!(!flow.is_pending());
        assert!(c.wait().await);
    }

    #[tokio::test]
    async fn second_request_is_refused_while_pending() {
        let mut flow = ConfirmationFlow::new();
        let first = flow.request(prompt());
        let second = flow.request(prompt());
        assert!(!second.wait().await);
        flow.respond(false);
        assert!(!first.wait().await);
    }

    #[tokio::test]
    async fn cancel_resolves_false() {
        let mut flow = ConfirmationFlow::new();
        let c = flow.request(prompt());
        flow.cancel();
        assert!(!c.wait().await);
    }

    #[test]
    fn try_answer_polls_without_runtime() {
        let mut flow = ConfirmationFlow::new();
        let mut c = flow.request(prompt());
        assert_eq!(c.try_answer(), None);
        flow.respond(true);
        assert_eq!(c.try_answer(), Some(true));
    }
}
