//! Transient banner state and its expiry timer.

use std::time::Duration;

use tokio::{sync::mpsc, task::JoinHandle, time::Instant};
use tracing::debug;

/// Visible banner content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner {
    /// Nothing shown.
    Cleared,
    /// Message shown until its expiry fires.
    Pending {
        /// Banner text.
        message: String,
    },
}

/// At most one banner, tagged with a generation so that a stale expiry
/// cannot clear a newer message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    generation: u64,
    banner: Banner,
}

impl Default for Notification {
    fn default() -> Self {
        Self {
            generation: 0,
            banner: Banner::Cleared,
        }
    }
}

impl Notification {
    /// Replace the current banner; the returned state carries a new generation.
    pub fn notify(&self, message: impl Into<String>) -> Self {
        Self {
            generation: self.generation + 1,
            banner: Banner::Pending {
                message: message.into(),
            },
        }
    }

    /// Clear the banner if `generation` is still the current one.
    pub fn expire(&self, generation: u64) -> Self {
        if generation != self.generation {
            debug!(
                generation,
                current = self.generation,
                "Ignoring stale notification expiry"
            );
            return self.clone();
        }
        Self {
            generation: self.generation,
            banner: Banner::Cleared,
        }
    }

    /// Generation of the most recent `notify`.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Current banner state.
    pub fn banner(&self) -> &Banner {
        &self.banner
    }

    /// Visible message, if any.
    pub fn message(&self) -> Option<&str> {
        match &self.banner {
            Banner::Pending { message } => Some(message),
            Banner::Cleared => None,
        }
    }
}

/// Single live expiry task. Scheduling a new expiry aborts the previous one.
#[derive(Debug, Default)]
pub struct ExpiryTimer {
    task: Option<JoinHandle<()>>,
}

impl ExpiryTimer {
    /// Fire `on_expire(generation)` into `sender` after `ttl`, replacing any
    /// pending expiry.
    pub fn schedule<E>(
        &mut self,
        generation: u64,
        ttl: Duration,
        sender: mpsc::Sender<E>,
        on_expire: fn(u64) -> E,
    ) where
        E: Send + 'static,
    {
        self.cancel();
        let deadline = Instant::now() + ttl;
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = sender.send(on_expire(generation)).await;
        }));
    }

    /// Abort the pending expiry, if any.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Whether an expiry is still waiting to fire.
    pub fn is_pending(&self) -> bool {
        self.task
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for ExpiryTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
