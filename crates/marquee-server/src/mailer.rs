//! Outbound notifications.

use async_trait::async_trait;
use std::fmt;

/// A message to a user. Token fields hold plaintext and must never be logged.
#[derive(Clone, PartialEq, Eq)]
pub enum Notification {
    Welcome {
        user_id: i64,
        activation_token: String,
    },
    Activation {
        activation_token: String,
    },
    PasswordReset {
        reset_token: String,
    },
}

impl Notification {
    pub fn template(&self) -> &'static str {
        match self {
            Notification::Welcome { .. } => "user_welcome",
            Notification::Activation { .. } => "token_activation",
            Notification::PasswordReset { .. } => "token_password_reset",
        }
    }
}

impl fmt::Debug for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("template", &self.template())
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, recipient: &str, notification: &Notification) -> anyhow::Result<()>;
}

/// Records each delivery in the log instead of talking to an SMTP relay.
#[derive(Debug, Clone)]
pub struct LogMailer {
    sender: String,
}

impl LogMailer {
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, recipient: &str, notification: &Notification) -> anyhow::Result<()> {
        tracing::info!(
            sender = %self.sender,
            recipient,
            template = notification.template(),
            "notification delivered"
        );
        Ok(())
    }
}
