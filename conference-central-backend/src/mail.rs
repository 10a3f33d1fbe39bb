use async_trait::async_trait;
use tracing::info;

use crate::error::AppError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Mail {
    /// Sent to the organizer after a conference was created.
    #[must_use]
    pub fn conference_created(to: String, conference_info: &str) -> Self {
        Self {
            to,
            subject: "You created a new Conference!".to_owned(),
            body: format!("Hi, you have created a following conference:\r\n\r\n{conference_info}"),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: Mail) -> Result<(), AppError>;
}

/// Writes mails to the log instead of delivering them.
pub struct LogMailer {
    sender: String,
}

impl LogMailer {
    #[must_use]
    pub const fn new(sender: String) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: Mail) -> Result<(), AppError> {
        info!(
            from = %self.sender,
            to = %mail.to,
            subject = %mail.subject,
            "sending mail:\n{}",
            mail.body
        );
        Ok(())
    }
}
