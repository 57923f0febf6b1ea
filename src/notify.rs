use async_trait::async_trait;
use tracing::info;

/// A message addressed to a single user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

impl Notification {
    pub fn activation(to: &str, link: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "AppSick - Account activation".into(),
            text: format!("Click the link to activate your account: {link}"),
            html: Some(format!(
                "<p>Click <a href='{link}'>here</a> to activate your account.</p>"
            )),
        }
    }

    pub fn password_reset(to: &str, link: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "AppSick - Password reset".into(),
            text: format!("POST {link}\nBODY: {{ \"password\": \"newPassword\" }}"),
            html: None,
        }
    }
}

/// Delivers account links to users. Retries, if any, are the implementation's business.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: Notification) -> anyhow::Result<()>;
}

/// Writes notifications to the log instead of delivering them.
#[derive(Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: Notification) -> anyhow::Result<()> {
        // The body carries a live token, so it only goes out at debug level.
        info!(
            to = %message.to,
            subject = %message.subject,
            html = message.html.is_some(),
            "notification dispatched"
        );
        tracing::debug!(text = %message.text, "notification body");
        Ok(())
    }
}
