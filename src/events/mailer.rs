// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Outbound notification email.
//!
//! With an API key configured, mail goes out through the Resend HTTP API.
//! Without one, messages are only logged so local setups need no provider.

#[cfg(test)]
use std::sync::{Arc, Mutex};

use reqwest::Client;
use serde::Serialize;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

pub const WELCOME_SUBJECT: &str = "Welcome to Spring Blog API!";
pub const RESET_LINK_SUBJECT: &str = "Blog App - Password Reset Link";
pub const RESET_SUCCESS_SUBJECT: &str = "Blog App - Password Reset Success";

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Failed to send welcome email: {0}")]
    Welcome(String),

    #[error("Failed to send password reset link: {0}")]
    ResetLink(String),

    #[error("Failed to send password reset success email: {0}")]
    ResetSuccess(String),
}

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
}

#[derive(Clone)]
pub enum Mailer {
    Resend {
        client: Client,
        api_key: String,
        from: String,
    },
    Log,
    #[cfg(test)]
    Recording(Arc<Mutex<Vec<OutgoingMail>>>),
}

impl Mailer {
    /// Resend when `api_key` is non-empty, log-only otherwise.
    pub fn from_settings(api_key: &str, from: &str) -> Self {
        if api_key.trim().is_empty() {
            tracing::info!("No mail API key configured, notification emails will only be logged");
            return Mailer::Log;
        }
        Mailer::Resend {
            client: Client::new(),
            api_key: api_key.to_string(),
            from: from.to_string(),
        }
    }

    pub async fn send_welcome(&self, to: &str, username: &str) -> Result<(), MailError> {
        let html = format!(
            r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
            <h2>Welcome, {username}!</h2>
            <p>Your account is ready. Start writing and bookmarking posts right away.</p>
            </div>"#,
            username = escape_html(username),
        );
        self.deliver(to, WELCOME_SUBJECT, html)
            .await
            .map_err(MailError::Welcome)
    }

    pub async fn send_reset_link(&self, to: &str, username: &str, reset_link: &str) -> Result<(), MailError> {
        let html = format!(
            r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
            <h2>Hello {username},</h2>
            <p>We received a request to reset your password.</p>
            <p><a href="{link}">Reset your password</a></p>
            <p style="color: #666;">If you did not request this, please ignore this email.</p>
            </div>"#,
            username = escape_html(username),
            link = escape_html(reset_link),
        );
        self.deliver(to, RESET_LINK_SUBJECT, html)
            .await
            .map_err(MailError::ResetLink)
    }

    pub async fn send_reset_success(&self, to: &str, username: &str) -> Result<(), MailError> {
        let html = format!(
            r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
            <h2>Hello {username},</h2>
            <p>Your password has been changed. All other sessions were signed out.</p>
            </div>"#,
            username = escape_html(username),
        );
        self.deliver(to, RESET_SUCCESS_SUBJECT, html)
            .await
            .map_err(MailError::ResetSuccess)
    }

    async fn deliver(&self, to: &str, subject: &str, html: String) -> Result<(), String> {
        match self {
            Mailer::Resend { client, api_key, from } => {
                let request = ResendRequest {
                    from,
                    to: vec![to],
                    subject,
                    html: &html,
                };
                let response = client
                    .post(RESEND_ENDPOINT)
                    .bearer_auth(api_key)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| format!("email send failed: {e}"))?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(format!("email API error ({status}): {body}"));
                }
                tracing::debug!(to = %to, subject = %subject, "Email sent");
                Ok(())
            }
            Mailer::Log => {
                tracing::info!(to = %to, subject = %subject, "Email delivery skipped (log-only mailer)");
                Ok(())
            }
            #[cfg(test)]
            Mailer::Recording(sent) => {
                let mut sent = sent.lock().map_err(|_| "recording mailer poisoned".to_string())?;
                sent.push(OutgoingMail {
                    to: to.to_string(),
                    subject: subject.to_string(),
                    html,
                });
                Ok(())
            }
        }
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn recording() -> (Mailer, Arc<Mutex<Vec<OutgoingMail>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        (Mailer::Recording(sent.clone()), sent)
    }

    #[test]
    fn empty_key_selects_log_mailer() {
        assert!(matches!(Mailer::from_settings("  ", "a@b.c"), Mailer::Log));
        assert!(matches!(Mailer::from_settings("re_123", "a@b.c"), Mailer::Resend { .. }));
    }

    #[tokio::test]
    async fn reset_link_is_rendered_escaped() {
        let (mailer, sent) = recording();
        mailer
            .send_reset_link("ada@example.com", "<ada>", "https://x/reset?token=a&b")
            .await
            .unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, RESET_LINK_SUBJECT);
        assert!(sent[0].html.contains("&lt;ada&gt;"));
        assert!(sent[0].html.contains("token=a&amp;b"));
    }

    #[test]
    fn error_messages_name_the_notification() {
        let e = MailError::Welcome("timeout".into());
        assert!(e.to_string().starts_with("Failed to send welcome email"));
    }
}
