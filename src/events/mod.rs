// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Domain Events
//!
//! The auth service publishes events after a request has done its work;
//! a background [`NotificationListener`] turns them into emails.
//!
//! Delivery is fire-and-forget. Each event gets its own task, a failed
//! delivery is logged and dropped, and nothing ever reaches the request
//! that triggered it.
//!
//! ```rust,ignore
//! let (publisher, receiver) = EventPublisher::channel();
//! tokio::spawn(NotificationListener::new(receiver, mailer).run(shutdown.clone()));
//! ```

pub mod mailer;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub use mailer::{MailError, Mailer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    UserRegistered {
        email: String,
        username: String,
    },
    ForgotPassword {
        email: String,
        username: String,
        reset_link: String,
    },
    PasswordReset {
        email: String,
        username: String,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::UserRegistered { .. } => "user_registered",
            DomainEvent::ForgotPassword { .. } => "forgot_password",
            DomainEvent::PasswordReset { .. } => "password_reset",
        }
    }
}

/// Sending half of the event channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: mpsc::UnboundedSender<DomainEvent>,
}

impl EventPublisher {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue an event. Never blocks and never fails the caller.
    pub fn publish(&self, event: DomainEvent) {
        let name = event.name();
        if let Err(e) = self.tx.send(event) {
            error!(event = name, error = %e, "Failed to publish event, listener is gone");
        }
    }
}

/// Consumes domain events and sends the matching notification email.
pub struct NotificationListener {
    rx: mpsc::UnboundedReceiver<DomainEvent>,
    mailer: Mailer,
}

impl NotificationListener {
    pub fn new(rx: mpsc::UnboundedReceiver<DomainEvent>, mailer: Mailer) -> Self {
        Self { rx, mailer }
    }

    /// Run until the cancellation token fires or every publisher is dropped.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Notification listener starting");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Notification listener shutting down");
                    return;
                }
                next = self.rx.recv() => match next {
                    Some(event) => {
                        let mailer = self.mailer.clone();
                        tokio::spawn(deliver(mailer, event));
                    }
                    None => {
                        info!("Event channel closed, notification listener stopping");
                        return;
                    }
                },
            }
        }
    }
}

async fn deliver(mailer: Mailer, event: DomainEvent) {
    let name = event.name();
    debug!(event = name, "Handling domain event");

    let result = match &event {
        DomainEvent::UserRegistered { email, username } => mailer.send_welcome(email, username).await,
        DomainEvent::ForgotPassword {
            email,
            username,
            reset_link,
        } => mailer.send_reset_link(email, username, reset_link).await,
        DomainEvent::PasswordReset { email, username } => {
            mailer.send_reset_success(email, username).await
        }
    };

    if let Err(e) = result {
        warn!(event = name, error = %e, "Notification delivery failed");
    }
}
