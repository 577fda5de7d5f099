use std::fmt;

use reqwest::{Client, Response};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{Event, Level, Subscriber};

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Notification {
    pub level: String,
    pub target: String,
    pub message: String,
}

/// Forwards WARN and ERROR events to a webhook as JSON. Posting happens on a
/// background task, so logging never waits on the network.
#[derive(Clone)]
pub struct WebhookSubscriber {
    sender: mpsc::UnboundedSender<Notification>,
}

async fn send_notification(
    client: &Client,
    url: &str,
    notification: &Notification,
) -> anyhow::Result<Response> {
    Ok(client.post(url).json(notification).send().await?)
}

async fn sender_task(
    mut reader: mpsc::UnboundedReceiver<Notification>,
    client: Client,
    url: String,
) {
    while let Some(notification) = reader.recv().await {
        match send_notification(&client, &url, &notification).await {
            Ok(response) if response.status().is_success() => {}
            // eprintln! because logging here would feed the failure back into the channel
            Ok(response) => eprintln!(
                "Failed to send notification: Received HTTP {}",
                response.status()
            ),
            Err(e) => eprintln!("Failed to send notification: {e}"),
        }
    }
}

impl WebhookSubscriber {
    /// Must be called inside a tokio runtime.
    pub fn new(url: String) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(sender_task(receiver, Client::new(), url));
        Self { sender }
    }

    #[cfg(test)]
    fn with_sender(sender: mpsc::UnboundedSender<Notification>) -> Self {
        Self { sender }
    }

    pub fn notify(&self, notification: Notification) {
        let _ = self.sender.send(notification);
    }
}

impl<S: Subscriber> tracing_subscriber::Layer<S> for WebhookSubscriber {
    fn on_event(&self, event: &Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let level = event.metadata().level();
        if level > &Level::WARN {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.notify(Notification {
            level: level.as_str().to_string(),
            target: event.metadata().target().to_string(),
            message: visitor.to_string(),
        });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl fmt::Display for MessageVisitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
}
