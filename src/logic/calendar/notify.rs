// Notifications to whoever is watching the simulation.
use log::info;
use time::Date;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::logic::types::EmailId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    // The player's view of the game should be refreshed.
    ProfileChanged { date: Date },
    NewEmail { email_id: EmailId },
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

// Writes notifications to the log.
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, notification: Notification) {
        match notification {
            Notification::ProfileChanged { date } => info!("Profile changed on {date}"),
            Notification::NewEmail { email_id } => info!("New email {email_id}"),
        }
    }
}

// Sends notifications to a channel, for a front end to pick up.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn build() -> (Self, UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (ChannelSink { sender }, receiver)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        // Nobody listening is not an error.
        let _ = self.sender.send(notification);
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    #[test]
    fn channel_sink_forwards() {
        let (sink, mut receiver) = ChannelSink::build();
        sink.notify(Notification::NewEmail { email_id: 3 });
        sink.notify(Notification::ProfileChanged { date: date!(2025-07-01) });
        assert_eq!(receiver.try_recv().unwrap(), Notification::NewEmail { email_id: 3 });
        assert_eq!(receiver.try_recv().unwrap(), Notification::ProfileChanged { date: date!(2025-07-01) });

        drop(receiver);
        sink.notify(Notification::NewEmail { email_id: 4 });
    }
}
