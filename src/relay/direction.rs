//! Direction classification at MAIL FROM

use log::info;

/// Which way a transaction travels through the shield
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// From an outside correspondent to the shielded mailbox
    Inbound,
    /// From the shielded mailbox back out
    Outbound,
    /// Not classified (relay role, or before MAIL FROM)
    #[default]
    Unknown,
}

/// Classifies senders against the shielded mailbox host
#[derive(Debug, Clone)]
pub struct DirectionClassifier {
    host: String,
}

impl DirectionClassifier {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_ascii_lowercase(),
        }
    }

    /// Senders on the shielded host are outbound, everyone else inbound
    pub fn classify(&self, sender: &str) -> Direction {
        let direction = if sender.to_ascii_lowercase().contains(&self.host) {
            Direction::Outbound
        } else {
            Direction::Inbound
        };

        match direction {
            Direction::Outbound => info!("outbound >>> {sender}"),
            _ => info!("inbound >>> {sender}"),
        }

        direction
    }
}
