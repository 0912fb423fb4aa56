// Messages sent to the player's inbox.
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::Date;

use crate::logic::{time::iso_date_format, types::EmailId};

#[derive(Debug, Clone, PartialEq)]
#[derive(Serialize, Deserialize)]
#[derive(FromRow)]
pub struct Email {
    pub id: EmailId,
    pub sender: String,
    pub subject: String,
    pub body: String,
    #[serde(with = "iso_date_format")]
    pub date: Date,
    pub delivered: bool,
}

impl Email {
    // Build an undelivered email. The ID is given when it is stored.
    pub fn build(sender: &str, subject: &str, body: &str, date: Date) -> Self {
        Email {
            id: 0,
            sender: sender.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            date,
            delivered: false,
        }
    }

    // Mark the email delivered. Returns false if it already was.
    pub fn deliver(&mut self) -> bool {
        if self.delivered {
            return false;
        }
        self.delivered = true;
        return true;
    }
}
