use crate::database::TableName;
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Change,
}

/// "This table changed" signal. Subscribers re-fetch the table themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub table: TableName,
    pub kind: ChangeKind,
}

/// Fan-out of table change events to every current subscriber.
#[derive(Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Returns how many subscribers received the event. Having none is fine.
    pub fn notify(&self, table: TableName, kind: ChangeKind) -> usize {
        match self.tx.send(ChangeEvent { table, kind }) {
            Ok(n) => n,
            Err(_) => {
                log::debug!("No subscribers for {} change", table);
                0
            }
        }
    }
}
