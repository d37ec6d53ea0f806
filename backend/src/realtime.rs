//! Table change feed
//!
//! Row triggers publish `{table, operation, record_id, owner_id}` on a Postgres
//! NOTIFY channel. A background task relays them into an in-process broadcast
//! channel, and each SSE subscriber filters the stream down to its own rows.

use std::collections::HashSet;
use std::time::Duration;

use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Tables whose changes are published
pub const WATCHED_TABLES: [&str; 6] = [
    "customers",
    "stock",
    "product_combos",
    "orders",
    "order_items",
    "financial_transactions",
];

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOperation {
    Insert,
    Update,
    Delete,
}

/// One row-level change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    pub operation: ChangeOperation,
    pub record_id: Option<Uuid>,
    pub owner_id: Uuid,
}

impl ChangeEvent {
    pub fn from_payload(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

/// Fan-out of change events to every connected subscriber
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer.max(1));
        Self { sender }
    }

    /// Returns the number of subscribers the event reached
    pub fn publish(&self, event: ChangeEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Which events a subscriber wants
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    owner_id: Uuid,
    tables: Option<HashSet<String>>,
}

impl ChangeFilter {
    /// Build a filter from a comma separated table list; no list means all tables
    pub fn new(owner_id: Uuid, tables: Option<&str>) -> AppResult<Self> {
        let tables = match tables.map(str::trim).filter(|t| !t.is_empty()) {
            None => None,
            Some(list) => {
                let mut set = HashSet::new();
                for table in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                    if !WATCHED_TABLES.contains(&table) {
                        return Err(AppError::Validation {
                            field: "tables".to_string(),
                            message: format!("Unknown table: {}", table),
                            message_pt: format!("Tabela desconhecida: {}", table),
                        });
                    }
                    set.insert(table.to_string());
                }
                Some(set)
            }
        };
        Ok(Self { owner_id, tables })
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        event.owner_id == self.owner_id
            && self
                .tables
                .as_ref()
                .map_or(true, |tables| tables.contains(&event.table))
    }
}

/// What a subscriber receives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeMessage {
    Change(ChangeEvent),
    /// The subscriber fell behind and dropped events; it should re-fetch
    Resync { missed: u64 },
}

/// Turn a broadcast receiver into the stream of messages one subscriber
/// should see. The stream ends when the feed is dropped.
pub fn change_stream(
    receiver: broadcast::Receiver<ChangeEvent>,
    filter: ChangeFilter,
) -> impl Stream<Item = ChangeMessage> {
    stream::unfold((receiver, filter), |(mut receiver, filter)| async move {
        loop {
            match receiver.recv().await {
                Ok(event) if filter.matches(&event) => {
                    return Some((ChangeMessage::Change(event), (receiver, filter)));
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Change subscriber lagged");
                    return Some((ChangeMessage::Resync { missed }, (receiver, filter)));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
}

/// Listen on the NOTIFY channel and relay events until the process exits.
///
/// Connection failures are logged and retried after a fixed delay.
pub fn spawn_listener(pool: PgPool, channel: String, feed: ChangeFeed) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = relay(&pool, &channel, &feed).await {
                tracing::warn!(error = %e, channel = %channel, "Change listener disconnected");
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    })
}

async fn relay(pool: &PgPool, channel: &str, feed: &ChangeFeed) -> Result<(), sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(channel).await?;
    tracing::info!(channel = %channel, "Listening for table changes");

    loop {
        let notification = listener.recv().await?;
        match ChangeEvent::from_payload(notification.payload()) {
            Ok(event) => {
                let delivered = feed.publish(event.clone());
                tracing::debug!(
                    table = %event.table,
                    owner_id = %event.owner_id,
                    delivered,
                    "Relayed change event"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, payload = notification.payload(), "Malformed change payload");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(table: &str, owner_id: Uuid) -> ChangeEvent {
        ChangeEvent {
            table: table.to_string(),
            operation: ChangeOperation::Update,
            record_id: Some(Uuid::new_v4()),
            owner_id,
        }
    }

    #[test]
    fn parses_trigger_payload() {
        let owner = Uuid::new_v4();
        let payload = format!(
            r#"{{"table":"orders","operation":"INSERT","record_id":null,"owner_id":"{}"}}"#,
            owner
        );
        let parsed = ChangeEvent::from_payload(&payload).unwrap();
        assert_eq!(parsed.operation, ChangeOperation::Insert);
        assert_eq!(parsed.owner_id, owner);
        assert_eq!(parsed.record_id, None);
    }

    #[test]
    fn filter_scopes_by_owner_and_table() {
        let owner = Uuid::new_v4();
        let filter = ChangeFilter::new(owner, Some("orders, stock")).unwrap();

        assert!(filter.matches(&event("orders", owner)));
        assert!(filter.matches(&event("stock", owner)));
        assert!(!filter.matches(&event("customers", owner)));
        assert!(!filter.matches(&event("orders", Uuid::new_v4())));

        let all = ChangeFilter::new(owner, None).unwrap();
        assert!(all.matches(&event("financial_transactions", owner)));
    }

    #[test]
    fn filter_rejects_unknown_tables() {
        assert!(ChangeFilter::new(Uuid::new_v4(), Some("users")).is_err());
    }

    #[tokio::test]
    async fn feed_fans_out() {
        let feed = ChangeFeed::new(8);
        let mut a = feed.subscribe();
        let mut b = feed.subscribe();
        let owner = Uuid::new_v4();

        assert_eq!(feed.publish(event("orders", owner)), 2);
        assert_eq!(a.recv().await.unwrap().table, "orders");
        assert_eq!(b.recv().await.unwrap().table, "orders");
    }

    #[tokio::test]
    async fn stream_skips_other_owners() {
        use futures::StreamExt;

        let feed = ChangeFeed::new(8);
        let owner = Uuid::new_v4();
        let filter = ChangeFilter::new(owner, Some("orders")).unwrap();
        let stream = change_stream(feed.subscribe(), filter);
        tokio::pin!(stream);

        feed.publish(event("orders", Uuid::new_v4()));
        feed.publish(event("stock", owner));
        let mine = event("orders", owner);
        feed.publish(mine.clone());

        assert_eq!(stream.next().await, Some(ChangeMessage::Change(mine)));
    }

    #[tokio::test]
    async fn stream_reports_lag_then_ends() {
        use futures::StreamExt;

        let feed = ChangeFeed::new(1);
        let owner = Uuid::new_v4();
        let stream = change_stream(feed.subscribe(), ChangeFilter::new(owner, None).unwrap());
        tokio::pin!(stream);

        feed.publish(event("orders", owner));
        feed.publish(event("orders", owner));
        let last = event("stock", owner);
        feed.publish(last.clone());

        assert_eq!(stream.next().await, Some(ChangeMessage::Resync { missed: 2 }));
        assert_eq!(stream.next().await, Some(ChangeMessage::Change(last)));

        drop(feed);
        assert_eq!(stream.next().await, None);
    }

    #[test]
    fn publish_without_subscribers() {
        let feed = ChangeFeed::new(8);
        assert_eq!(feed.publish(event("stock", Uuid::new_v4())), 0);
        assert_eq!(feed.subscriber_count(), 0);
    }
}
