//! Shared runtime state for tsi-daemon.
//!
//! Each store sits behind exactly one `Arc<RwLock<_>>`; handlers, hub
//! connections and background tasks all reach them through `Arc<AppState>`.
//! No code path holds two store locks at once.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tsi_broker_mock::PositionBook;
use tsi_schemas::{
    AccountSummary, ColumnDefinition, EventData, OrderResult, TableData, UiState,
};
use tsi_screen::{ConsoleLog, EventLog, FieldStore, TableStore};

use crate::config::DaemonConfig;

// ---------------------------------------------------------------------------
// BusMsg: push payload for hub clients and SSE
// ---------------------------------------------------------------------------

/// Messages broadcast to every hub connection and SSE subscriber.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum BusMsg {
    Heartbeat {
        ts_millis: i64,
    },
    PositionsUpdate(AccountSummary),
    ConsoleUpdate {
        messages: Vec<String>,
    },
    FieldUpdate {
        field_name: String,
        value: String,
    },
    FieldsUpdate {
        fields: BTreeMap<String, String>,
    },
    TableDataUpdate(TableData),
    TableColumnsUpdate {
        table_id: String,
        columns: Vec<ColumnDefinition>,
    },
    EventNotification(EventData),
    OrderPlaced(OrderResult),
    PositionToggled {
        symbol: String,
        /// `"live"` or `"flatten"`.
        field: String,
        value: Value,
    },
    UiState(UiState),
}

impl BusMsg {
    /// The `type` tag, also used as the SSE event name.
    pub fn kind(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::PositionsUpdate(_) => "positions_update",
            BusMsg::ConsoleUpdate { .. } => "console_update",
            BusMsg::FieldUpdate { .. } => "field_update",
            BusMsg::FieldsUpdate { .. } => "fields_update",
            BusMsg::TableDataUpdate(_) => "table_data_update",
            BusMsg::TableColumnsUpdate { .. } => "table_columns_update",
            BusMsg::EventNotification(_) => "event_notification",
            BusMsg::OrderPlaced(_) => "order_placed",
            BusMsg::PositionToggled { .. } => "position_toggled",
            BusMsg::UiState(_) => "ui_state",
        }
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub config: DaemonConfig,
    pub fields: Arc<RwLock<FieldStore>>,
    pub tables: Arc<RwLock<TableStore>>,
    pub console: Arc<RwLock<ConsoleLog>>,
    pub events: Arc<RwLock<EventLog>>,
    pub book: Arc<RwLock<PositionBook>>,
    /// Open hub connections.
    pub hub_clients: Arc<AtomicUsize>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    /// Default configuration: demo positions, 50,000.00 balance.
    pub fn new() -> Self {
        Self::with_config(DaemonConfig::default())
    }

    pub fn with_config(config: DaemonConfig) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(config.bus_capacity);
        let book = if config.demo_positions {
            PositionBook::with_demo_positions(config.initial_balance)
        } else {
            PositionBook::new(config.initial_balance)
        };

        Self {
            bus,
            build: BuildInfo {
                service: "tsi-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            config,
            fields: Arc::new(RwLock::new(FieldStore::new())),
            tables: Arc::new(RwLock::new(TableStore::with_default_tables())),
            console: Arc::new(RwLock::new(ConsoleLog::with_banner())),
            events: Arc::new(RwLock::new(EventLog::new())),
            book: Arc::new(RwLock::new(book)),
            hub_clients: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn connected_clients(&self) -> usize {
        self.hub_clients.load(Ordering::Relaxed)
    }

    /// Best-effort fan-out. Returns the number of receivers reached; zero
    /// subscribers is not an error.
    pub fn publish(&self, msg: BusMsg) -> usize {
        let kind = msg.kind();
        match self.bus.send(msg) {
            Ok(n) => n,
            Err(_) => {
                debug!(kind, "no subscribers for bus message");
                0
            }
        }
    }

    pub async fn publish_positions(&self) {
        let summary = self.book.read().await.summary();
        self.publish(BusMsg::PositionsUpdate(summary));
    }

    pub async fn publish_console(&self) {
        let messages = self.console.read().await.all();
        self.publish(BusMsg::ConsoleUpdate { messages });
    }

    pub async fn publish_fields(&self) {
        let fields = self.fields.read().await.get_all();
        self.publish(BusMsg::FieldsUpdate { fields });
    }

    /// Record a console line and push the console to subscribers.
    pub async fn log_console(&self, line: &str) {
        let appended = self.console.write().await.append(line);
        if appended {
            self.publish_console().await;
        }
    }
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

/// Spawn a background task that emits a heartbeat every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    })
}

/// Longest pause between price-walk restarts.
const MAX_RESTART_BACKOFF: Duration = Duration::from_secs(30);

/// Spawn the random-walk price task under a supervisor.
///
/// The walk runs in its own task. If it ever exits (panic or otherwise) the
/// supervisor logs it and starts a fresh one after a back-off that doubles
/// per consecutive failure, capped at 30s.
pub fn spawn_price_walk(state: Arc<AppState>, interval: Duration) -> JoinHandle<()> {
    spawn_supervised("price_walk", move || {
        let st = Arc::clone(&state);
        tokio::spawn(run_price_walk(st, interval))
    })
}

/// Run `start` forever, restarting whatever task it returns when that task
/// ends.
pub fn spawn_supervised<F>(name: &'static str, start: F) -> JoinHandle<()>
where
    F: Fn() -> JoinHandle<()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut failures: u32 = 0;
        loop {
            info!(task = name, "starting supervised task");
            match start().await {
                Ok(()) => warn!(task = name, "supervised task exited"),
                Err(e) if e.is_panic() => error!(task = name, error = %e, "supervised task panicked"),
                Err(e) => {
                    warn!(task = name, error = %e, "supervised task cancelled; not restarting");
                    return;
                }
            }
            failures = failures.saturating_add(1);
            let backoff = restart_backoff(failures);
            warn!(task = name, failures, backoff_ms = backoff.as_millis() as u64, "restarting");
            tokio::time::sleep(backoff).await;
        }
    })
}

pub fn restart_backoff(failures: u32) -> Duration {
    let exp = failures.saturating_sub(1).min(16);
    Duration::from_millis(500u64.saturating_mul(1u64 << exp)).min(MAX_RESTART_BACKOFF)
}

async fn run_price_walk(state: Arc<AppState>, interval: Duration) {
    let mut rng = StdRng::from_entropy();
    let mut ticker = tokio::time::interval(interval);
    // First tick completes immediately; skip it so the first step lands one
    // interval after start.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        state.book.write().await.nudge_prices(&mut rng);
        if state.bus.receiver_count() > 0 {
            state.publish_positions().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(restart_backoff(1), Duration::from_millis(500));
        assert_eq!(restart_backoff(2), Duration::from_millis(1000));
        assert_eq!(restart_backoff(4), Duration::from_millis(4000));
        assert_eq!(restart_backoff(40), MAX_RESTART_BACKOFF);
    }

    #[test]
    fn bus_messages_are_tagged_snake_case() {
        let msg = BusMsg::FieldUpdate {
            field_name: "symbol_input".into(),
            value: "AAPL".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "field_update");
        assert_eq!(json["fieldName"], "symbol_input");
        assert_eq!(msg.kind(), "field_update");
    }

    #[tokio::test]
    async fn fresh_state_has_banner_and_demo_book() {
        let st = AppState::new();
        assert_eq!(st.console.read().await.len(), 3);
        assert_eq!(st.book.read().await.len(), 3);
        assert_eq!(st.fields.read().await.get("order_type"), "BUY");
        assert_eq!(st.publish(BusMsg::Heartbeat { ts_millis: 0 }), 0);
    }

    #[tokio::test]
    async fn supervisor_restarts_a_panicking_task() {
        use std::sync::atomic::AtomicU32;

        tokio::time::pause();
        let starts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&starts);
        let sup = spawn_supervised("flaky", move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                if n < 2 {
                    panic!("boom {n}");
                }
                std::future::pending::<()>().await;
            })
        });

        for _ in 0..50 {
            if starts.load(Ordering::SeqCst) >= 3 {
                break;
            }
            tokio::time::advance(Duration::from_millis(500)).await;
            tokio::task::yield_now().await;
        }
        assert_eq!(starts.load(Ordering::SeqCst), 3);
        sup.abort();
    }
}
