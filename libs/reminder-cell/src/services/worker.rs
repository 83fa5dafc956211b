// libs/reminder-cell/src/services/worker.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Reminder, ReminderStatus};

/// Tables the worker polls. Academic reminders live in their own table but
/// follow the same state machine.
const REMINDER_TABLES: [&str; 2] = ["reminders", "academic_reminders"];

const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Background worker that flips pending reminders to due once their
/// scheduled time has passed. Failures are logged and retried implicitly on
/// the next tick.
pub struct ReminderWorkerService {
    supabase: Arc<SupabaseClient>,
    poll_interval: Duration,
}

impl ReminderWorkerService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }

    pub fn with_poll_interval(config: &AppConfig, poll_interval: Duration) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            poll_interval,
        }
    }

    /// Runs forever. Intended to be spawned as a tokio task from the api binary.
    pub async fn run(self) {
        info!(
            "Reminder worker started (poll interval: {:?})",
            self.poll_interval
        );
        let mut ticker = interval(self.poll_interval);

        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }

    /// One poll pass over every reminder table.
    pub async fn run_once(&self) {
        for table in REMINDER_TABLES {
            if let Err(e) = self.flag_due_reminders(table).await {
                error!("Reminder poll failed for table {}: {}", table, e);
            }
        }
    }

    async fn flag_due_reminders(&self, table: &str) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();
        let path = format!(
            "/rest/v1/{}?status=eq.{}&scheduled_at=lte.{}",
            table,
            ReminderStatus::Pending,
            urlencoding::encode(&now)
        );

        let due: Vec<Reminder> = self.supabase.request(Method::GET, &path, None, None).await?;

        if due.is_empty() {
            return Ok(());
        }
        debug!("Flagging {} reminders as due in {}", due.len(), table);

        for reminder in due {
            let patch_path = format!("/rest/v1/{}?id=eq.{}", table, reminder.id);
            let body = json!({ "status": ReminderStatus::Due.to_string() });
            if let Err(e) = self.supabase.patch(&patch_path, None, body).await {
                error!("Failed to flag reminder {} as due: {}", reminder.id, e);
            }
        }

        Ok(())
    }
}
