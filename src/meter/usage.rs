//! Ticket usage counters with calendar-month rollover.
//!
//! Feeds the `max_tickets` cap. Each ticket kind keeps its own monthly
//! counter; the cap applies to the sum. Months are UTC calendar months
//! taken from the [`Clock`], so rollover is deterministic in tests.

use crate::clock::Clock;
use crate::TicketwardenError;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Kind of ticket-like record a user can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketKind {
    /// Support ticket.
    Ticket,
    /// User report.
    Report,
    /// Staff application.
    Application,
    /// Suggestion.
    Suggestion,
}

impl TicketKind {
    /// All kinds, in display order.
    pub const ALL: [TicketKind; 4] = [
        TicketKind::Ticket,
        TicketKind::Report,
        TicketKind::Application,
        TicketKind::Suggestion,
    ];

    /// Feature name gating this kind.
    pub fn feature(&self) -> &'static str {
        match self {
            TicketKind::Ticket => "tickets",
            TicketKind::Report => "reports",
            TicketKind::Application => "applications",
            TicketKind::Suggestion => "suggestions",
        }
    }
}

impl fmt::Display for TicketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.feature())
    }
}

/// Persisted usage counters.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UsageStats {
    /// Month the monthly counters belong to (YYYY-MM).
    pub monthly_period: Option<String>,

    /// Creations per kind in `monthly_period`.
    #[serde(default)]
    pub monthly: BTreeMap<TicketKind, u64>,

    /// Total creations ever recorded.
    #[serde(default)]
    pub lifetime_count: u64,
}

impl UsageStats {
    /// Create new empty usage stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one creation, resetting the monthly counters on a new month.
    pub fn record(&mut self, kind: TicketKind, clock: &dyn Clock) {
        let this_month = format_month(&clock.now_utc());

        if self.monthly_period.as_ref() != Some(&this_month) {
            self.monthly.clear();
            self.monthly_period = Some(this_month);
        }

        *self.monthly.entry(kind).or_insert(0) += 1;
        self.lifetime_count += 1;
    }

    /// Creations of `kind` in the current month.
    pub fn monthly_count(&self, kind: TicketKind, clock: &dyn Clock) -> u64 {
        if self.is_current(clock) {
            self.monthly.get(&kind).copied().unwrap_or(0)
        } else {
            0
        }
    }

    /// Creations of every kind in the current month.
    pub fn monthly_total(&self, clock: &dyn Clock) -> u64 {
        if self.is_current(clock) {
            self.monthly.values().sum()
        } else {
            0
        }
    }

    fn is_current(&self, clock: &dyn Clock) -> bool {
        self.monthly_period.as_deref() == Some(format_month(&clock.now_utc()).as_str())
    }
}

/// Format a DateTime as YYYY-MM for monthly tracking.
fn format_month(dt: &DateTime<Utc>) -> String {
    format!("{:04}-{:02}", dt.year(), dt.month())
}

/// File-backed usage meter.
pub struct UsageMeter {
    path: PathBuf,
    stats: UsageStats,
}

impl UsageMeter {
    /// Open the meter at `path`, starting empty when the file does not exist.
    pub fn open(path: PathBuf) -> Result<Self, TicketwardenError> {
        let stats = if path.exists() {
            let json = fs::read_to_string(&path)
                .map_err(|e| TicketwardenError::MeterIO(format!("Failed to read meter: {}", e)))?;
            serde_json::from_str(&json)
                .map_err(|e| TicketwardenError::MeterIO(format!("Failed to parse meter: {}", e)))?
        } else {
            UsageStats::new()
        };

        Ok(Self { path, stats })
    }

    /// Open `usage.json` under `dirs::data_dir()/<namespace>`.
    pub fn with_namespace(namespace: &str) -> Result<Self, TicketwardenError> {
        let base_dir = dirs::data_dir().ok_or_else(|| {
            TicketwardenError::MeterIO("Could not find data directory".to_string())
        })?;

        Self::open(base_dir.join(namespace).join("usage.json"))
    }

    /// Record one creation and persist.
    pub fn record(&mut self, kind: TicketKind, clock: &dyn Clock) -> Result<(), TicketwardenError> {
        self.stats.record(kind, clock);
        self.save()
    }

    /// Creations of `kind` this month.
    pub fn monthly_count(&self, kind: TicketKind, clock: &dyn Clock) -> u64 {
        self.stats.monthly_count(kind, clock)
    }

    /// Creations of every kind this month; the value checked against `max_tickets`.
    pub fn monthly_total(&self, clock: &dyn Clock) -> u64 {
        self.stats.monthly_total(clock)
    }

    /// Get lifetime count.
    pub fn lifetime_count(&self) -> u64 {
        self.stats.lifetime_count
    }

    /// Raw counters.
    pub fn stats(&self) -> &UsageStats {
        &self.stats
    }

    /// Location of the meter file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), TicketwardenError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| TicketwardenError::MeterIO(format!("Failed to create dir: {}", e)))?;
        }

        let json = serde_json::to_string_pretty(&self.stats)
            .map_err(|e| TicketwardenError::MeterIO(format!("Failed to serialize: {}", e)))?;

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, &json)
            .map_err(|e| TicketwardenError::MeterIO(format!("Failed to write temp: {}", e)))?;
        fs::rename(&temp_path, &self.path)
            .map_err(|e| TicketwardenError::MeterIO(format!("Failed to rename: {}", e)))?;

        Ok(())
    }
}
