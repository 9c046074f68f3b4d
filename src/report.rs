//! Human-readable license status for operators.

use crate::policy::access::{
    check_feature_access, get_feature_limit, Limit, MAX_TICKETS, UNLIMITED,
};
use crate::state::Entitlement;
use chrono::{DateTime, Utc};
use std::fmt;

/// Premium features listed in reports, with display names.
pub const PREMIUM_FEATURES: [(&str, &str); 4] = [
    ("api_access", "API Access"),
    ("priority_support", "Priority Support"),
    ("dedicated_support", "Dedicated Support"),
    ("source_code_access", "Source Code Access"),
];

/// Status summary (`status` command, `/license` in the bot).
pub struct LicenseReport<'a> {
    entitlement: &'a Entitlement,
    key_preview: String,
    tickets_this_month: Option<u64>,
    now: DateTime<Utc>,
}

impl<'a> LicenseReport<'a> {
    /// Build a report for `entitlement` as of `now`.
    pub fn new(entitlement: &'a Entitlement, key_preview: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            entitlement,
            key_preview: key_preview.into(),
            tickets_this_month: None,
            now,
        }
    }

    /// Include monthly ticket usage.
    pub fn with_usage(mut self, tickets_this_month: u64) -> Self {
        self.tickets_this_month = Some(tickets_this_month);
        self
    }

    /// Limits and feature checklist view (`features` command).
    pub fn features(&self) -> FeatureReport<'a> {
        FeatureReport {
            entitlement: self.entitlement,
        }
    }
}

impl fmt::Display for LicenseReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ent = self.entitlement;

        writeln!(f, "License Information")?;
        writeln!(
            f,
            "  Status:  {}",
            if ent.valid { "Valid" } else { "Invalid/Expired" }
        )?;

        if ent.valid {
            writeln!(f, "  Tier:    {}", title_case(&ent.tier))?;

            if let Some(expires) = ent.expires_at {
                let days_left = expires.signed_duration_since(self.now).num_days();
                writeln!(
                    f,
                    "  Expires: in {} days ({})",
                    days_left,
                    expires.format("%B %d, %Y")
                )?;
            }

            if let Some(used) = self.tickets_this_month {
                let raw = get_feature_limit(ent, MAX_TICKETS);
                match Limit::from_raw(raw) {
                    Limit::Capped(cap) => {
                        let percent = used as f64 / cap as f64 * 100.0;
                        writeln!(
                            f,
                            "  Tickets: {}/{} this month ({:.1}%)",
                            with_thousands(used as i64),
                            with_thousands(raw),
                            percent
                        )?;
                    }
                    _ => writeln!(f, "  Tickets: {} this month (Unlimited)", with_thousands(used as i64))?,
                }
            }

            let enabled: Vec<&str> = PREMIUM_FEATURES
                .iter()
                .filter(|(key, _)| check_feature_access(ent, key))
                .map(|(_, name)| *name)
                .collect();
            if !enabled.is_empty() {
                writeln!(f, "  Features:")?;
                for name in enabled {
                    writeln!(f, "    [x] {}", name)?;
                }
            }
        } else {
            writeln!(f, "  Issues:  License validation failed")?;
            writeln!(f, "           Contact support or check configuration")?;
        }

        if let Some(at) = ent.last_validated_at {
            writeln!(f, "  Last validated: {} UTC", at.format("%Y-%m-%d %H:%M:%S"))?;
        }
        write!(f, "  License key: {}", self.key_preview)
    }
}

/// Limits and feature checklist.
pub struct FeatureReport<'a> {
    entitlement: &'a Entitlement,
}

impl fmt::Display for FeatureReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ent = self.entitlement;
        if !ent.valid {
            return write!(f, "No valid license found.");
        }

        writeln!(f, "{} License", title_case(&ent.tier))?;
        writeln!(f, "  Limits:")?;

        let tickets = get_feature_limit(ent, MAX_TICKETS);
        if tickets == UNLIMITED {
            writeln!(f, "    Unlimited Tickets")?;
        } else {
            writeln!(f, "    {} Tickets/month", with_thousands(tickets))?;
        }

        let positions = get_feature_limit(ent, "max_staff_positions");
        if positions == UNLIMITED {
            writeln!(f, "    Unlimited Staff Positions")?;
        } else {
            writeln!(f, "    {} Staff Positions", positions)?;
        }

        let api = get_feature_limit(ent, "api_requests_per_hour");
        if api == UNLIMITED {
            writeln!(f, "    Unlimited API Requests")?;
        } else if api > 0 {
            writeln!(f, "    {} API Requests/hour", with_thousands(api))?;
        }

        write!(f, "  Features:")?;
        for (key, name) in PREMIUM_FEATURES {
            let mark = if check_feature_access(ent, key) { 'x' } else { ' ' };
            write!(f, "\n    [{}] {}", mark, name)?;
        }
        Ok(())
    }
}

/// `1234567` -> `1,234,567`.
pub fn with_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
