use std::time::{Duration, Instant};

use dashmap::{mapref::entry::Entry, DashMap};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CooldownKey {
    actor_id: String,
    handler_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CooldownDecision {
    Allow,
    Deny { remaining: Duration },
}

/// Per-(actor, handler) rate limiter. Expired records are replaced by the next
/// lookup for the same key; nothing sweeps them in the background.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    records: DashMap<CooldownKey, Instant>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(
        &self,
        actor_id: &str,
        handler_id: &str,
        cooldown: Option<Duration>,
    ) -> CooldownDecision {
        self.check_at(actor_id, handler_id, cooldown, Instant::now())
    }

    pub fn check_at(
        &self,
        actor_id: &str,
        handler_id: &str,
        cooldown: Option<Duration>,
        now: Instant,
    ) -> CooldownDecision {
        let Some(cooldown) = cooldown.filter(|window| !window.is_zero()) else {
            return CooldownDecision::Allow;
        };

        let key = CooldownKey { actor_id: actor_id.to_owned(), handler_id: handler_id.to_owned() };
        match self.records.entry(key) {
            Entry::Occupied(mut record) => {
                let expiry = *record.get();
                if expiry > now {
                    // A denied attempt leaves the window where it is.
                    return CooldownDecision::Deny { remaining: expiry - now };
                }
                record.insert(now + cooldown);
                CooldownDecision::Allow
            }
            Entry::Vacant(slot) => {
                slot.insert(now + cooldown);
                CooldownDecision::Allow
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

const UNITS: &[(u64, &str)] = &[
    (30 * 24 * 60 * 60, "month"),
    (24 * 60 * 60, "day"),
    (60 * 60, "hour"),
    (60, "minute"),
    (1, "second"),
];

/// Renders a wait time as "1 minute, 5 seconds". Partial seconds round up so a
/// pending cooldown never reads as zero.
pub fn format_remaining(remaining: Duration) -> String {
    let mut seconds = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
    if seconds == 0 {
        return "a moment".to_owned();
    }

    let mut parts = Vec::new();
    for (unit_secs, label) in UNITS {
        let amount = seconds / unit_secs;
        if amount == 0 {
            continue;
        }
        seconds -= amount * unit_secs;
        let plural = if amount == 1 { "" } else { "s" };
        parts.push(format!("{amount} {label}{plural}"));
    }

    parts.join(", ")
}
