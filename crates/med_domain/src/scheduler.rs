use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, warn};

use crate::{
    dedupe,
    medication::{Medication, MedicationId},
    notifications::{NotificationRecord, DEFAULT_DASHBOARD_URL},
    time_codec,
};

pub const REMINDER_BODY: &str = "It's time to take your medicine!";
pub const REMINDER_ICON: &str = "/static/images/pill.png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub medication_id: MedicationId,
    pub pill_name: String,
    pub time_of_day: String,
    pub fire_at: DateTime<Utc>,
    pub dedupe_tag: String,
    /// Stamp of the timer currently armed for this tag. A fire carrying any
    /// other value comes from a superseded timer.
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerCommand {
    Arm {
        tag: String,
        delay: Duration,
        generation: u64,
    },
    Cancel {
        tag: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTime {
    pub medication_id: MedicationId,
    pub time_of_day: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleOutcome {
    pub commands: Vec<TimerCommand>,
    pub skipped: Vec<SkippedTime>,
}

impl ScheduleOutcome {
    pub fn armed(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|command| match command {
            TimerCommand::Arm { tag, .. } => Some(tag.as_str()),
            TimerCommand::Cancel { .. } => None,
        })
    }

    pub fn cancelled(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|command| match command {
            TimerCommand::Cancel { tag } => Some(tag.as_str()),
            TimerCommand::Arm { .. } => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredReminder {
    pub notification: NotificationRecord,
    pub rearm: TimerCommand,
}

/// Daily reminder timers derived from the last medication list received.
#[derive(Debug)]
pub struct LocalScheduler {
    entries: BTreeMap<String, ScheduleEntry>,
    next_generation: u64,
    target_url: String,
}

impl Default for LocalScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_DASHBOARD_URL)
    }
}

impl LocalScheduler {
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            entries: BTreeMap::new(),
            next_generation: 1,
            target_url: target_url.into(),
        }
    }

    /// Replace the whole pending set. Surviving tags are re-armed with a fresh
    /// generation and tags that no longer appear are cancelled.
    pub fn schedule<Tz: TimeZone>(
        &mut self,
        medications: &[Medication],
        now: &DateTime<Tz>,
    ) -> ScheduleOutcome {
        let mut next: BTreeMap<String, ScheduleEntry> = BTreeMap::new();
        let mut skipped = Vec::new();

        for medication in medications {
            if medication.times.is_empty() {
                warn!(medication_id = %medication.id, "medication has no reminder times");
                continue;
            }
            for time_of_day in &medication.times {
                let fire_at = match time_codec::next_occurrence(time_of_day, now) {
                    Ok(fire_at) => {
                        let resolved = time_codec::format_time_of_day(&fire_at);
                        if resolved != *time_of_day {
                            debug!(
                                medication_id = %medication.id,
                                requested = %time_of_day,
                                %resolved,
                                "local clock skips the requested time"
                            );
                        }
                        fire_at.with_timezone(&Utc)
                    }
                    Err(err) => {
                        warn!(
                            medication_id = %medication.id,
                            time = %time_of_day,
                            %err,
                            "skipping reminder time"
                        );
                        skipped.push(SkippedTime {
                            medication_id: medication.id.clone(),
                            time_of_day: time_of_day.clone(),
                            reason: err.to_string(),
                        });
                        continue;
                    }
                };
                let tag = dedupe::tag_for(&medication.id, time_of_day);
                if next.contains_key(&tag) {
                    debug!(%tag, "duplicate reminder time collapsed");
                    continue;
                }
                let generation = self.bump_generation();
                next.insert(
                    tag.clone(),
                    ScheduleEntry {
                        medication_id: medication.id.clone(),
                        pill_name: medication.pill_name.clone(),
                        time_of_day: time_of_day.clone(),
                        fire_at,
                        dedupe_tag: tag,
                        generation,
                    },
                );
            }
        }

        let mut commands: Vec<TimerCommand> = self
            .entries
            .keys()
            .filter(|tag| !next.contains_key(*tag))
            .map(|tag| TimerCommand::Cancel { tag: tag.clone() })
            .collect();
        commands.extend(next.values().map(|entry| TimerCommand::Arm {
            tag: entry.dedupe_tag.clone(),
            delay: time_codec::delay_until(&entry.fire_at, now),
            generation: entry.generation,
        }));

        debug!(
            armed = next.len(),
            cancelled = commands.len() - next.len(),
            skipped = skipped.len(),
            "schedule replaced"
        );
        self.entries = next;
        ScheduleOutcome { commands, skipped }
    }

    pub fn fire<Tz: TimeZone>(
        &mut self,
        tag: &str,
        generation: u64,
        now: &DateTime<Tz>,
    ) -> Option<FiredReminder> {
        let current = match self.entries.get(tag) {
            Some(entry) if entry.generation == generation => entry.generation,
            Some(entry) => {
                debug!(tag, generation, current = entry.generation, "ignoring superseded timer");
                return None;
            }
            None => {
                debug!(tag, "ignoring timer for unscheduled reminder");
                return None;
            }
        };
        let next_generation = self.bump_generation();
        let entry = self.entries.get_mut(tag)?;
        debug_assert_eq!(entry.generation, current);

        let notification = NotificationRecord::new(&entry.dedupe_tag, &entry.pill_name, REMINDER_BODY)
            .with_icon(REMINDER_ICON)
            .with_target_url(&self.target_url);

        // A timer that wakes slightly early must not compute today's slot again.
        let basis = std::cmp::max(now.with_timezone(&Utc), entry.fire_at).with_timezone(&now.timezone());
        let rearm = match time_codec::next_occurrence(&entry.time_of_day, &basis) {
            Ok(fire_at) => {
                debug!(
                    tag,
                    next = %time_codec::format_time_of_day(&fire_at),
                    generation = next_generation,
                    "reminder re-armed"
                );
                entry.fire_at = fire_at.with_timezone(&Utc);
                entry.generation = next_generation;
                TimerCommand::Arm {
                    tag: entry.dedupe_tag.clone(),
                    delay: time_codec::delay_until(&entry.fire_at, now),
                    generation: next_generation,
                }
            }
            Err(err) => {
                warn!(tag, %err, "could not compute next occurrence, dropping reminder");
                self.entries.remove(tag);
                TimerCommand::Cancel { tag: tag.to_string() }
            }
        };

        Some(FiredReminder { notification, rearm })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn bump_generation(&mut self) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        generation
    }
}
