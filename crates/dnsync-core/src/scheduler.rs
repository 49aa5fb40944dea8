//! Cron-driven scheduler
//!
//! The scheduler owns the cadence: it runs one cycle on startup, then one
//! cycle per cron tick in the configured timezone. The only way to end it
//! from inside is the [`ScheduleHandle`] it hands to every cycle; the engine
//! stops it when the provider rejects the credential.
//!
//! ## Overlap
//!
//! Cycles never overlap. Each cycle is awaited to completion, and the next
//! tick is computed from the moment the cycle finished, so ticks that fall
//! inside a long cycle are skipped rather than queued.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::BTreeSet;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::engine::DdnsEngine;
use crate::error::{Error, Result};

/// A cron expression bound to an IANA timezone
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: cron::Schedule,
    timezone: Tz,
}

impl CronSchedule {
    /// Parse `expression` and `timezone`
    ///
    /// Five-field expressions (minute precision) run at second zero. Five
    /// and six-field expressions use crontab day-of-week numbering (0 or 7
    /// is Sunday). Seven-field expressions are passed through unchanged.
    pub fn new(expression: &str, timezone: &str) -> Result<Self> {
        let normalized = normalize_expression(expression).map_err(|e| {
            Error::config(format!("Invalid cron expression '{expression}': {e}"))
        })?;

        let schedule = cron::Schedule::from_str(&normalized).map_err(|e| {
            Error::config(format!("Invalid cron expression '{expression}': {e}"))
        })?;

        let timezone = timezone
            .parse::<Tz>()
            .map_err(|e| Error::config(format!("Invalid timezone '{timezone}': {e}")))?;

        Ok(Self {
            expression: expression.trim().to_string(),
            schedule,
            timezone,
        })
    }

    /// First tick strictly after `instant`
    pub fn next_after(&self, instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&instant.with_timezone(&self.timezone))
            .next()
            .map(|tick| tick.with_timezone(&Utc))
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }
}

/// Rewrite a crontab expression into the `cron` crate's dialect
fn normalize_expression(expression: &str) -> std::result::Result<String, String> {
    let mut fields: Vec<String> = expression.split_whitespace().map(str::to_string).collect();

    match fields.len() {
        5 => fields.insert(0, "0".to_string()),
        6 => {}
        _ => return Ok(fields.join(" ")),
    }

    fields[5] = remap_day_of_week(&fields[5])?;
    Ok(fields.join(" "))
}

/// Map crontab weekdays (0-7, Sunday is 0 and 7) onto `cron` weekdays
/// (1-7, Sunday is 1)
///
/// Numeric items are expanded into an explicit day list. Named items
/// (`MON`, `SUN-WED`) mean the same in both dialects and are kept.
fn remap_day_of_week(field: &str) -> std::result::Result<String, String> {
    if field == "*" || field == "?" {
        return Ok(field.to_string());
    }

    let mut named = Vec::new();
    let mut days = BTreeSet::new();

    for item in field.split(',') {
        if item.chars().any(|c| c.is_ascii_alphabetic()) {
            named.push(item.to_string());
            continue;
        }

        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .ok()
                    .filter(|step| *step > 0)
                    .ok_or_else(|| format!("invalid day-of-week step '{item}'"))?;
                (range, Some(step))
            }
            None => (item, None),
        };

        let (first, last) = match (range, range.split_once('-')) {
            ("*", _) => (0, 6),
            (_, Some((first, last))) => (parse_weekday(first)?, parse_weekday(last)?),
            (single, None) if step.is_some() => (parse_weekday(single)?, 6),
            (single, None) => {
                let day = parse_weekday(single)?;
                (day, day)
            }
        };

        if first > last {
            return Err(format!("invalid day-of-week range '{item}'"));
        }

        for day in (first..=last).step_by(step.unwrap_or(1) as usize) {
            days.insert(day % 7 + 1);
        }
    }

    named.extend(days.into_iter().map(|day| day.to_string()));
    Ok(named.join(","))
}

fn parse_weekday(value: &str) -> std::result::Result<u32, String> {
    value
        .parse()
        .ok()
        .filter(|day| *day <= 7)
        .ok_or_else(|| format!("day-of-week '{value}' is not between 0 and 7"))
}

/// Stop token shared between the scheduler and the cycles it runs
///
/// Cloning yields another handle to the same flag. Once stopped, the flag
/// stays set; there is no automatic re-enable.
#[derive(Debug, Clone)]
pub struct ScheduleHandle {
    stop_tx: Arc<watch::Sender<bool>>,
}

impl ScheduleHandle {
    pub fn new() -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            stop_tx: Arc::new(stop_tx),
        }
    }

    /// Prevent any future scheduled invocation
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Resolves once [`ScheduleHandle::stop`] has been called
    pub async fn stopped(&self) {
        let mut rx = self.stop_tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

impl Default for ScheduleHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Why [`Scheduler::run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A cycle stopped the schedule (credential rejected)
    Halted,
    /// The caller's shutdown future completed
    Shutdown,
    /// The cron expression has no further ticks
    Exhausted,
}

/// Runs the engine on a cron cadence
pub struct Scheduler {
    schedule: CronSchedule,
    run_on_init: bool,
    handle: ScheduleHandle,
}

impl Scheduler {
    /// Create a scheduler that also runs once immediately on start
    pub fn new(schedule: CronSchedule) -> Self {
        Self {
            schedule,
            run_on_init: true,
            handle: ScheduleHandle::new(),
        }
    }

    /// Enable or disable the immediate first cycle
    pub fn with_run_on_init(mut self, run_on_init: bool) -> Self {
        self.run_on_init = run_on_init;
        self
    }

    /// Handle passed to every cycle this scheduler runs
    pub fn handle(&self) -> ScheduleHandle {
        self.handle.clone()
    }

    /// Drive `engine` until halted, shut down, or out of ticks
    pub async fn run<S>(&self, engine: &DdnsEngine, shutdown: S) -> StopReason
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!(
            "Scheduler started: '{}' ({})",
            self.schedule.expression(),
            self.schedule.timezone()
        );

        if self.run_on_init {
            tokio::select! {
                _ = engine.run_cycle(&self.handle) => {}
                _ = &mut shutdown => return StopReason::Shutdown,
            }
        }

        loop {
            if self.handle.is_stopped() {
                info!("Schedule halted, no further cycles will run");
                return StopReason::Halted;
            }

            let now = Utc::now();
            let Some(next) = self.schedule.next_after(now) else {
                warn!("Cron expression has no upcoming ticks, stopping scheduler");
                return StopReason::Exhausted;
            };

            let wait = (next - now).to_std().unwrap_or_default();
            debug!(
                "Next cycle at {} (in {}s)",
                next.with_timezone(&self.schedule.timezone()),
                wait.as_secs()
            );

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.handle.stopped() => {
                    info!("Schedule halted, no further cycles will run");
                    return StopReason::Halted;
                }
                _ = &mut shutdown => return StopReason::Shutdown,
            }

            tokio::select! {
                _ = engine.run_cycle(&self.handle) => {}
                _ = &mut shutdown => return StopReason::Shutdown,
            }
        }
    }
}
