//! `Job`, its `Schedule`/`Action` variants, and fire-state.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use evoclaw_core::{AgentId, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Schedule {
    Interval {
        interval_ms: u64,
    },
    Cron {
        expr: String,
        #[serde(default)]
        timezone: Option<String>,
    },
    At {
        time: String,
        #[serde(default)]
        timezone: Option<String>,
    },
}

fn resolve_tz(timezone: &Option<String>) -> Result<Tz> {
    match timezone {
        None => Ok(Tz::UTC),
        Some(name) => Tz::from_str(name).map_err(|_| Error::invalid_argument(format!("unknown timezone: {name}"))),
    }
}

/// The `cron` crate parses 6/7-field expressions (seconds leading); the
/// classical 5-field form is adapted by pinning seconds to `0`.
fn parse_cron(expr: &str) -> Result<cron::Schedule> {
    let extended = format!("0 {expr}");
    cron::Schedule::from_str(&extended).map_err(|e| Error::invalid_argument(format!("invalid cron expression: {e}")))
}

fn parse_hhmm(time: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(time, "%H:%M").map_err(|_| Error::invalid_argument(format!("invalid HH:MM time: {time}")))
}

impl Schedule {
    pub fn validate(&self) -> Result<()> {
        match self {
            Schedule::Interval { interval_ms } => {
                if *interval_ms == 0 {
                    return Err(Error::invalid_argument("interval_ms must be > 0"));
                }
            }
            Schedule::Cron { expr, timezone } => {
                if expr.trim().is_empty() {
                    return Err(Error::invalid_argument("cron expr must not be empty"));
                }
                parse_cron(expr)?;
                resolve_tz(timezone)?;
            }
            Schedule::At { time, timezone } => {
                parse_hhmm(time)?;
                resolve_tz(timezone)?;
            }
        }
        Ok(())
    }

    /// The next fire instant strictly after `from`.
    pub fn next_run(&self, from: DateTime<Utc>) -> Result<DateTime<Utc>> {
        match self {
            Schedule::Interval { interval_ms } => Ok(from + ChronoDuration::milliseconds(*interval_ms as i64)),
            Schedule::Cron { expr, timezone } => {
                let schedule = parse_cron(expr)?;
                let tz = resolve_tz(timezone)?;
                let from_tz = from.with_timezone(&tz);
                let next = schedule
                    .after(&from_tz)
                    .next()
                    .ok_or_else(|| Error::internal("cron schedule has no future occurrence"))?;
                Ok(next.with_timezone(&Utc))
            }
            Schedule::At { time, timezone } => {
                let target = parse_hhmm(time)?;
                let tz = resolve_tz(timezone)?;
                let from_tz = from.with_timezone(&tz);
                let today = tz
                    .from_local_datetime(&from_tz.date_naive().and_time(target))
                    .single()
                    .ok_or_else(|| Error::internal("ambiguous local time"))?;
                let next = if today > from_tz { today } else { today + ChronoDuration::days(1) };
                Ok(next.with_timezone(&Utc))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Action {
    Shell {
        command: String,
    },
    Agent {
        agent_id: AgentId,
        message: String,
    },
    Mqtt {
        topic: String,
        payload: String,
    },
    Http {
        #[serde(default)]
        method: Option<String>,
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
        #[serde(default)]
        json: Option<Value>,
    },
}

impl Action {
    pub fn validate(&self) -> Result<()> {
        match self {
            Action::Shell { command } if command.trim().is_empty() => Err(Error::invalid_argument("shell action requires a non-empty command")),
            Action::Agent { agent_id, message } if agent_id.as_str().is_empty() || message.is_empty() => {
                Err(Error::invalid_argument("agent action requires agent_id and message"))
            }
            Action::Mqtt { topic, .. } if topic.trim().is_empty() => Err(Error::invalid_argument("mqtt action requires a non-empty topic")),
            Action::Http { url, .. } if url.trim().is_empty() => Err(Error::invalid_argument("http action requires a non-empty url")),
            _ => Ok(()),
        }
    }

    /// `http` defaults to `GET` when `method` is unset.
    pub fn http_method(&self) -> &str {
        match self {
            Action::Http { method, .. } => method.as_deref().unwrap_or("GET"),
            _ => "GET",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobState {
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub run_count: u64,
    pub error_count: u64,
    pub last_error: Option<String>,
    pub last_duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub schedule: Schedule,
    pub action: Action,
    #[serde(default)]
    pub state: JobState,
}

impl Job {
    pub fn new(id: impl Into<String>, name: impl Into<String>, schedule: Schedule, action: Action) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: true,
            schedule,
            action,
            state: JobState::default(),
        }
    }

    /// Ids/names non-empty; schedule and action kinds recognized with their
    /// required fields present and parseable.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::invalid_argument("job id must not be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(Error::invalid_argument("job name must not be empty"));
        }
        self.schedule.validate()?;
        self.action.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_next_run_adds_period() {
        let s = Schedule::Interval { interval_ms: 60_000 };
        let from = Utc::now();
        let next = s.next_run(from).unwrap();
        assert_eq!((next - from).num_milliseconds(), 60_000);
    }

    #[test]
    fn cron_next_run_is_strictly_after_from() {
        let s = Schedule::Cron { expr: "0 * * * *".to_string(), timezone: None };
        let from = Utc::now();
        let next = s.next_run(from).unwrap();
        assert!(next > from);
    }

    #[test]
    fn at_schedule_rolls_to_tomorrow_when_time_has_passed() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 23, 0, 0).unwrap();
        let s = Schedule::At { time: "08:00".to_string(), timezone: None };
        let next = s.next_run(from).unwrap();
        assert_eq!(next.date_naive(), from.date_naive() + ChronoDuration::days(1));
    }

    #[test]
    fn at_schedule_fires_today_when_time_not_yet_passed() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 4, 0, 0).unwrap();
        let s = Schedule::At { time: "08:00".to_string(), timezone: None };
        let next = s.next_run(from).unwrap();
        assert_eq!(next.date_naive(), from.date_naive());
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let job = Job::new("j1", "name", Schedule::Interval { interval_ms: 0 }, Action::Shell { command: "echo hi".into() });
        assert!(job.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_shell_command() {
        let job = Job::new("j1", "name", Schedule::Interval { interval_ms: 1000 }, Action::Shell { command: "".into() });
        assert!(job.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_cron_expr() {
        let job = Job::new(
            "j1",
            "name",
            Schedule::Cron { expr: "not a cron".into(), timezone: None },
            Action::Shell { command: "echo hi".into() },
        );
        assert!(job.validate().is_err());
    }

    #[test]
    fn http_action_defaults_method_to_get() {
        let action = Action::Http { method: None, url: "http://x".into(), headers: HashMap::new(), json: None };
        assert_eq!(action.http_method(), "GET");
    }
}
