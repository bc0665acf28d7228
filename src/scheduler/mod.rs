use crate::domain::settings::Settings;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Local, LocalResult, NaiveDate, NaiveTime, TimeZone};
use std::fmt;
use std::future::Future;
use tokio::time::{Duration, sleep};
use tracing::{error, info};

const RESCHEDULE_POLL_SECONDS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyJob {
    MorningPrep,
    EveningReflection,
}

impl fmt::Display for DailyJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MorningPrep => f.write_str("morning_prep"),
            Self::EveningReflection => f.write_str("evening_reflection"),
        }
    }
}

/// The two daily triggers derived from the user's settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySchedule {
    pub enabled: bool,
    pub morning_prep: NaiveTime,
    pub evening_reflection: NaiveTime,
}

impl DailySchedule {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            enabled: settings.notifications,
            morning_prep: settings.morning_prep()?,
            evening_reflection: settings.evening_reflection()?,
        })
    }

    /// The job that fires first after `now`, with the delay until it does.
    pub fn next_run(&self, now: DateTime<Local>) -> Result<Option<(DailyJob, Duration)>> {
        if !self.enabled {
            return Ok(None);
        }

        let morning = delay_until(self.morning_prep, now)?;
        let evening = delay_until(self.evening_reflection, now)?;

        Ok(Some(if morning <= evening {
            (DailyJob::MorningPrep, morning)
        } else {
            (DailyJob::EveningReflection, evening)
        }))
    }
}

pub async fn run_daily_scheduler<S, F, Fut>(mut schedule_provider: S, mut task: F) -> Result<()>
where
    S: FnMut() -> Result<DailySchedule>,
    F: FnMut(DailyJob, NaiveDate) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut last_logged: Option<DailySchedule> = None;

    loop {
        let schedule = match schedule_provider() {
            Ok(value) => value,
            Err(error) => {
                error!(error = %error, "failed to load daily schedule");
                sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
                continue;
            }
        };

        let next = match schedule.next_run(Local::now()) {
            Ok(value) => value,
            Err(error) => {
                error!(error = %error, "failed to compute next scheduled job");
                sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
                continue;
            }
        };

        if last_logged.as_ref() != Some(&schedule) {
            match next {
                Some((job, delay)) => {
                    info!(job = %job, seconds = delay.as_secs(), "next daily job scheduled")
                }
                None => info!("notifications disabled; daily jobs paused"),
            }
            last_logged = Some(schedule.clone());
        }

        let Some((job, delay)) = next else {
            sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
            continue;
        };

        if delay > Duration::from_secs(RESCHEDULE_POLL_SECONDS) {
            sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
            continue;
        }

        sleep(delay).await;

        let date = Local::now().date_naive();
        if let Err(error) = task(job, date).await {
            error!(error = %error, job = %job, date = %date, "scheduled job failed");
        }

        sleep(Duration::from_secs(1)).await;
    }
}

/// Delay from `now` until the next local occurrence of `target`.
pub fn delay_until(target: NaiveTime, now: DateTime<Local>) -> Result<Duration> {
    let today = now.date_naive();

    let candidate_today = match Local.from_local_datetime(&today.and_time(target)) {
        LocalResult::Single(datetime) => datetime,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            let fallback_day = today + ChronoDuration::days(1);
            Local
                .from_local_datetime(&fallback_day.and_time(target))
                .earliest()
                .context("Failed to convert schedule time")?
        }
    };

    let next_run = if candidate_today > now {
        candidate_today
    } else {
        let tomorrow = today + ChronoDuration::days(1);
        Local
            .from_local_datetime(&tomorrow.and_time(target))
            .earliest()
            .context("Failed to convert next execution time")?
    };

    (next_run - now)
        .to_std()
        .context("Failed to compute next execution delay")
}
