use crate::sensors::SensorError;
use crate::station::ReadingSource;
use crate::uploader::ReadingSink;
use std::thread;
use std::time::{Duration, Instant};

/// Tracks when a reading type was last sent.
#[derive(Debug, Clone, Copy)]
pub struct IntervalTimer {
    interval: Duration,
    last_sent: Instant,
}

impl IntervalTimer {
    pub fn new(interval: Duration, started_at: Instant) -> Self {
        Self {
            interval,
            last_sent: started_at,
        }
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_sent)
    }

    /// Due once strictly more than `interval` has passed since the last send.
    pub fn is_due(&self, now: Instant) -> bool {
        self.elapsed(now) > self.interval
    }

    pub fn reset(&mut self, now: Instant) {
        self.last_sent = now;
    }

    pub fn last_sent(&self) -> Instant {
        self.last_sent
    }
}

/// What one iteration sent; `None` means the reading was not due.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub air_quality: Option<bool>,
    pub enviro: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    pub air_quality: IntervalTimer,
    pub enviro: IntervalTimer,
}

impl Scheduler {
    pub fn new(
        air_quality_interval: Duration,
        enviro_interval: Duration,
        started_at: Instant,
    ) -> Self {
        Self {
            air_quality: IntervalTimer::new(air_quality_interval, started_at),
            enviro: IntervalTimer::new(enviro_interval, started_at),
        }
    }

    /// Reads both sensors, then sends whichever readings are due at `now()`.
    ///
    /// Both timers are checked against the same instant, taken before either send.
    /// A timer is reset before its send is attempted, so a failed upload waits a full
    /// interval like a successful one.
    pub fn tick<R, S>(
        &mut self,
        reader: &mut R,
        sink: &mut S,
        now: impl Fn() -> Instant,
    ) -> Result<TickReport, SensorError>
    where
        R: ReadingSource,
        S: ReadingSink,
    {
        let enviro = reader.read_enviro()?;
        let air_quality = reader.read_air_quality()?;
        let mut report = TickReport::default();

        let at = now();
        let air_quality_due = self.air_quality.is_due(at);
        let enviro_due = self.enviro.is_due(at);

        if air_quality_due {
            tracing::info!(reading = ?air_quality, "air quality reading due");
            self.air_quality.reset(at);
            let sent = sink.send_air_quality(&air_quality);
            if sent {
                tracing::info!("API air quality response: OK");
            } else {
                tracing::warn!("API air quality response: Failed");
            }
            report.air_quality = Some(sent);
        }

        if enviro_due {
            tracing::info!(reading = ?enviro, "enviro reading due");
            self.enviro.reset(at);
            let sent = sink.send_enviro(&enviro);
            if sent {
                tracing::info!("API enviro response: OK");
            } else {
                tracing::warn!("API enviro response: Failed");
            }
            report.enviro = Some(sent);
        }

        Ok(report)
    }

    /// One loop iteration: errors are logged as warnings and never escape.
    pub fn run_once<R, S>(&mut self, reader: &mut R, sink: &mut S, now: impl Fn() -> Instant)
    where
        R: ReadingSource,
        S: ReadingSink,
    {
        if let Err(err) = self.tick(reader, sink, now) {
            tracing::warn!(error = %err, "main loop error");
        }
    }

    /// Runs forever. Errors from an iteration are logged and the next iteration starts.
    pub fn run<R, S>(&mut self, reader: &mut R, sink: &mut S, loop_delay: Duration) -> !
    where
        R: ReadingSource,
        S: ReadingSink,
    {
        loop {
            self.run_once(reader, sink, Instant::now);
            if !loop_delay.is_zero() {
                thread::sleep(loop_delay);
            }
        }
    }
}
