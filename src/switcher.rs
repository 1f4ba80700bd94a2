//! The theme switching service.
//!
//! `SwitcherService` owns the periodic check. Each check:
//!
//! 1. reads the clock and localizes it to the configured zone
//! 2. makes sure the cached `DaySchedule` is for today's local date, solving
//!    (or splicing override times) when the date has rolled over
//! 3. classifies "now" as day or night
//! 4. applies the matching scheme and theme if the classification changed
//!
//! and then it is done: the next check is registered with the `Scheduler`
//! before the work starts, so a failing check never stops the cycle.
//!
//! The cached schedule and the configuration are snapshots behind `RwLock<Arc<_>>`
//! and are only ever replaced whole.

use anyhow::Result;
use chrono::{DateTime, FixedOffset, NaiveDate};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use crate::config::{Config, OverrideTimes};
use crate::geo::{SolarEvents, ZoneSpec, compute_events};
use crate::logger::Log;
use crate::scheduler::Scheduler;
use crate::theme::{AppliedChanges, ThemeApplier, apply_theme};
use crate::time_source::TimeSource;
use crate::time_state::{TimeState, classify, next_boundary, should_update_state};
use crate::utils::format_clock_time;

/// Where a day's events came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleSource {
    Solar,
    Override,
    /// Override times used because the solver failed.
    Fallback,
    /// Nothing usable today; switching is skipped unless forced.
    Unavailable,
}

/// Sunrise and sunset for one local calendar date.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub events: Option<SolarEvents>,
    pub source: ScheduleSource,
}

/// What one check decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOutcome {
    pub state: TimeState,
    pub applied: AppliedChanges,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn events_from_overrides(
    zone: &ZoneSpec,
    date: NaiveDate,
    times: &OverrideTimes,
) -> Option<SolarEvents> {
    let sunrise = zone.at_local_time(date, times.sunrise)?;
    let sunset = zone.at_local_time(date, times.sunset)?;
    Some(SolarEvents::new(sunrise, sunset))
}

/// Work out today's schedule for `local_now`.
pub fn compute_schedule(config: &Config, local_now: &DateTime<FixedOffset>) -> DaySchedule {
    let date = local_now.date_naive();
    let from_overrides = |source| match &config.overrides {
        Some(times) => match events_from_overrides(&config.zone, date, times) {
            Some(events) => DaySchedule {
                date,
                events: Some(events),
                source,
            },
            None => DaySchedule {
                date,
                events: None,
                source: ScheduleSource::Unavailable,
            },
        },
        None => DaySchedule {
            date,
            events: None,
            source: ScheduleSource::Unavailable,
        },
    };

    if config.override_times {
        return from_overrides(ScheduleSource::Override);
    }

    let Some(position) = config.position else {
        Log::log_warning("No coordinates configured; cannot compute sunrise and sunset");
        return from_overrides(ScheduleSource::Fallback);
    };

    match compute_events(local_now, position, config.zenith) {
        Ok(events) => DaySchedule {
            date,
            events: Some(events),
            source: ScheduleSource::Solar,
        },
        Err(e) => {
            Log::log_warning(&format!("Solar calculation failed: {}", e));
            let schedule = from_overrides(ScheduleSource::Fallback);
            if schedule.events.is_some() {
                Log::log_indented("Falling back to override times");
            } else {
                Log::log_indented("Theme switching skipped for today");
            }
            schedule
        }
    }
}

fn log_schedule(schedule: &DaySchedule) {
    match (&schedule.events, schedule.source) {
        (Some(events), source) => {
            let label = match source {
                ScheduleSource::Override => " (fixed)",
                ScheduleSource::Fallback => " (fallback)",
                _ => "",
            };
            Log::log_block_start(&format!("Schedule for {}{}", schedule.date, label));
            Log::log_indented(&format!("Sunrise time: {}", format_clock_time(&events.sunrise())));
            Log::log_indented(&format!("Sunset  time: {}", format_clock_time(&events.sunset())));
        }
        (None, _) => {
            Log::log_block_start(&format!("No schedule available for {}", schedule.date));
        }
    }
}

struct Inner {
    scheduler: Arc<dyn Scheduler>,
    applier: RwLock<Arc<dyn ThemeApplier>>,
    clock: Arc<dyn TimeSource>,
    config: RwLock<Arc<Config>>,
    schedule: RwLock<Option<Arc<DaySchedule>>>,
    last_state: Mutex<Option<TimeState>>,
    running: AtomicBool,
    // Bumped on every start so ticks queued by an earlier run are ignored.
    generation: AtomicU64,
}

/// Handle to the switching service. Clones share one service.
#[derive(Clone)]
pub struct SwitcherService {
    inner: Arc<Inner>,
}

impl SwitcherService {
    pub fn new(
        config: Config,
        scheduler: Arc<dyn Scheduler>,
        applier: Arc<dyn ThemeApplier>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                scheduler,
                applier: RwLock::new(applier),
                clock,
                config: RwLock::new(Arc::new(config)),
                schedule: RwLock::new(None),
                last_state: Mutex::new(None),
                running: AtomicBool::new(false),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Begin periodic checking. The first check runs immediately.
    ///
    /// Returns false, and registers nothing, if already running.
    pub fn start(&self) -> bool {
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            Log::log_debug("Switcher already running; start ignored");
            return false;
        }
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        Log::log_debug("Switcher started");
        Self::tick(&self.inner, generation);
        true
    }

    /// Stop periodic checking. Returns false if it was not running.
    ///
    /// A check already queued with the scheduler still fires but does nothing.
    pub fn stop(&self) -> bool {
        let was_running = self.inner.running.swap(false, Ordering::SeqCst);
        if was_running {
            Log::log_debug("Switcher stopped");
        }
        was_running
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Swap in a new configuration, keeping the current theme applier.
    ///
    /// The cached schedule and last state are dropped so the next check
    /// recomputes and re-applies. If running, that check happens now and its
    /// result is returned; `Ok(None)` when stopped.
    pub fn reload(&self, config: Config) -> Result<Option<CycleOutcome>> {
        self.replace(config, None)
    }

    /// Like `reload`, but also switch to `applier` before the check runs.
    pub fn reload_with_applier(
        &self,
        config: Config,
        applier: Arc<dyn ThemeApplier>,
    ) -> Result<Option<CycleOutcome>> {
        self.replace(config, Some(applier))
    }

    fn replace(
        &self,
        config: Config,
        applier: Option<Arc<dyn ThemeApplier>>,
    ) -> Result<Option<CycleOutcome>> {
        if let Some(applier) = applier {
            *write(&self.inner.applier) = applier;
        }
        *write(&self.inner.config) = Arc::new(config);
        *write(&self.inner.schedule) = None;
        *lock(&self.inner.last_state) = None;
        Log::log_block_start("Configuration reloaded");
        if self.is_running() {
            self.run_cycle()
        } else {
            Ok(None)
        }
    }

    pub fn config(&self) -> Arc<Config> {
        read(&self.inner.config).clone()
    }

    pub fn current_schedule(&self) -> Option<Arc<DaySchedule>> {
        read(&self.inner.schedule).clone()
    }

    pub fn last_state(&self) -> Option<TimeState> {
        *lock(&self.inner.last_state)
    }

    fn tick(inner: &Arc<Inner>, generation: u64) {
        if !inner.running.load(Ordering::SeqCst)
            || inner.generation.load(Ordering::SeqCst) != generation
        {
            return;
        }

        // Register the next check first so an error here cannot end the cycle.
        let delay = read(&inner.config).check_cycle;
        let weak: Weak<Inner> = Arc::downgrade(inner);
        inner.scheduler.after(
            delay,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    SwitcherService::tick(&inner, generation);
                }
            }),
        );

        let service = SwitcherService {
            inner: inner.clone(),
        };
        if let Err(e) = service.run_cycle() {
            Log::log_error(&format!("Theme check failed: {:#}", e));
        }
    }

    /// Today's schedule, recomputed if the local date has changed.
    fn schedule_for(&self, config: &Config, local_now: &DateTime<FixedOffset>) -> Arc<DaySchedule> {
        let today = local_now.date_naive();
        if let Some(cached) = read(&self.inner.schedule).as_ref() {
            if cached.date == today {
                return cached.clone();
            }
        }

        let fresh = Arc::new(compute_schedule(config, local_now));
        log_schedule(&fresh);
        if let Some(events) = &fresh.events {
            if let Some(boundary) = next_boundary(events, local_now, config.classifier.collar_minutes) {
                Log::log_debug(&format!("Next switch at {}", format_clock_time(&boundary)));
            }
        }
        *write(&self.inner.schedule) = Some(fresh.clone());
        fresh
    }

    /// Run one check now, independent of the scheduler.
    ///
    /// Returns `None` when there is nothing to classify against today.
    pub fn run_cycle(&self) -> Result<Option<CycleOutcome>> {
        let config = self.config();
        let local_now = config.zone.localize(self.inner.clock.now());
        let schedule = self.schedule_for(&config, &local_now);

        let state = match &schedule.events {
            Some(events) => classify(events, &local_now, &config.classifier),
            None if config.classifier.force_night => TimeState::Night,
            None if config.classifier.force_day => TimeState::Day,
            None => return Ok(None),
        };

        let mut last_state = lock(&self.inner.last_state);
        let applied = if should_update_state(*last_state, state) {
            let applier = read(&self.inner.applier).clone();
            let changes = apply_theme(applier.as_ref(), config.themes.for_state(state))?;
            *last_state = Some(state);
            changes
        } else {
            AppliedChanges::default()
        };

        Ok(Some(CycleOutcome { state, applied }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{GeoPosition, ZenithKind};
    use crate::scheduler::ManualScheduler;
    use crate::theme::{MockThemeApplier, ThemeChoice, ThemePair};
    use crate::time_source::SimulatedTimeSource;
    use crate::time_state::ClassifierConfig;
    use chrono::{Duration, NaiveTime, TimeZone, Utc};
    use std::time::Duration as StdDuration;

    #[derive(Default)]
    struct RecordingApplier {
        scheme: Mutex<Option<String>>,
        theme: Mutex<Option<String>>,
        writes: Mutex<Vec<String>>,
    }

    impl ThemeApplier for RecordingApplier {
        fn current_color_scheme(&self) -> Option<String> {
            self.scheme.lock().unwrap().clone()
        }
        fn current_window_theme(&self) -> Option<String> {
            self.theme.lock().unwrap().clone()
        }
        fn set_color_scheme(&self, name: &str) -> Result<()> {
            *self.scheme.lock().unwrap() = Some(name.to_string());
            self.writes.lock().unwrap().push(name.to_string());
            Ok(())
        }
        fn set_window_theme(&self, name: &str) -> Result<()> {
            *self.theme.lock().unwrap() = Some(name.to_string());
            self.writes.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    impl RecordingApplier {
        fn writes(&self) -> Vec<String> {
            self.writes.lock().unwrap().clone()
        }
    }

    fn nyc_config() -> Config {
        Config {
            check_cycle: StdDuration::from_secs(2),
            zone: ZoneSpec::Fixed(FixedOffset::west_opt(4 * 3600).unwrap()),
            override_times: false,
            overrides: None,
            position: Some(GeoPosition::new(40.7, -74.0).unwrap()),
            zenith: ZenithKind::Official,
            classifier: ClassifierConfig::default(),
            themes: ThemePair {
                day: ThemeChoice::new(Some("Light".into()), Some("Bright".into())),
                night: ThemeChoice::new(Some("Dark".into()), Some("Dim".into())),
            },
            preferences_path: None,
        }
    }

    /// 2020-06-21 at the given New York (UTC-4) wall-clock time.
    fn nyc_time(h: u32, m: u32) -> DateTime<Utc> {
        FixedOffset::west_opt(4 * 3600)
            .unwrap()
            .with_ymd_and_hms(2020, 6, 21, h, m, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    struct Harness {
        service: SwitcherService,
        scheduler: Arc<ManualScheduler>,
        applier: Arc<RecordingApplier>,
        clock: Arc<SimulatedTimeSource>,
    }

    fn harness(config: Config, start: DateTime<Utc>) -> Harness {
        let scheduler = Arc::new(ManualScheduler::new());
        let applier = Arc::new(RecordingApplier::default());
        let clock = Arc::new(SimulatedTimeSource::new(start));
        let service = SwitcherService::new(config, scheduler.clone(), applier.clone(), clock.clone());
        Harness {
            service,
            scheduler,
            applier,
            clock,
        }
    }

    #[test]
    fn test_start_applies_and_schedules_next_check() {
        let h = harness(nyc_config(), nyc_time(12, 0));
        assert!(h.service.start());
        assert_eq!(h.service.last_state(), Some(TimeState::Day));
        assert_eq!(h.applier.writes(), vec!["Light", "Bright"]);
        assert_eq!(h.scheduler.delays(), vec![StdDuration::from_secs(2)]);
    }

    #[test]
    fn test_start_is_idempotent() {
        let h = harness(nyc_config(), nyc_time(12, 0));
        assert!(h.service.start());
        assert!(!h.service.start());
        assert_eq!(h.scheduler.pending(), 1);
        assert_eq!(h.applier.writes().len(), 2);
    }

    #[test]
    fn test_each_tick_reschedules_itself() {
        let h = harness(nyc_config(), nyc_time(12, 0));
        h.service.start();
        for _ in 0..5 {
            assert!(h.scheduler.run_next());
            assert_eq!(h.scheduler.pending(), 1);
        }
        // Still day: nothing rewritten
        assert_eq!(h.applier.writes().len(), 2);
    }

    #[test]
    fn test_switches_at_sunset_only_once() {
        let h = harness(nyc_config(), nyc_time(20, 0));
        h.service.start();
        assert_eq!(h.service.last_state(), Some(TimeState::Day));

        h.clock.set(nyc_time(20, 45));
        h.scheduler.run_next();
        assert_eq!(h.service.last_state(), Some(TimeState::Night));
        assert_eq!(h.applier.writes(), vec!["Light", "Bright", "Dark", "Dim"]);

        h.clock.advance(Duration::minutes(5));
        h.scheduler.run_next();
        assert_eq!(h.applier.writes().len(), 4);
    }

    #[test]
    fn test_stop_ends_the_cycle() {
        let h = harness(nyc_config(), nyc_time(12, 0));
        h.service.start();
        assert!(h.service.stop());
        assert!(!h.service.stop());

        // The queued tick fires but neither works nor reschedules
        h.clock.set(nyc_time(23, 0));
        assert!(h.scheduler.run_next());
        assert_eq!(h.scheduler.pending(), 0);
        assert_eq!(h.service.last_state(), Some(TimeState::Day));
    }

    #[test]
    fn test_restart_ignores_stale_ticks() {
        let h = harness(nyc_config(), nyc_time(12, 0));
        h.service.start();
        h.service.stop();
        assert!(h.service.start());
        assert_eq!(h.scheduler.pending(), 2);

        // Old tick is discarded, new one reschedules: exactly one loop remains
        h.scheduler.run_next();
        h.scheduler.run_next();
        assert_eq!(h.scheduler.pending(), 1);
    }

    #[test]
    fn test_schedule_recomputed_on_date_rollover() {
        let h = harness(nyc_config(), nyc_time(12, 0));
        h.service.start();
        let first = h.service.current_schedule().unwrap();
        assert_eq!(first.source, ScheduleSource::Solar);
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2020, 6, 21).unwrap());

        h.clock.advance(Duration::hours(1));
        h.scheduler.run_next();
        assert!(Arc::ptr_eq(&first, &h.service.current_schedule().unwrap()));

        h.clock.advance(Duration::days(1));
        h.scheduler.run_next();
        let second = h.service.current_schedule().unwrap();
        assert_eq!(second.date, NaiveDate::from_ymd_opt(2020, 6, 22).unwrap());
        assert_ne!(first.events, second.events);
    }

    #[test]
    fn test_override_times_skip_the_solver() {
        let mut config = nyc_config();
        config.override_times = true;
        config.position = None;
        config.overrides = Some(OverrideTimes {
            sunrise: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            sunset: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        });
        let h = harness(config, nyc_time(18, 30));
        h.service.start();

        let schedule = h.service.current_schedule().unwrap();
        assert_eq!(schedule.source, ScheduleSource::Override);
        assert_eq!(
            schedule.events.unwrap().sunset().to_rfc3339(),
            "2020-06-21T18:00:00-04:00"
        );
        assert_eq!(h.service.last_state(), Some(TimeState::Night));
    }

    #[test]
    fn test_missing_position_falls_back_to_overrides() {
        let mut config = nyc_config();
        config.position = None;
        config.overrides = Some(OverrideTimes {
            sunrise: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            sunset: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
        });
        let h = harness(config, nyc_time(6, 30));
        let outcome = h.service.run_cycle().unwrap().unwrap();
        assert_eq!(outcome.state, TimeState::Night);
        assert_eq!(
            h.service.current_schedule().unwrap().source,
            ScheduleSource::Fallback
        );
    }

    #[test]
    fn test_no_schedule_skips_switching_unless_forced() {
        let mut config = nyc_config();
        config.position = None;
        let h = harness(config.clone(), nyc_time(12, 0));
        assert_eq!(h.service.run_cycle().unwrap(), None);
        assert!(h.applier.writes().is_empty());

        config.classifier.force_night = true;
        assert_eq!(h.service.reload(config).unwrap(), None);
        let outcome = h.service.run_cycle().unwrap().unwrap();
        assert_eq!(outcome.state, TimeState::Night);
        assert!(outcome.applied.any());
    }

    #[test]
    fn test_force_flags_override_the_clock() {
        let mut config = nyc_config();
        config.classifier.force_night = true;
        let h = harness(config.clone(), nyc_time(12, 0));
        h.service.start();
        assert_eq!(h.service.last_state(), Some(TimeState::Night));

        config.classifier.force_night = false;
        config.classifier.force_day = true;
        h.service.reload(config).unwrap();
        h.clock.set(nyc_time(23, 0));
        h.scheduler.run_next();
        assert_eq!(h.service.last_state(), Some(TimeState::Day));
    }

    #[test]
    fn test_reload_reapplies_new_themes() {
        let h = harness(nyc_config(), nyc_time(12, 0));
        h.service.start();

        let mut config = nyc_config();
        config.themes.day = ThemeChoice::new(Some("Sepia".into()), None);
        let outcome = h.service.reload(config).unwrap().unwrap();
        assert!(outcome.applied.colour_scheme);

        assert_eq!(h.applier.writes(), vec!["Light", "Bright", "Sepia"]);
        assert_eq!(h.service.last_state(), Some(TimeState::Day));
    }

    #[test]
    fn test_reload_changes_check_cycle() {
        let h = harness(nyc_config(), nyc_time(12, 0));
        h.service.start();
        let mut config = nyc_config();
        config.check_cycle = StdDuration::from_secs(30);
        h.service.reload(config).unwrap();
        h.scheduler.run_next();
        assert_eq!(h.scheduler.delays(), vec![StdDuration::from_secs(30)]);
    }

    #[test]
    fn test_reload_with_applier_writes_to_new_target() {
        let h = harness(nyc_config(), nyc_time(12, 0));
        h.service.start();

        let replacement = Arc::new(RecordingApplier::default());
        h.service
            .reload_with_applier(nyc_config(), replacement.clone())
            .unwrap();
        assert_eq!(replacement.writes(), vec!["Light", "Bright"]);
        assert_eq!(h.applier.writes().len(), 2);

        h.clock.set(nyc_time(22, 0));
        h.scheduler.run_next();
        assert_eq!(replacement.writes(), vec!["Light", "Bright", "Dark", "Dim"]);
        assert_eq!(h.applier.writes().len(), 2);
    }

    #[test]
    fn test_reload_reports_failed_theme_write() {
        let h = harness(nyc_config(), nyc_time(12, 0));
        h.service.start();

        let mut broken = MockThemeApplier::new();
        broken.expect_current_color_scheme().return_const(None::<String>);
        broken
            .expect_set_color_scheme()
            .returning(|_| Err(anyhow::anyhow!("preferences are read-only")));

        let mut config = nyc_config();
        config.classifier.collar_minutes = 5.0;
        let err = h
            .service
            .reload_with_applier(config, Arc::new(broken))
            .unwrap_err();
        assert!(err.to_string().contains("read-only"));
        // New config is in place and the state is left unset for a retry
        assert_eq!(h.service.config().classifier.collar_minutes, 5.0);
        assert_eq!(h.service.last_state(), None);
    }

    #[test]
    fn test_collar_delays_night() {
        let mut config = nyc_config();
        config.classifier.collar_minutes = 60.0;
        // Sunset is about 20:31; with an hour of collar 21:00 is still day
        let h = harness(config, nyc_time(21, 0));
        assert_eq!(h.service.run_cycle().unwrap().unwrap().state, TimeState::Day);
        h.clock.set(nyc_time(21, 45));
        assert_eq!(h.service.run_cycle().unwrap().unwrap().state, TimeState::Night);
    }

    #[test]
    fn test_dropped_service_tick_is_harmless() {
        let scheduler = Arc::new(ManualScheduler::new());
        {
            let service = SwitcherService::new(
                nyc_config(),
                scheduler.clone(),
                Arc::new(RecordingApplier::default()),
                Arc::new(SimulatedTimeSource::new(nyc_time(12, 0))),
            );
            service.start();
        }
        assert!(scheduler.run_next());
        assert_eq!(scheduler.pending(), 0);
    }
}
