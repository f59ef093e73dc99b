//! Expiration scheduler for the active session.
//!
//! The scheduler never sleeps and never reads the clock itself. Callers hand
//! it `now`, ask for `next_deadline()`, and call `fire_due(now)` once that
//! deadline has passed. This keeps every timer visible as a value, so
//! disarming is a plain reset and a stale timer cannot fire after a re-arm.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

/// How long before expiry the warning is shown.
pub const WARNING_LEAD_SECS: i64 = 60;

/// Period of the countdown shown while the warning is up.
pub const COUNTDOWN_TICK_SECS: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub warning_lead: Duration,
    pub countdown_tick: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            warning_lead: Duration::seconds(WARNING_LEAD_SECS),
            countdown_tick: Duration::seconds(COUNTDOWN_TICK_SECS),
        }
    }
}

impl SchedulerConfig {
    /// Starting value of the countdown, in whole ticks.
    pub fn countdown_start(&self) -> u32 {
        let tick_ms = self.countdown_tick.num_milliseconds().max(1);
        u32::try_from(self.warning_lead.num_milliseconds() / tick_ms).unwrap_or(u32::MAX)
    }
}

/// A single timer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    Once { at: DateTime<Utc> },
    Every { next: DateTime<Utc>, period: Duration },
}

impl Timer {
    pub fn deadline(&self) -> DateTime<Utc> {
        match *self {
            Timer::Once { at } => at,
            Timer::Every { next, .. } => next,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.deadline() <= now
    }
}

/// Timer kinds, ordered by which fires first when deadlines tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum TimerKind {
    Warning,
    Countdown,
    Logout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Idle,
    Armed,
    Warning,
    Dismissed,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    WarningShown { seconds_left: u32 },
    CountdownTick { seconds_left: u32 },
    Expired,
}

#[derive(Debug, Clone)]
pub struct ExpirationScheduler {
    config: SchedulerConfig,
    phase: SchedulerPhase,
    warning: Option<Timer>,
    logout: Option<Timer>,
    countdown: Option<Timer>,
    seconds_left: u32,
}

impl Default for ExpirationScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl ExpirationScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            phase: SchedulerPhase::Idle,
            warning: None,
            logout: None,
            countdown: None,
            seconds_left: config.countdown_start(),
        }
    }

    /// Arm the warning and logout timers for a session ending at `expires_at`.
    ///
    /// Any previously armed timers are cleared first. Sessions shorter than
    /// the warning lead time get no warning, only the logout at expiry.
    pub fn arm(&mut self, expires_at: DateTime<Utc>, now: DateTime<Utc>) {
        self.disarm();

        let time_until_expiration = expires_at - now;
        let time_until_warning = time_until_expiration - self.config.warning_lead;

        if time_until_warning > Duration::zero() {
            self.warning = Some(Timer::Once {
                at: now + time_until_warning,
            });
        }
        self.logout = Some(Timer::Once { at: expires_at });
        self.phase = SchedulerPhase::Armed;

        debug!(
            expires_in_ms = time_until_expiration.num_milliseconds(),
            warning_in_ms = time_until_warning.num_milliseconds(),
            with_warning = self.warning.is_some(),
            "Expiration timers armed"
        );
    }

    /// Clear every timer and return to idle.
    pub fn disarm(&mut self) {
        self.warning = None;
        self.logout = None;
        self.countdown = None;
        self.seconds_left = self.config.countdown_start();
        self.phase = SchedulerPhase::Idle;
    }

    /// Hide the warning and stop the countdown. The logout timer stays armed.
    pub fn dismiss_warning(&mut self) -> bool {
        if self.phase != SchedulerPhase::Warning {
            return false;
        }
        self.countdown = None;
        self.phase = SchedulerPhase::Dismissed;
        debug!(seconds_left = self.seconds_left, "Expiration warning dismissed");
        true
    }

    /// Earliest instant at which `fire_due` has work to do.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        [self.warning, self.countdown, self.logout]
            .into_iter()
            .flatten()
            .map(|timer| timer.deadline())
            .min()
    }

    /// Fire every timer due at `now`, in deadline order.
    pub fn fire_due(&mut self, now: DateTime<Utc>) -> Vec<SchedulerEvent> {
        let mut events = Vec::new();

        while let Some((kind, at)) = self.next_due(now) {
            match kind {
                TimerKind::Warning => {
                    self.warning = None;
                    self.seconds_left = self.config.countdown_start();
                    self.countdown = Some(Timer::Every {
                        next: at + self.config.countdown_tick,
                        period: self.config.countdown_tick,
                    });
                    self.phase = SchedulerPhase::Warning;
                    info!(seconds_left = self.seconds_left, "Session about to expire");
                    events.push(SchedulerEvent::WarningShown {
                        seconds_left: self.seconds_left,
                    });
                }
                TimerKind::Countdown => {
                    if self.seconds_left <= 1 {
                        self.seconds_left = 0;
                        self.countdown = None;
                    } else {
                        self.seconds_left -= 1;
                        if let Some(Timer::Every { next, period }) = self.countdown {
                            self.countdown = Some(Timer::Every {
                                next: next + period,
                                period,
                            });
                        }
                    }
                    events.push(SchedulerEvent::CountdownTick {
                        seconds_left: self.seconds_left,
                    });
                }
                TimerKind::Logout => {
                    self.warning = None;
                    self.countdown = None;
                    self.logout = None;
                    self.phase = SchedulerPhase::Expired;
                    info!("Session expired");
                    events.push(SchedulerEvent::Expired);
                    break;
                }
            }
        }

        events
    }

    fn next_due(&self, now: DateTime<Utc>) -> Option<(TimerKind, DateTime<Utc>)> {
        [
            (TimerKind::Warning, self.warning),
            (TimerKind::Countdown, self.countdown),
            (TimerKind::Logout, self.logout),
        ]
        .into_iter()
        .filter_map(|(kind, timer)| timer.filter(|t| t.is_due(now)).map(|t| (kind, t.deadline())))
        .min_by_key(|&(kind, at)| (at, kind))
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    /// Countdown value; only meaningful while the warning is up.
    pub fn seconds_left(&self) -> u32 {
        self.seconds_left
    }

    pub fn is_warning_visible(&self) -> bool {
        self.phase == SchedulerPhase::Warning
    }

    pub fn warning_timer(&self) -> Option<Timer> {
        self.warning
    }

    pub fn logout_timer(&self) -> Option<Timer> {
        self.logout
    }

    pub fn countdown_timer(&self) -> Option<Timer> {
        self.countdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn test_arm_schedules_warning_and_logout() {
        let mut scheduler = ExpirationScheduler::default();
        scheduler.arm(at(120_000), at(0));

        assert_eq!(scheduler.phase(), SchedulerPhase::Armed);
        assert_eq!(scheduler.warning_timer(), Some(Timer::Once { at: at(60_000) }));
        assert_eq!(scheduler.logout_timer(), Some(Timer::Once { at: at(120_000) }));
        assert_eq!(scheduler.next_deadline(), Some(at(60_000)));
    }

    #[test]
    fn test_short_session_skips_warning() {
        let mut scheduler = ExpirationScheduler::default();
        scheduler.arm(at(5_000), at(0));

        assert_eq!(scheduler.warning_timer(), None);
        assert!(scheduler.fire_due(at(4_999)).is_empty());
        assert_eq!(scheduler.fire_due(at(5_000)), vec![SchedulerEvent::Expired]);
        assert_eq!(scheduler.phase(), SchedulerPhase::Expired);
    }

    #[test]
    fn test_session_of_exactly_lead_time_skips_warning() {
        let mut scheduler = ExpirationScheduler::default();
        scheduler.arm(at(60_000), at(0));
        assert_eq!(scheduler.warning_timer(), None);
    }

    #[test]
    fn test_countdown_runs_down_to_zero() {
        let mut scheduler = ExpirationScheduler::default();
        scheduler.arm(at(61_000), at(0));

        assert!(scheduler.fire_due(at(999)).is_empty());
        assert_eq!(
            scheduler.fire_due(at(1_000)),
            vec![SchedulerEvent::WarningShown { seconds_left: 60 }]
        );
        assert!(scheduler.is_warning_visible());

        for (i, expected) in (1..60).rev().enumerate() {
            let now = at(2_000 + i as i64 * 1_000);
            assert_eq!(
                scheduler.fire_due(now),
                vec![SchedulerEvent::CountdownTick { seconds_left: expected }]
            );
        }
        assert_eq!(scheduler.seconds_left(), 1);

        // Last tick and the logout share the same instant; the tick goes first.
        assert_eq!(
            scheduler.fire_due(at(61_000)),
            vec![
                SchedulerEvent::CountdownTick { seconds_left: 0 },
                SchedulerEvent::Expired,
            ]
        );
        assert_eq!(scheduler.next_deadline(), None);
    }

    #[test]
    fn test_late_poll_catches_up_in_order() {
        let mut scheduler = ExpirationScheduler::default();
        scheduler.arm(at(61_000), at(0));

        let events = scheduler.fire_due(at(3_500));
        assert_eq!(
            events,
            vec![
                SchedulerEvent::WarningShown { seconds_left: 60 },
                SchedulerEvent::CountdownTick { seconds_left: 59 },
                SchedulerEvent::CountdownTick { seconds_left: 58 },
            ]
        );
        assert_eq!(scheduler.next_deadline(), Some(at(4_000)));
    }

    #[test]
    fn test_countdown_alone_never_expires() {
        let config = SchedulerConfig {
            warning_lead: Duration::seconds(3),
            countdown_tick: Duration::seconds(1),
        };
        let mut scheduler = ExpirationScheduler::new(config);
        scheduler.arm(at(10_000), at(0));
        let events = scheduler.fire_due(at(9_999));
        assert_eq!(
            events.last(),
            Some(&SchedulerEvent::CountdownTick { seconds_left: 1 })
        );
        assert!(!events.contains(&SchedulerEvent::Expired));
        assert_eq!(scheduler.phase(), SchedulerPhase::Warning);
    }

    #[test]
    fn test_dismiss_keeps_logout_armed() {
        let mut scheduler = ExpirationScheduler::default();
        scheduler.arm(at(61_000), at(0));
        scheduler.fire_due(at(1_000));

        assert!(scheduler.dismiss_warning());
        assert_eq!(scheduler.phase(), SchedulerPhase::Dismissed);
        assert_eq!(scheduler.countdown_timer(), None);
        assert_eq!(scheduler.next_deadline(), Some(at(61_000)));

        // Nothing fires between dismissal and expiry
        assert!(scheduler.fire_due(at(60_999)).is_empty());
        assert_eq!(scheduler.fire_due(at(61_000)), vec![SchedulerEvent::Expired]);
    }

    #[test]
    fn test_dismiss_without_warning_is_noop() {
        let mut scheduler = ExpirationScheduler::default();
        assert!(!scheduler.dismiss_warning());
        scheduler.arm(at(120_000), at(0));
        assert!(!scheduler.dismiss_warning());
        assert_eq!(scheduler.phase(), SchedulerPhase::Armed);
    }

    #[test]
    fn test_rearm_replaces_previous_timers() {
        let mut scheduler = ExpirationScheduler::default();
        scheduler.arm(at(30_000), at(0));
        scheduler.arm(at(200_000), at(10_000));

        assert!(scheduler.fire_due(at(30_000)).is_empty());
        assert_eq!(scheduler.logout_timer(), Some(Timer::Once { at: at(200_000) }));
        assert_eq!(scheduler.warning_timer(), Some(Timer::Once { at: at(140_000) }));
    }

    #[test]
    fn test_disarm_clears_everything() {
        let mut scheduler = ExpirationScheduler::default();
        scheduler.arm(at(61_000), at(0));
        scheduler.fire_due(at(1_000));
        scheduler.disarm();

        assert_eq!(scheduler.phase(), SchedulerPhase::Idle);
        assert_eq!(scheduler.next_deadline(), None);
        assert!(scheduler.fire_due(at(100_000)).is_empty());
        assert_eq!(scheduler.seconds_left(), 60);
    }

    #[test]
    fn test_arm_already_expired_fires_immediately() {
        let mut scheduler = ExpirationScheduler::default();
        scheduler.arm(at(1_000), at(2_000));
        assert_eq!(scheduler.fire_due(at(2_000)), vec![SchedulerEvent::Expired]);
    }

    #[test]
    fn test_countdown_start() {
        assert_eq!(SchedulerConfig::default().countdown_start(), 60);
        let config = SchedulerConfig {
            warning_lead: Duration::seconds(10),
            countdown_tick: Duration::milliseconds(500),
        };
        assert_eq!(config.countdown_start(), 20);
    }
}
