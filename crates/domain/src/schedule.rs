use chrono::{Datelike, Local, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

/// Days a schedule applies to, Monday through Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DaySet(pub u8);

impl DaySet {
    pub const ALL: DaySet = DaySet(0b0111_1111);

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn with(mut self, day: Weekday) -> Self {
        self.0 |= 1 << day.num_days_from_monday();
        self
    }

    pub fn from_days(days: &[Weekday]) -> Self {
        days.iter().fold(DaySet::default(), |set, d| set.with(*d))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleMode {
    Sleep,
    Homework,
    TotalBlock,
    Custom,
}

/// A recurring time window that contributes blocked categories/apps (or a
/// full block) while active.
///
/// Times are minutes into the local day. `start > end` denotes a window
/// crossing midnight; the `days` set names the start day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub days: DaySet,
    pub start_minutes: u16,
    pub end_minutes: u16,
    pub active: bool,
    pub mode: ScheduleMode,
    #[serde(default)]
    pub blocked_categories: Vec<String>,
    #[serde(default)]
    pub blocked_apps: Vec<String>,
    #[serde(default)]
    pub block_all: bool,
}

/// What a schedule blocks while its window is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEffect {
    pub categories: Vec<String>,
    pub apps: Vec<String>,
    pub block_all: bool,
}

const SLEEP_CATEGORIES: &[&str] = &["social", "video", "gaming"];
const SLEEP_APPS: &[&str] = &[
    "tiktok", "youtube", "instagram", "snapchat", "netflix", "twitch", "roblox", "fortnite",
    "discord",
];
const HOMEWORK_CATEGORIES: &[&str] = &["social", "video", "gaming"];
const HOMEWORK_APPS: &[&str] = &[
    "tiktok", "youtube", "instagram", "facebook", "snapchat", "twitter", "reddit", "twitch",
    "netflix", "roblox", "fortnite",
];

impl Schedule {
    /// The window contains the given local time. `start == end` is never
    /// active; a cross-midnight window matches its start day in the evening
    /// part and the *following* local day in the early-morning part.
    pub fn window_contains(&self, now: NaiveDateTime) -> bool {
        if !self.active || self.start_minutes == self.end_minutes {
            return false;
        }

        let minute = (now.hour() * 60 + now.minute()) as u16;
        let today = now.weekday();

        if self.start_minutes < self.end_minutes {
            self.days.contains(today) && minute >= self.start_minutes && minute < self.end_minutes
        } else {
            (self.days.contains(today) && minute >= self.start_minutes)
                || (self.days.contains(today.pred()) && minute < self.end_minutes)
        }
    }

    pub fn is_active_now(&self) -> bool {
        self.window_contains(Local::now().naive_local())
    }

    /// Mode presets resolve to fixed sets; `Custom` uses the stored lists.
    /// Pure over the schedule fields, so re-deriving is idempotent.
    pub fn effect(&self) -> ScheduleEffect {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        match self.mode {
            ScheduleMode::Sleep => ScheduleEffect {
                categories: owned(SLEEP_CATEGORIES),
                apps: owned(SLEEP_APPS),
                block_all: self.block_all,
            },
            ScheduleMode::Homework => ScheduleEffect {
                categories: owned(HOMEWORK_CATEGORIES),
                apps: owned(HOMEWORK_APPS),
                block_all: self.block_all,
            },
            ScheduleMode::TotalBlock => ScheduleEffect {
                categories: Vec::new(),
                apps: Vec::new(),
                block_all: true,
            },
            ScheduleMode::Custom => ScheduleEffect {
                categories: self.blocked_categories.clone(),
                apps: self.blocked_apps.clone(),
                block_all: self.block_all,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn schedule(days: DaySet, start: u16, end: u16) -> Schedule {
        Schedule {
            days,
            start_minutes: start,
            end_minutes: end,
            active: true,
            mode: ScheduleMode::Custom,
            blocked_categories: vec![],
            blocked_apps: vec![],
            block_all: false,
        }
    }

    #[test]
    fn test_plain_window() {
        // 2026-01-05 is a Monday
        let s = schedule(DaySet::default().with(Weekday::Mon), 9 * 60, 17 * 60);
        assert!(s.window_contains(at(2026, 1, 5, 12, 0)));
        assert!(!s.window_contains(at(2026, 1, 5, 8, 59)));
        assert!(!s.window_contains(at(2026, 1, 5, 17, 0)));
        assert!(!s.window_contains(at(2026, 1, 6, 12, 0)));
    }

    #[test]
    fn test_start_equals_end_never_active() {
        let s = schedule(DaySet::ALL, 600, 600);
        assert!(!s.window_contains(at(2026, 1, 5, 10, 0)));
    }

    #[test]
    fn test_cross_midnight_matches_start_day() {
        // Monday 22:00 → 06:00: active Monday night and the early hours of
        // Tuesday, but not the early hours of Monday itself.
        let s = schedule(DaySet::default().with(Weekday::Mon), 22 * 60, 6 * 60);
        assert!(s.window_contains(at(2026, 1, 5, 23, 0))); // Mon 23:00
        assert!(s.window_contains(at(2026, 1, 6, 0, 30))); // Tue 00:30
        assert!(!s.window_contains(at(2026, 1, 5, 0, 30))); // Mon 00:30
        assert!(!s.window_contains(at(2026, 1, 6, 23, 0))); // Tue 23:00
    }

    #[test]
    fn test_inactive_schedule_never_matches() {
        let mut s = schedule(DaySet::ALL, 0, 1439);
        s.active = false;
        assert!(!s.window_contains(at(2026, 1, 5, 12, 0)));
    }

    #[test]
    fn test_total_block_mode_forces_block_all() {
        let mut s = schedule(DaySet::ALL, 0, 60);
        s.mode = ScheduleMode::TotalBlock;
        assert!(s.effect().block_all);
    }

    #[test]
    fn test_custom_mode_uses_stored_sets() {
        let mut s = schedule(DaySet::ALL, 0, 60);
        s.blocked_categories = vec!["gaming".into()];
        s.blocked_apps = vec!["roblox".into()];
        let effect = s.effect();
        assert_eq!(effect.categories, vec!["gaming".to_string()]);
        assert_eq!(effect.apps, vec!["roblox".to_string()]);
        assert!(!effect.block_all);
    }

    #[test]
    fn test_effect_idempotent() {
        let mut s = schedule(DaySet::ALL, 0, 60);
        s.mode = ScheduleMode::Sleep;
        assert_eq!(s.effect(), s.effect());
    }

    #[test]
    fn test_dayset_roundtrip() {
        let set = DaySet::from_days(&[Weekday::Mon, Weekday::Sun]);
        assert!(set.contains(Weekday::Mon));
        assert!(set.contains(Weekday::Sun));
        assert!(!set.contains(Weekday::Wed));
    }
}
