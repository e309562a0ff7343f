use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use super::window::RequestWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowDay {
    Date(NaiveDate),
    Weekday(Weekday),
}

impl Default for WindowDay {
    fn default() -> Self {
        WindowDay::Weekday(Weekday::Sun)
    }
}

/// One declared slot of availability on a date or a recurring weekday.
///
/// `end == 00:00` means the slot runs to midnight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub day: WindowDay,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl AvailabilityWindow {
    pub fn dated(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            day: WindowDay::Date(date),
            start,
            end,
        }
    }

    pub fn weekly(weekday: Weekday, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            day: WindowDay::Weekday(weekday),
            start,
            end,
        }
    }

    /// Dated slots first (chronological), then weekly slots Monday..Sunday.
    pub fn sort_key(&self) -> (u8, i32, NaiveTime, NaiveTime) {
        match self.day {
            WindowDay::Date(date) => (0, date.num_days_from_ce(), self.start, self.end),
            WindowDay::Weekday(weekday) => {
                (1, weekday.num_days_from_monday() as i32, self.start, self.end)
            }
        }
    }

    pub fn applies_on(&self, date: NaiveDate) -> bool {
        match self.day {
            WindowDay::Date(day) => day == date,
            WindowDay::Weekday(weekday) => date.weekday() == weekday,
        }
    }

    /// Concrete UTC interval on `date`, or `None` for an empty slot.
    fn interval_on(&self, date: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start = date.and_time(self.start).and_utc();
        let end = if self.end == NaiveTime::MIN {
            date.and_time(NaiveTime::MIN).and_utc() + Duration::days(1)
        } else {
            date.and_time(self.end).and_utc()
        };
        (end > start).then_some((start, end))
    }

    /// Cut `[from, to)` into per-date slots.
    pub fn split_interval(from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Self> {
        let mut slots = Vec::new();
        let mut cursor = from;
        while cursor < to {
            let date = cursor.date_naive();
            let Some(next_midnight) = date.succ_opt().map(|d| d.and_time(NaiveTime::MIN).and_utc())
            else {
                break;
            };
            let slot_end = to.min(next_midnight);
            let end_time = if slot_end == next_midnight {
                NaiveTime::MIN
            } else {
                slot_end.time()
            };
            slots.push(Self::dated(date, cursor.time(), end_time));
            cursor = slot_end;
        }
        slots
    }
}

/// Share of the requested window covered by the union of matching slots.
///
/// No requested window means no constraint, so the ratio is `1.0`. A request
/// against an empty availability list is `0.0`.
pub fn availability_overlap_ratio(
    window: Option<&RequestWindow>,
    availability: &[AvailabilityWindow],
) -> f64 {
    let Some(window) = window else {
        return 1.0;
    };
    let requested = window.duration().num_seconds();
    if requested <= 0 || availability.is_empty() {
        return 0.0;
    }

    let mut pieces = Vec::new();
    let last_day = window.end().date_naive();
    let mut day = window.start().date_naive();
    loop {
        for slot in availability.iter().filter(|slot| slot.applies_on(day)) {
            if let Some((start, end)) = slot.interval_on(day) {
                let start = start.max(window.start());
                let end = end.min(window.end());
                if end > start {
                    pieces.push((start, end));
                }
            }
        }
        match day.succ_opt() {
            Some(next) if next <= last_day => day = next,
            _ => break,
        }
    }

    pieces.sort();
    let mut covered = 0i64;
    let mut current: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
    for (start, end) in pieces {
        current = match current {
            Some((cur_start, cur_end)) if start <= cur_end => Some((cur_start, cur_end.max(end))),
            Some((cur_start, cur_end)) => {
                covered += (cur_end - cur_start).num_seconds();
                Some((start, end))
            }
            None => Some((start, end)),
        };
    }
    if let Some((start, end)) = current {
        covered += (end - start).num_seconds();
    }

    (covered as f64 / requested as f64).clamp(0.0, 1.0)
}
