use chrono::{Datelike, NaiveDate, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

/// The shop's bookable window: daily opening hours, slot granularity and the
/// weekdays it is closed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShopSchedule {
    pub opens_at: NaiveTime,
    pub closes_at: NaiveTime,
    pub slot_minutes: u32,
    pub closed_days: Vec<Weekday>,
}

impl Default for ShopSchedule {
    fn default() -> Self {
        Self {
            opens_at: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            closes_at: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
            slot_minutes: 30,
            closed_days: vec![Weekday::Sun, Weekday::Mon],
        }
    }
}

impl ShopSchedule {
    pub fn parse(
        opens_at: &str,
        closes_at: &str,
        slot_minutes: u32,
        closed_days: &str,
    ) -> anyhow::Result<Self> {
        let opens_at = parse_time(opens_at)?;
        let closes_at = parse_time(closes_at)?;
        if opens_at >= closes_at {
            anyhow::bail!("shop must open before it closes ({opens_at} >= {closes_at})");
        }
        if slot_minutes == 0 || slot_minutes > 24 * 60 {
            anyhow::bail!("slot granularity out of range: {slot_minutes}");
        }

        let closed_days = closed_days
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(parse_weekday)
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            opens_at,
            closes_at,
            slot_minutes,
            closed_days,
        })
    }

    pub fn is_closed(&self, date: NaiveDate) -> bool {
        self.closed_days.contains(&date.weekday())
    }

    /// Start times from opening, stepping by the slot granularity, whose
    /// `duration_minutes` still finishes by closing time.
    pub fn candidate_times(&self, duration_minutes: i32) -> Vec<NaiveTime> {
        let mut times = vec![];
        if duration_minutes <= 0 {
            return times;
        }
        let close = minutes_from_midnight(self.closes_at);
        let mut start = minutes_from_midnight(self.opens_at);
        while start + duration_minutes as u32 <= close {
            if let Some(time) = NaiveTime::from_num_seconds_from_midnight_opt(start * 60, 0) {
                times.push(time);
            }
            start += self.slot_minutes;
        }
        times
    }

    /// Whether `time` sits on the slot grid inside opening hours.
    pub fn is_on_grid(&self, time: NaiveTime) -> bool {
        let minutes = minutes_from_midnight(time);
        let opens = minutes_from_midnight(self.opens_at);
        time.second() == 0
            && minutes >= opens
            && (minutes - opens) % self.slot_minutes == 0
    }

    pub fn to_human_readable(&self) -> String {
        let hours = format!(
            "{}-{}",
            self.opens_at.format("%H:%M"),
            self.closes_at.format("%H:%M")
        );
        if self.closed_days.is_empty() {
            return format!("Open daily {hours}");
        }

        let mut closed = self.closed_days.clone();
        closed.sort_by_key(|d| d.num_days_from_monday());
        let closed = closed
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!("Open {hours}, closed {closed}")
    }
}

fn minutes_from_midnight(time: NaiveTime) -> u32 {
    time.num_seconds_from_midnight() / 60
}

fn parse_weekday(s: &str) -> anyhow::Result<Weekday> {
    match s.to_lowercase().as_str() {
        "mon" => Ok(Weekday::Mon),
        "tue" => Ok(Weekday::Tue),
        "wed" => Ok(Weekday::Wed),
        "thu" => Ok(Weekday::Thu),
        "fri" => Ok(Weekday::Fri),
        "sat" => Ok(Weekday::Sat),
        "sun" => Ok(Weekday::Sun),
        _ => Err(anyhow::anyhow!("invalid weekday: {s}")),
    }
}

fn parse_time(s: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|_| anyhow::anyhow!("invalid time format: {s}"))
}
