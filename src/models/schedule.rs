use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Fixed three hour installation windows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, strum::EnumIter)]
pub enum TimeSlot {
    Morning,
    Midday,
    Afternoon,
    Evening,
}

impl TimeSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "08-11",
            Self::Midday => "11-14",
            Self::Afternoon => "14-17",
            Self::Evening => "17-20",
        }
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "8-11", "08:00-11:00" and "08-11" are all seen in the wild
        let compact: String = s
            .trim()
            .split('-')
            .map(|part| {
                let hour = part.trim().split(':').next().unwrap_or_default();
                format!("{:0>2}", hour)
            })
            .collect::<Vec<_>>()
            .join("-");
        match compact.as_str() {
            "08-11" => Ok(Self::Morning),
            "11-14" => Ok(Self::Midday),
            "14-17" => Ok(Self::Afternoon),
            "17-20" => Ok(Self::Evening),
            _ => Err(format!(
                "invalid time slot '{}', expected one of 08-11, 11-14, 14-17, 17-20",
                s
            )),
        }
    }
}

impl Serialize for TimeSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TimeSlot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Half-open `[monday, next monday)` range for the week containing `date`.
pub fn week_range(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = week_start(date);
    (monday, monday + Duration::days(7))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use proptest::prelude::*;

    #[test]
    fn slot_parsing_accepts_variants() {
        assert_eq!("08-11".parse::<TimeSlot>().unwrap(), TimeSlot::Morning);
        assert_eq!("8-11".parse::<TimeSlot>().unwrap(), TimeSlot::Morning);
        assert_eq!("14:00-17:00".parse::<TimeSlot>().unwrap(), TimeSlot::Afternoon);
        assert!("09-12".parse::<TimeSlot>().is_err());
    }

    #[test]
    fn slots_order_by_time_of_day() {
        assert!(TimeSlot::Morning < TimeSlot::Evening);
    }

    #[test]
    fn week_starts_on_monday() {
        let sunday = NaiveDate::from_ymd_opt(2025, 4, 20).unwrap();
        assert_eq!(week_start(sunday), NaiveDate::from_ymd_opt(2025, 4, 14).unwrap());
        let monday = NaiveDate::from_ymd_opt(2025, 4, 14).unwrap();
        assert_eq!(week_start(monday), monday);
    }

    proptest! {
        #[test]
        fn week_range_contains_date(days in 0i64..3650) {
            let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + Duration::days(days);
            let (start, end) = week_range(date);
            prop_assert_eq!(start.weekday(), Weekday::Mon);
            prop_assert!(start <= date && date < end);
            prop_assert_eq!((end - start).num_days(), 7);
        }
    }
}
