//! Calendar view helpers: which tasks fall on which local day.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, Local, Months, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};

use crate::task::Task;

/// Latest year a relative due date may land in.
const MAX_DUE_YEAR: i32 = 9999;

/// Parse due-date input relative to `today`.
///
/// Accepts "today", "tomorrow", "yesterday", "eow"/"end of week", "eom"/"end of
/// month", "in 3d" / "in 2w" / "in 1m", a weekday name ("fri", "next monday") and
/// `YYYY-MM-DD`.
pub fn parse_due_input(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = input.trim().to_lowercase();
    match s.as_str() {
        "today" => return Some(today),
        "tomorrow" => return Some(today + Duration::days(1)),
        "yesterday" => return Some(today - Duration::days(1)),
        "end of week" | "eow" => {
            let to_sunday = 6 - today.weekday().num_days_from_monday() as i64;
            return Some(today + Duration::days(to_sunday));
        }
        "end of month" | "eom" => {
            let first = today.with_day(1)?;
            return Some(shift_month(first, 1) - Duration::days(1));
        }
        _ => {}
    }

    if let Some(rest) = s.strip_prefix("in ") {
        let rest = rest.trim();
        let unit = rest.chars().last()?;
        let n: i64 = rest[..rest.len() - unit.len_utf8()].trim().parse().ok()?;
        // Offsets past the calendar's range are rejected like any other bad input.
        let due = match unit {
            'd' => today.checked_add_signed(Duration::try_days(n)?),
            'w' => today.checked_add_signed(Duration::try_weeks(n)?),
            'm' => checked_shift_month(today, i32::try_from(n).ok()?),
            _ => None,
        };
        return due.filter(|d| (1..=MAX_DUE_YEAR).contains(&d.year()));
    }

    let (next_week, name) = match s.strip_prefix("next ") {
        Some(name) => (true, name),
        None => (false, s.strip_prefix("this ").unwrap_or(&s)),
    };
    if let Ok(weekday) = name.parse::<Weekday>() {
        let ahead = (weekday.num_days_from_monday() + 7 - today.weekday().num_days_from_monday()) % 7;
        let ahead = if next_week { ahead + 7 } else { ahead };
        return Some(today + Duration::days(ahead as i64));
    }

    NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
}

/// Start of `date` in local time, as UTC.
pub fn local_start_of_day(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&naive).earliest() {
        Some(local) => local.with_timezone(&Utc),
        None => Utc.from_utc_datetime(&naive),
    }
}

/// Tasks whose due date falls on `date` in the given time zone.
pub fn tasks_on_in<'a, Tz: TimeZone>(tasks: &'a [Task], date: NaiveDate, tz: &Tz) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|t| t.due_date.with_timezone(tz).date_naive() == date)
        .collect()
}

/// Tasks due on `date` in local time.
pub fn tasks_on(tasks: &[Task], date: NaiveDate) -> Vec<&Task> {
    tasks_on_in(tasks, date, &Local)
}

/// Tasks due in the month containing `date`, grouped by day. Days without tasks
/// are omitted.
pub fn month_agenda_in<'a, Tz: TimeZone>(
    tasks: &'a [Task],
    date: NaiveDate,
    tz: &Tz,
) -> BTreeMap<NaiveDate, Vec<&'a Task>> {
    let mut agenda: BTreeMap<NaiveDate, Vec<&Task>> = BTreeMap::new();
    for task in tasks {
        let day = task.due_date.with_timezone(tz).date_naive();
        if day.year() == date.year() && day.month() == date.month() {
            agenda.entry(day).or_default().push(task);
        }
    }
    for day in agenda.values_mut() {
        day.sort_by_key(|t| t.due_date);
    }
    agenda
}

pub fn month_agenda(tasks: &[Task], date: NaiveDate) -> BTreeMap<NaiveDate, Vec<&Task>> {
    month_agenda_in(tasks, date, &Local)
}

/// Move by whole months, clamping the day to the target month's length.
/// Stays on `date` if the result would leave the calendar's range.
pub fn shift_month(date: NaiveDate, months: i32) -> NaiveDate {
    checked_shift_month(date, months).unwrap_or(date)
}

fn checked_shift_month(date: NaiveDate, months: i32) -> Option<NaiveDate> {
    let step = Months::new(months.unsigned_abs());
    if months >= 0 {
        date.checked_add_months(step)
    } else {
        date.checked_sub_months(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{Priority, Status};
    use crate::task::{Assignee, TaskId};
    use chrono::{FixedOffset, Utc};
    use rstest::rstest;

    fn due(id: &str, y: i32, m: u32, d: u32, h: u32) -> Task {
        Task {
            id: TaskId::from(id),
            title: id.to_string(),
            description: String::new(),
            priority: Priority::Medium,
            status: Status::Todo,
            due_date: Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap(),
            estimated_time: None,
            assignee: Assignee::new("Ada"),
            ai_insights: String::new(),
            tags: vec![],
            subtasks: vec![],
            created_at: None,
            updated_at: None,
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn day_is_compared_in_the_given_zone() {
        let tasks = vec![due("late", 2024, 4, 1, 23), due("early", 2024, 4, 2, 1)];
        let utc = FixedOffset::east_opt(0).unwrap();
        let ids: Vec<&str> = tasks_on_in(&tasks, ymd(2024, 4, 1), &utc)
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(ids, ["late"]);

        // Two hours ahead, the late task rolls into the next day.
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let ids: Vec<&str> = tasks_on_in(&tasks, ymd(2024, 4, 2), &plus_two)
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(ids, ["late", "early"]);
    }

    #[test]
    fn agenda_groups_one_month_by_day() {
        let tasks = vec![
            due("b", 2024, 4, 10, 15),
            due("a", 2024, 4, 10, 9),
            due("c", 2024, 4, 30, 9),
            due("other", 2024, 5, 1, 9),
        ];
        let utc = FixedOffset::east_opt(0).unwrap();
        let agenda = month_agenda_in(&tasks, ymd(2024, 4, 15), &utc);
        assert_eq!(agenda.len(), 2);
        let tenth: Vec<&str> = agenda[&ymd(2024, 4, 10)].iter().map(|t| t.title.as_str()).collect();
        assert_eq!(tenth, ["a", "b"]);
    }

    // 2024-04-10 is a Wednesday.
    #[rstest]
    #[case("today", ymd(2024, 4, 10))]
    #[case(" Tomorrow ", ymd(2024, 4, 11))]
    #[case("eow", ymd(2024, 4, 14))]
    #[case("eom", ymd(2024, 4, 30))]
    #[case("in 3d", ymd(2024, 4, 13))]
    #[case("in 2w", ymd(2024, 4, 24))]
    #[case("in 1m", ymd(2024, 5, 10))]
    #[case("fri", ymd(2024, 4, 12))]
    #[case("wednesday", ymd(2024, 4, 10))]
    #[case("next monday", ymd(2024, 4, 22))]
    #[case("2024-12-25", ymd(2024, 12, 25))]
    fn due_input_is_parsed(#[case] input: &str, #[case] expected: NaiveDate) {
        assert_eq!(parse_due_input(input, ymd(2024, 4, 10)), Some(expected));
    }

    #[rstest]
    #[case("someday")]
    #[case("in xd")]
    #[case("2024-13-01")]
    #[case("in 100000000d")]
    #[case("in 9223372036854775807d")]
    #[case("in -9223372036854775808d")]
    #[case("in 9999999999999w")]
    #[case("in 2147483647m")]
    #[case("in 80000000d")]
    fn bad_due_input_is_rejected(#[case] input: &str) {
        assert_eq!(parse_due_input(input, ymd(2024, 4, 10)), None);
    }

    #[rstest]
    #[case(ymd(2024, 1, 31), 1, ymd(2024, 2, 29))]
    #[case(ymd(2024, 3, 31), -1, ymd(2024, 2, 29))]
    #[case(ymd(2024, 12, 15), 1, ymd(2025, 1, 15))]
    #[case(ymd(2024, 1, 15), -1, ymd(2023, 12, 15))]
    #[case(ymd(2024, 5, 5), 0, ymd(2024, 5, 5))]
    fn shifting_months_clamps_the_day(#[case] from: NaiveDate, #[case] by: i32, #[case] expected: NaiveDate) {
        assert_eq!(shift_month(from, by), expected);
    }
}
