use chrono::{Datelike, NaiveDate};

use crate::schedule::PerDateSchedule;

/// A week row, Sunday first. `None` pads days outside the month.
pub type Week = [Option<NaiveDate>; 7];

/// Weeks covering exactly `year`-`month`, or `None` for an invalid month.
pub fn month_grid(year: i32, month: u32) -> Option<Vec<Week>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let leading = first.weekday().num_days_from_sunday() as usize;

    let mut weeks = Vec::new();
    let mut week: Week = [None; 7];
    let mut column = leading;
    for day in first.iter_days().take_while(|d| d.month() == month) {
        week[column] = Some(day);
        column += 1;
        if column == 7 {
            weeks.push(week);
            week = [None; 7];
            column = 0;
        }
    }
    if column > 0 {
        weeks.push(week);
    }
    Some(weeks)
}

/// Parse a `YYYY-MM` month argument.
pub fn parse_month(month_str: &str) -> Option<(i32, u32)> {
    let (year, month) = month_str.trim().split_once('-')?;
    let year = year.parse().ok()?;
    let month = month.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1).map(|_| (year, month))
}

fn day_marker(schedule: &PerDateSchedule, date: NaiveDate) -> char {
    let buckets = schedule.buckets(date);
    if buckets.is_empty() {
        ' '
    } else if buckets.iter().any(|b| b.has_pending()) {
        '•'
    } else {
        '✓'
    }
}

/// Text calendar of one month with a marker per day: `•` doses still to
/// take, `✓` everything taken. `today` is bracketed.
pub fn render_month(
    year: i32,
    month: u32,
    schedule: &PerDateSchedule,
    today: NaiveDate,
) -> Option<String> {
    let weeks = month_grid(year, month)?;

    let mut out = format!("{}년 {}월\n", year, month);
    out.push_str(" 일   월   화   수   목   금   토\n");
    for week in weeks {
        let cells: Vec<String> = week
            .iter()
            .map(|cell| match cell {
                Some(date) if *date == today => {
                    format!("[{:>2}]{}", date.day(), day_marker(schedule, *date))
                }
                Some(date) => format!(" {:>2} {}", date.day(), day_marker(schedule, *date)),
                None => "    ".to_string(),
            })
            .collect();
        out.push_str(cells.join("").trim_end());
        out.push('\n');
    }
    Some(out)
}
