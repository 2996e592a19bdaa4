use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use log::warn;
use uuid::Uuid;

use crate::calendar::render_month;
use crate::database::{recover_corrupted, JsonStore, ScheduleStore};
use crate::diary::HealthStatus;
use crate::medication::MedicationEntry;
use crate::resolver::{resolve_for, NextDose};
use crate::time::TimeSlot;

/// Fields to change on an existing medication. `None` keeps the old value.
#[derive(Debug, Default, Clone)]
pub struct EntryChanges {
    pub name: Option<String>,
    pub times_per_day: Option<u8>,
    pub duration_days: Option<u32>,
    pub start_date: Option<NaiveDate>,
}

fn find_entry(medications: &[MedicationEntry], name: &str) -> Result<usize> {
    let name_lower = name.trim().to_lowercase();
    medications
        .iter()
        .position(|m| m.name.to_lowercase() == name_lower)
        .with_context(|| format!("Medication '{}' not found!", name.trim()))
}

fn slot_list(entry: &MedicationEntry) -> String {
    entry
        .slots()
        .iter()
        .map(|slot| slot.clock_text())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Registers a medication and materializes its doses.
///
/// Names are unique (case-insensitive) among registered medications; use
/// [`edit_medication`] to change a course.
pub fn add_medication(
    store: &JsonStore,
    name: String,
    times_per_day: u8,
    duration_days: u32,
    start_date: NaiveDate,
) -> Result<()> {
    let entry = MedicationEntry::new(name, times_per_day, duration_days, start_date)?;

    let _lock = store.lock()?;
    let mut medications = recover_corrupted(store.read_medications())?;
    let name_lower = entry.name.to_lowercase();
    if medications
        .iter()
        .any(|m| m.name.to_lowercase() == name_lower)
    {
        bail!(
            "Medication '{}' already exists! Use `sonju edit` to change it.",
            entry.name
        );
    }

    let mut schedule = recover_corrupted(store.read_schedule())?;
    let created = schedule.expand(&entry)?;
    store.write_schedule(&schedule)?;

    medications.push(entry.clone());
    store.write_medications(&medications)?;

    println!("Added medication: {}", entry.name);
    println!(
        "  {} time(s) a day ({}) for {} day(s) from {}: {} dose(s) scheduled",
        entry.times_per_day,
        slot_list(&entry),
        entry.duration_days,
        entry.start_date,
        created
    );
    Ok(())
}

/// Replaces a medication's course: every dose of the old course is purged and
/// the new one expanded, so checked marks of the old course do not carry over.
pub fn edit_medication(store: &JsonStore, name: String, changes: EntryChanges) -> Result<()> {
    let _lock = store.lock()?;
    let mut medications = recover_corrupted(store.read_medications())?;
    let index = find_entry(&medications, &name)?;
    let old = medications[index].clone();

    let mut new = old.clone();
    let mut described = Vec::new();

    if let Some(new_name) = changes.name {
        let new_name = new_name.trim().to_string();
        let lower = new_name.to_lowercase();
        if medications
            .iter()
            .enumerate()
            .any(|(i, m)| i != index && m.name.to_lowercase() == lower)
        {
            bail!("Medication '{}' already exists!", new_name);
        }
        described.push(format!("name -> {}", new_name));
        new.name = new_name;
    }
    if let Some(times) = changes.times_per_day {
        new.times_per_day = times;
        described.push(format!("times per day -> {}", times));
    }
    if let Some(days) = changes.duration_days {
        new.duration_days = days;
        described.push(format!("days -> {}", days));
    }
    if let Some(start) = changes.start_date {
        new.start_date = start;
        described.push(format!("start -> {}", start));
    }

    if described.is_empty() {
        println!("No changes specified for '{}'", old.name);
        return Ok(());
    }

    // Entries saved before ids existed get one now; their old doses are
    // still found by tuple.
    new.id = old.id.or_else(|| Some(Uuid::new_v4()));

    let mut schedule = recover_corrupted(store.read_schedule())?;
    let created = schedule.edit(&old, &new)?;
    store.write_schedule(&schedule)?;

    medications[index] = new;
    store.write_medications(&medications)?;

    println!("Updated '{}': {}", old.name, described.join(", "));
    println!("  {} dose(s) rescheduled", created);
    Ok(())
}

pub fn remove_medication(store: &JsonStore, name: String) -> Result<()> {
    let _lock = store.lock()?;
    let mut medications = recover_corrupted(store.read_medications())?;
    let index = find_entry(&medications, &name)?;
    let entry = medications.remove(index);

    let mut schedule = recover_corrupted(store.read_schedule())?;
    let removed = schedule.delete(&entry);
    store.write_schedule(&schedule)?;
    store.write_medications(&medications)?;

    println!("Removed medication: {} ({} dose(s) cleared)", entry.name, removed);
    Ok(())
}

pub fn list_medications(store: &JsonStore, today: NaiveDate) -> Result<()> {
    let medications = store.read_medications()?;
    if medications.is_empty() {
        println!("No medications registered.");
        return Ok(());
    }
    let schedule = store.read_schedule()?;

    println!("\nMedications:");
    println!("{}", "=".repeat(60));
    for entry in &medications {
        let (taken, total) = schedule
            .occurrences()
            .filter(|(_, _, occ)| occ.belongs_to(entry))
            .fold((0, 0), |(taken, total), (_, _, occ)| {
                (taken + usize::from(occ.checked), total + 1)
            });

        println!("\n{}", entry.name);
        println!("  Times:  {} a day ({})", entry.times_per_day, slot_list(entry));
        match entry.end_date() {
            Some(end) => println!(
                "  Course: {} ~ {} ({} day(s))",
                entry.start_date, end, entry.duration_days
            ),
            None => println!("  Course: from {}", entry.start_date),
        }
        println!("  Taken:  {}/{}", taken, total);
        let status = if entry.covers(today) {
            "in progress"
        } else if today < entry.start_date {
            "upcoming"
        } else {
            "finished"
        };
        println!("  Status: {}", status);
    }
    println!();
    Ok(())
}

pub fn show_day(store: &JsonStore, date: NaiveDate) -> Result<()> {
    let schedule = store.read_schedule()?;
    if schedule.is_empty() {
        println!("No doses scheduled yet. Add a medication with `sonju add`.");
        return Ok(());
    }
    let buckets = schedule.buckets(date);
    if buckets.is_empty() {
        match schedule.dates().find(|d| *d > date) {
            Some(next) => println!("No doses scheduled on {}. Next doses on {}.", date, next),
            None => println!("No doses scheduled on {}.", date),
        }
        return Ok(());
    }

    println!("\n{} 복약 일정", date);
    println!("{}", "=".repeat(60));
    for bucket in buckets {
        println!("\n{} {}", bucket.time, bucket.label);
        for occ in &bucket.medications {
            println!("  {} {}", if occ.checked { "✓" } else { "✗" }, occ.name);
        }
    }
    println!();
    Ok(())
}

pub fn set_dose_checked(
    store: &JsonStore,
    name: String,
    slot: TimeSlot,
    date: NaiveDate,
    checked: bool,
) -> Result<()> {
    let _lock = store.lock()?;
    let mut schedule = recover_corrupted(store.read_schedule())?;
    schedule.set_checked(date, slot, &name, checked)?;
    store.write_schedule(&schedule)?;

    if checked {
        println!("Marked '{}' as taken at {} on {}", name.trim(), slot, date);
    } else {
        println!("Unmarked '{}' at {} on {}", name.trim(), slot, date);
    }
    Ok(())
}

pub fn check_all(store: &JsonStore, date: NaiveDate, slot: Option<TimeSlot>) -> Result<()> {
    let _lock = store.lock()?;
    let mut schedule = recover_corrupted(store.read_schedule())?;
    let changed = schedule.set_all_checked(date, slot);
    if changed == 0 {
        println!("Nothing left to mark on {}.", date);
        return Ok(());
    }
    store.write_schedule(&schedule)?;
    println!("Marked {} dose(s) as taken on {}", changed, date);
    Ok(())
}

/// The next-dose line. A schedule that cannot be read degrades to the
/// "unavailable" message instead of failing.
pub fn next_dose(store: &impl ScheduleStore, now: NaiveDateTime) -> NextDose {
    match store.read_schedule() {
        Ok(schedule) => resolve_for(&schedule, now),
        Err(e) => {
            warn!("could not load schedule for reminder: {}", e);
            NextDose::unavailable()
        }
    }
}

pub fn show_next(store: &impl ScheduleStore, now: NaiveDateTime) {
    let next = next_dose(store, now);
    println!("다음 복약 {}", next.time_text);
    println!("{}", next.description);
}

pub fn show_calendar(store: &JsonStore, year: i32, month: u32, today: NaiveDate) -> Result<()> {
    let schedule = store.read_schedule()?;
    let text = render_month(year, month, &schedule, today)
        .with_context(|| format!("Invalid month {}-{:02}", year, month))?;
    print!("{}", text);
    Ok(())
}

pub fn write_diary(
    store: &JsonStore,
    date: NaiveDate,
    content: String,
    status: Option<HealthStatus>,
) -> Result<()> {
    if content.trim().is_empty() {
        bail!("Diary entry cannot be empty!");
    }

    let _lock = store.lock()?;
    let mut diary = recover_corrupted(store.read_diary())?;
    let replaced = diary.record(date, content.trim(), status);
    store.write_diary(&diary)?;

    if replaced.is_some() {
        println!("Updated diary entry for {}", date);
    } else {
        println!("Saved diary entry for {}", date);
    }
    Ok(())
}

pub fn show_diary(store: &JsonStore, date: Option<NaiveDate>) -> Result<()> {
    let diary = store.read_diary()?;

    let entries: Vec<_> = match date {
        Some(date) => diary.get(date).map(|e| (date, e)).into_iter().collect(),
        None => diary.recent(7).collect(),
    };
    if entries.is_empty() {
        println!("No diary entries found.");
        return Ok(());
    }

    for (date, entry) in entries {
        match entry.status {
            Some(status) => println!("\n{} [{} {}]", date, status.label(), status),
            None => println!("\n{}", date),
        }
        println!("  {}", entry.content);
    }
    println!();
    Ok(())
}
