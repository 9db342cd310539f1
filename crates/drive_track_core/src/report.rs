//! crates/drive_track_core/src/report.rs
//!
//! Builds the downloadable driving-log report. The report is rendered as plain
//! text; its summary figures come from [`crate::aggregation::summarize`] so they
//! match the dashboard exactly.

use crate::aggregation::{one_decimal, summarize, SummaryFigures, Totals};
use crate::domain::{Session, UserProfile};
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt::Write;

/// Inclusive calendar-date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let day = at.date_naive();
        self.start <= day && day <= self.end
    }
}

#[derive(Debug, Clone)]
pub struct DrivingLogReport {
    pub driver: Option<UserProfile>,
    pub range: Option<DateRange>,
    /// Newest first.
    pub sessions: Vec<Session>,
    pub totals: Totals,
    pub generated_at: DateTime<Utc>,
}

impl DrivingLogReport {
    pub fn build(
        sessions: &[Session],
        driver: Option<&UserProfile>,
        range: Option<DateRange>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let mut selected: Vec<Session> = sessions
            .iter()
            .filter(|s| range.map_or(true, |r| r.contains(s.date)))
            .cloned()
            .collect();
        selected.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
        let totals = summarize(&selected);
        Self {
            driver: driver.cloned(),
            range,
            sessions: selected,
            totals,
            generated_at,
        }
    }

    pub fn figures(&self) -> SummaryFigures {
        self.totals.formatted()
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        // Writing into a String never fails.
        let _ = self.write_text(&mut out);
        out
    }

    fn write_text(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "Drive-Track Driving Log")?;
        match self.range {
            Some(r) => writeln!(out, "{} - {}", long_date(r.start), long_date(r.end))?,
            None => writeln!(out, "Complete Driving History")?,
        }
        writeln!(out)?;

        if let Some(driver) = &self.driver {
            writeln!(out, "Driver Information")?;
            writeln!(out, "  Name: {}", driver.name.as_deref().unwrap_or("Not provided"))?;
            writeln!(out, "  Email: {}", driver.email.as_deref().unwrap_or("Not provided"))?;
            if let Some(dob) = driver.date_of_birth {
                writeln!(out, "  Date of Birth: {}", long_date(dob))?;
            }
            if let Some(permit) = driver.permit_date {
                writeln!(out, "  Permit Date: {}", long_date(permit))?;
            }
            writeln!(out)?;
        }

        let figures = self.figures();
        writeln!(out, "Summary Statistics")?;
        writeln!(out, "  Total Sessions: {}", self.totals.session_count)?;
        writeln!(out, "  Total Hours: {}", figures.total_hours)?;
        writeln!(out, "  Total Miles: {}", figures.total_miles)?;
        writeln!(out, "  Night Hours: {}", figures.night_hours)?;
        writeln!(out)?;

        writeln!(out, "Driving Sessions")?;
        if self.sessions.is_empty() {
            writeln!(out, "  No driving sessions logged.")?;
        }
        for session in &self.sessions {
            let roads: Vec<&str> = session.road_types.iter().map(|r| r.as_str()).collect();
            writeln!(
                out,
                "  {} | {} | Miles: {} | Weather: {} | Time: {} | Roads: {}",
                long_date(session.date.date_naive()),
                format_duration(session.duration),
                one_decimal(session.miles),
                session.weather,
                session.time_of_day,
                roads.join(", ")
            )?;
        }
        writeln!(out)?;
        writeln!(
            out,
            "Generated on {} by Drive-Track",
            long_date(self.generated_at.date_naive())
        )
    }
}

/// `Xh Ym`, dropping leftover seconds.
pub fn format_duration(seconds: u32) -> String {
    format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
}

fn long_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

/// `<Name>_DrivingLog_<date>.txt`, or with a `<start>_to_<end>` suffix for a
/// ranged report.
pub fn report_file_name(
    driver: Option<&UserProfile>,
    range: Option<DateRange>,
    today: NaiveDate,
) -> String {
    let name = driver
        .and_then(|d| d.name.as_deref())
        .filter(|n| !n.is_empty())
        .map(|n| {
            n.chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect::<String>()
        })
        .unwrap_or_else(|| "DrivingLog".to_string());
    match range {
        Some(r) => format!(
            "{}_DrivingLog_{}_to_{}.txt",
            name,
            r.start.format("%Y-%m-%d"),
            r.end.format("%Y-%m-%d")
        ),
        None => format!("{}_DrivingLog_{}.txt", name, today.format("%Y-%m-%d")),
    }
}
