//! Pure business rules: time windows, budgets and input validation.
//!
//! Nothing here touches the database, so handlers and both repository implementations
//! share the same arithmetic.

use chrono::{DateTime, NaiveTime, Utc};

use crate::error::{AppError, AppResult};

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Length of a working window in minutes. An end at or before the start means the window
/// crosses midnight; identical times are rejected.
pub fn window_minutes(start: NaiveTime, end: NaiveTime) -> AppResult<i64> {
    if start == end {
        return Err(AppError::validation("End time must differ from start time"));
    }
    let minutes = (end - start).num_minutes();
    Ok(if minutes <= 0 { minutes + MINUTES_PER_DAY } else { minutes })
}

pub fn minutes_to_hours(minutes: i64) -> f64 {
    round2(minutes as f64 / 60.0)
}

/// minutes × rate × guards / 60, rounded half-up to the nearest cent.
pub fn budget_cents(minutes: i64, hourly_rate_cents: i64, guards: i32) -> AppResult<i64> {
    let raw = i128::from(minutes) * i128::from(hourly_rate_cents) * i128::from(guards);
    let cents = (raw + 30) / 60;
    i64::try_from(cents).map_err(|_| AppError::validation("Budget is out of range"))
}

/// Hours and budget for a window, the pair stored on every job.
pub fn job_totals(start: NaiveTime, end: NaiveTime, rate_cents: i64, guards: i32) -> AppResult<(f64, i64)> {
    let minutes = window_minutes(start, end)?;
    Ok((minutes_to_hours(minutes), budget_cents(minutes, rate_cents, guards)?))
}

/// Hours between check-in and check-out, rounded to two decimals.
pub fn elapsed_hours(check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> f64 {
    let seconds = (check_out - check_in).num_seconds().max(0);
    round2(seconds as f64 / 3600.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// --- Validation ---

fn char_len(value: &str) -> usize {
    value.trim().chars().count()
}

pub fn validate_name(name: &str) -> AppResult<()> {
    match char_len(name) {
        2..=100 => Ok(()),
        _ => Err(AppError::validation("Name must be between 2 and 100 characters")),
    }
}

pub fn validate_title(title: &str) -> AppResult<()> {
    match char_len(title) {
        3..=255 => Ok(()),
        _ => Err(AppError::validation("Title must be between 3 and 255 characters")),
    }
}

pub fn validate_description(description: Option<&str>) -> AppResult<()> {
    match description {
        Some(text) if text.chars().count() > 1000 => {
            Err(AppError::validation("Description cannot exceed 1000 characters"))
        }
        _ => Ok(()),
    }
}

pub fn validate_cover_letter(letter: Option<&str>) -> AppResult<()> {
    match letter {
        Some(text) if text.chars().count() > 1000 => {
            Err(AppError::validation("Cover letter cannot exceed 1000 characters"))
        }
        _ => Ok(()),
    }
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < 6 {
        return Err(AppError::validation("Password must be at least 6 characters"));
    }
    Ok(())
}

/// Trims and lower-cases an email after a structural check (one `@`, a dotted domain).
pub fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(AppError::validation("Please provide a valid email"))
    }
}

pub fn validate_rate(rate_cents: i64) -> AppResult<()> {
    if rate_cents < 0 {
        return Err(AppError::validation("Hourly rate must be a positive number"));
    }
    Ok(())
}

pub fn validate_required_guards(guards: i32) -> AppResult<()> {
    if guards < 1 {
        return Err(AppError::validation("At least one guard is required"));
    }
    Ok(())
}

pub fn validate_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> AppResult<()> {
    if let Some(lat) = latitude {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(AppError::validation("Latitude must be between -90 and 90"));
        }
    }
    if let Some(lng) = longitude {
        if !(-180.0..=180.0).contains(&lng) {
            return Err(AppError::validation("Longitude must be between -180 and 180"));
        }
    }
    Ok(())
}

/// Returns the trimmed value, or `None` when only whitespace was sent.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
