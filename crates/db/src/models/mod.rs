#![allow(clippy::useless_conversion)]

pub mod category;
pub mod comment;
pub mod favorite;
pub mod post;
pub mod review;
pub mod tag;
pub mod task;
pub mod user;

/// Rejects blank text and text longer than `max` characters.
pub(crate) fn validate_text(field: &str, value: &str, max: usize) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} cannot be empty"));
    }
    let len = value.chars().count();
    if len > max {
        return Err(format!(
            "{field} must be at most {max} characters (got {len})"
        ));
    }
    Ok(())
}

pub(crate) fn validate_optional_text(
    field: &str,
    value: Option<&str>,
    max: usize,
) -> Result<(), String> {
    match value {
        Some(value) if value.chars().count() > max => {
            Err(format!("{field} must be at most {max} characters"))
        }
        _ => Ok(()),
    }
}
