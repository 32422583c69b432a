use super::error::ToolError;

const MAX_HANDLE_LEN: usize = 30;

pub fn uuid(value: Option<&str>) -> Result<&str, ToolError> {
    let value = value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ToolError::InvalidArgument("UUID is required".to_string()))?;

    let groups: Vec<&str> = value.split('-').collect();
    let well_formed = groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(group, len)| group.len() == len && group.chars().all(|c| c.is_ascii_hexdigit()));
    if !well_formed {
        return Err(ToolError::InvalidArgument("Invalid UUID format".to_string()));
    }
    Ok(value)
}

pub fn confidence(value: f64) -> Result<i32, ToolError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(ToolError::InvalidArgument(
            "Confidence must be between 0 and 100".to_string(),
        ));
    }
    Ok(value.round() as i32)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    All,
    Today,
    Week,
    Month,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Today => "today",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

pub fn timeframe(value: &str) -> Result<Timeframe, ToolError> {
    match value {
        "all" => Ok(Timeframe::All),
        "today" => Ok(Timeframe::Today),
        "week" => Ok(Timeframe::Week),
        "month" => Ok(Timeframe::Month),
        _ => Err(ToolError::InvalidArgument(
            "Invalid timeframe. Must be one of: all, today, week, month".to_string(),
        )),
    }
}

/// Instagram usernames and brand handles share the same shape.
pub fn handle<'a>(value: Option<&'a str>, label: &str) -> Result<&'a str, ToolError> {
    let value = value
        .map(|v| v.trim().trim_start_matches('@').trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ToolError::InvalidArgument(format!("{} is required", label)))?;

    if value.chars().count() > MAX_HANDLE_LEN {
        return Err(ToolError::InvalidArgument(format!(
            "{} must be 1-30 characters",
            label
        )));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
    {
        return Err(ToolError::InvalidArgument(format!(
            "{} can only contain letters, numbers, dots and underscores",
            label
        )));
    }
    Ok(value)
}
