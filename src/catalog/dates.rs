use chrono::NaiveDate;

/// Inclusive date window. A single date is a window where start == end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn single(date: NaiveDate) -> Self {
        Self { start: date, end: date }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Formats accepted for catalog and criteria dates. The upstream data is
/// ISO, the rest tolerate what LLM extraction occasionally emits.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%B %d, %Y", "%d %B %Y"];

/// True for the sentinel values that disable date filtering entirely.
pub fn is_flexible_sentinel(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "flexible" | "null" | "")
}

/// Parse a single date in any accepted format.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

/// Parse a criteria date value into a window: a single date, an explicit
/// "A to B" range, or `None` for sentinels and anything unparseable
/// (`None` means the corresponding filter stays inactive).
pub fn parse_date_or_range(value: &str) -> Option<DateWindow> {
    let trimmed = value.trim();
    if is_flexible_sentinel(trimmed) {
        return None;
    }
    if let Some((start_raw, end_raw)) = trimmed.split_once(" to ") {
        let start = parse_date(start_raw)?;
        let end = parse_date(end_raw)?;
        return Some(DateWindow { start, end });
    }
    parse_date(trimmed).map(DateWindow::single)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_single_date() {
        let window = parse_date_or_range("2024-08-15").unwrap();
        assert_eq!(window.start, date(2024, 8, 15));
        assert_eq!(window.end, date(2024, 8, 15));
    }

    #[test]
    fn test_parse_range() {
        let window = parse_date_or_range("2024-08-01 to 2024-08-31").unwrap();
        assert_eq!(window.start, date(2024, 8, 1));
        assert_eq!(window.end, date(2024, 8, 31));
        assert!(window.contains(date(2024, 8, 15)));
        assert!(!window.contains(date(2024, 9, 1)));
    }

    #[test]
    fn test_range_is_inclusive() {
        let window = parse_date_or_range("2024-08-01 to 2024-08-31").unwrap();
        assert!(window.contains(date(2024, 8, 1)));
        assert!(window.contains(date(2024, 8, 31)));
    }

    #[test]
    fn test_sentinels_disable_filter() {
        assert_eq!(parse_date_or_range("flexible"), None);
        assert_eq!(parse_date_or_range("Flexible"), None);
        assert_eq!(parse_date_or_range("null"), None);
        assert_eq!(parse_date_or_range(""), None);
        assert_eq!(parse_date_or_range("   "), None);
    }

    #[test]
    fn test_unparseable_is_none() {
        assert_eq!(parse_date_or_range("next month"), None);
        assert_eq!(parse_date_or_range("2024-13-99"), None);
        assert_eq!(parse_date_or_range("soon to later"), None);
    }

    #[test]
    fn test_alternate_formats() {
        assert_eq!(parse_date("2024/08/15"), Some(date(2024, 8, 15)));
        assert_eq!(parse_date("August 15, 2024"), Some(date(2024, 8, 15)));
        assert_eq!(parse_date("15 August 2024"), Some(date(2024, 8, 15)));
    }
}
