use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Generate an ISO 8601 timestamp for the current instant.
///
/// Formatted manually to avoid format_description overhead; the shape is
/// RFC 3339 with second precision, which is what every record stores and
/// what [`parse_timestamp`] reads back.
pub(crate) fn now_utc() -> String {
    let now = OffsetDateTime::now_utc();
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

/// Parse a stored timestamp. Unparseable values become `None`; read-side
/// consumers skip them rather than failing a whole projection.
pub(crate) fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc3339).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_round_trips_through_parse() {
        let now = now_utc();
        assert!(parse_timestamp(&now).is_some(), "unparseable: {now}");
    }

    #[test]
    fn garbage_timestamps_parse_to_none() {
        assert!(parse_timestamp("not-a-time").is_none());
    }
}
