use chrono::{DateTime, Duration as ChronoDuration, Utc};
use ha_replicator::time::parse_input_time;

fn wall_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-06-15T08:00:00Z").unwrap().with_timezone(&Utc)
}

#[test]
fn relative_duration_resolves_against_wall_time() {
    let parsed = parse_input_time("-24h", wall_time()).unwrap();
    assert_eq!(parsed, wall_time() - ChronoDuration::hours(24));
}

#[test]
fn absolute_rfc3339_timestamp_is_returned_unchanged() {
    let parsed = parse_input_time("2024-01-02T03:04:05Z", wall_time()).unwrap();
    assert_eq!(parsed.to_rfc3339(), "2024-01-02T03:04:05+00:00");
}

#[test]
fn unparseable_input_is_an_error() {
    assert!(parse_input_time("yesterday", wall_time()).is_err());
}
