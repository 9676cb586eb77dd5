use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::io;
use std::io::{BufRead, Write};

/// Reads one line without its line ending. Returns an empty string at EOF.
pub fn read_line<R: BufRead>(mut reader: R) -> io::Result<String> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    let len = line.trim_end_matches(['\n', '\r']).len();
    line.truncate(len);
    Ok(line)
}

pub fn clear<W: Write>(lock: &mut W) -> io::Result<()> {
    write!(lock, "{esc}[2J{esc}[1;1H", esc = 27 as char)
}

/// Accepts RFC 3339 (`2025-09-03T08:00:00Z`), `2025-09-03 08:00` and plain
/// dates, which mean midnight UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M") {
        return Ok(t.and_utc());
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = d.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    Err(anyhow!(
        "Cannot read {:?} as a point in time. Use e.g. 2025-09-03 or 2025-09-03T08:00:00Z.",
        s
    ))
}

pub fn create_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer)
}

#[test]
fn test_read_line_strips_line_endings() {
    use std::io::Cursor;

    let mut stdin = Cursor::new(b"hola\r\nadios\n");
    assert_eq!(read_line(&mut stdin).unwrap(), "hola");
    assert_eq!(read_line(&mut stdin).unwrap(), "adios");
    assert_eq!(read_line(&mut stdin).unwrap(), "");
}

#[test]
fn test_parse_timestamp_formats() {
    use chrono::TimeZone;

    let expected = Utc.with_ymd_and_hms(2025, 9, 3, 8, 0, 0).unwrap();
    assert_eq!(parse_timestamp("2025-09-03T08:00:00Z").unwrap(), expected);
    assert_eq!(parse_timestamp("2025-09-03T10:00:00+02:00").unwrap(), expected);
    assert_eq!(parse_timestamp("2025-09-03 08:00").unwrap(), expected);
    assert_eq!(
        parse_timestamp("2025-09-03").unwrap(),
        expected - chrono::Duration::hours(8)
    );
    assert!(parse_timestamp("next tuesday").is_err());
}
