//! Song durations as written in SAP `TIME` tags.
//!
//! The text form is `[m]m[:ss][.fff]`. Without a colon the leading number
//! counts seconds. Up to three fraction digits are read; anything after the
//! parsed prefix (such as ` LOOP`) is ignored.

/// Longest duration [`duration_to_string`] can express: 100 minutes.
const MAX_PRINTABLE_MS: u32 = 100 * 60 * 1000;

fn digit(bytes: &[u8], pos: usize) -> Option<u32> {
    bytes
        .get(pos)
        .filter(|b| b.is_ascii_digit())
        .map(|b| u32::from(b - b'0'))
}

/// Parse a duration into milliseconds.
#[must_use]
pub fn parse_duration(s: &str) -> Option<u32> {
    let bytes = s.as_bytes();
    let mut pos = 0;

    let mut r = digit(bytes, pos)?;
    pos += 1;
    if let Some(d) = digit(bytes, pos) {
        r = 10 * r + d;
        pos += 1;
    }
    if bytes.get(pos) == Some(&b':') {
        pos += 1;
        let tens = digit(bytes, pos).filter(|&d| d <= 5)?;
        let ones = digit(bytes, pos + 1)?;
        r = 60 * r + 10 * tens + ones;
        pos += 2;
    }
    r *= 1000;

    if bytes.get(pos) != Some(&b'.') {
        return Some(r);
    }
    pos += 1;
    for scale in [100, 10, 1] {
        match digit(bytes, pos) {
            Some(d) => r += scale * d,
            None => break,
        }
        pos += 1;
    }
    Some(r)
}

/// Format milliseconds as `mm:ss`, followed by `.cc` or `.ccd` when the
/// duration is not a whole number of seconds.
///
/// Durations of 100 minutes or more give an empty string.
#[must_use]
pub fn duration_to_string(ms: u32) -> String {
    if ms >= MAX_PRINTABLE_MS {
        return String::new();
    }
    let seconds = ms / 1000;
    let mut s = format!("{:02}:{:02}", seconds / 60, seconds % 60);
    let fraction = ms % 1000;
    if fraction != 0 {
        s.push_str(&format!(".{:02}", fraction / 10));
        if fraction % 10 != 0 {
            s.push(char::from(b'0' + (fraction % 10) as u8));
        }
    }
    s
}
