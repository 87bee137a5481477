use chrono::{DateTime, TimeZone, Utc};

/// Converts an OpenPGP 4-octet timestamp into a `DateTime`.
pub(crate) fn dt_from_timestamp(ts: u32) -> DateTime<Utc> {
    Utc.timestamp_opt(i64::from(ts), 0)
        .single()
        .unwrap_or_default()
}

/// Canonicalises line endings to `<CR><LF>`, as required for text signatures.
pub fn normalize_crlf(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 32);
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'\r' => {
                out.extend_from_slice(b"\r\n");
                if data.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
            }
            b'\n' => out.extend_from_slice(b"\r\n"),
            b => out.push(b),
        }
        i += 1;
    }
    out
}
