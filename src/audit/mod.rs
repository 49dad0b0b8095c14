//! Input fingerprinting
//!
//! Every forecast records a hash of the history it was trained on, so two
//! runs can be shown to have consumed identical input.

use crate::models::HistoricalSeries;
use crate::Result;
use sha2::{Digest, Sha256};
use std::io::Write;

/// Hex SHA-256 of the series' JSON form.
/// Streams serialization straight into the hasher.
pub fn compute_series_fingerprint(series: &HistoricalSeries) -> Result<String> {
    let mut hasher = Sha256::new();
    serde_json::to_writer(&mut HashWriter(&mut hasher), series)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DailyRecord;
    use chrono::NaiveDate;

    fn series(net_change: f64) -> HistoricalSeries {
        HistoricalSeries {
            records: vec![DailyRecord {
                date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
                net_change,
            }],
            mean: net_change,
            std_dev: 0.0,
            count: 1,
            partial_history: true,
        }
    }

    #[test]
    fn test_fingerprint_is_stable_hex() {
        let a = compute_series_fingerprint(&series(10.0)).unwrap();
        let b = compute_series_fingerprint(&series(10.0)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_detects_change() {
        let recorded = compute_series_fingerprint(&series(10.0)).unwrap();
        let changed = compute_series_fingerprint(&series(10.5)).unwrap();
        assert_ne!(recorded, changed);
    }
}
