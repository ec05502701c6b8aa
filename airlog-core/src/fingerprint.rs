//! Content fingerprinting for normalized series.
//!
//! A blake3 hash over column names, timestamps, and values. Two runs that
//! produce byte-identical series produce identical fingerprints; the
//! warm-cache idempotence check and the CLI run summary both rely on this.

use crate::domain::TimeSeries;

/// Deterministic content hash of a series.
pub fn series_fingerprint(series: &TimeSeries) -> String {
    let mut hasher = blake3::Hasher::new();
    for name in series.columns() {
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
    }
    for row in series.rows() {
        hasher.update(row.ts.to_string().as_bytes());
        for value in &row.values {
            hasher.update(&value.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}
