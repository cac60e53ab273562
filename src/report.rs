use std::path::PathBuf;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::transform::Mode;

/// Summary of a finished run, printable as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub input:      PathBuf,
    pub output:     PathBuf,
    pub mode:       Mode,
    pub bytes:      u64,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shape() {
        let report = RunReport {
            input:      PathBuf::from("in.dat"),
            output:     PathBuf::from("in.dat.dec"),
            mode:       Mode::Decode,
            bytes:      17,
            started_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            elapsed_ms: 3,
        };
        let json = report.to_json().unwrap();
        assert!(json.contains("\"mode\": \"decode\""));
        assert!(json.contains("\"bytes\": 17"));
        assert_eq!(RunReport::from_json(&json).unwrap(), report);
    }
}
