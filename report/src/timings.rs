//! `timings.json`: per-job wall-clock timings, present only when profiling
//! is enabled.

use serde::{Deserialize, Serialize};

/// One job's timing record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTiming {
    pub tool: String,
    pub target: String,
    pub outcome: String,
    pub attempts: u32,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::JobTiming;

    #[test]
    fn serializes_flat() {
        let timing = JobTiming {
            tool: "gitleaks".to_string(),
            target: "/tmp/app".to_string(),
            outcome: "Success".to_string(),
            attempts: 1,
            duration_ms: 812,
        };
        let json = serde_json::to_value(&timing).unwrap();
        assert_eq!(json["tool"], "gitleaks");
        assert_eq!(json["duration_ms"], 812);
    }
}
