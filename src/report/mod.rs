//! Report generation for retiming runs

use serde::Serialize;

use crate::stats::RetimeStats;
use crate::types::{ClockDomain, ReportFormat, TimingEvent};

/// JSON line for a single event, with the tick values also given in seconds
#[derive(Serialize)]
struct EventJson<'a> {
    #[serde(flatten)]
    event: &'a TimingEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    corrected_seconds: Option<f64>,
}

/// Final report of a run
#[derive(Debug, Clone, Serialize)]
pub struct RetimeSummary {
    pub started_at: String,
    pub finished_at: String,
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub retimed: bool,
    /// Offset in 27 MHz ticks active when the input ended
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_offset: Option<i64>,
    pub pcr_discontinuities: u64,
    pub pts_discontinuities: u64,
    pub fallbacks: u64,
    pub stats: RetimeStats,
}

impl RetimeSummary {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self)
            .unwrap_or_else(|_| "{\"error\": \"JSON serialization failed\"}".to_string())
    }
}

/// Renders timing events in the selected format
pub struct Reporter {
    format: ReportFormat,
}

impl Reporter {
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    pub fn render(&self, event: &TimingEvent) -> Option<String> {
        match self.format {
            ReportFormat::Text => Some(render_text(event)),
            ReportFormat::Json => Some(render_json(event)),
            ReportFormat::None => None,
        }
    }
}

fn label(event: &TimingEvent) -> &'static str {
    match event {
        TimingEvent::PcrDiscontinuity { .. } | TimingEvent::Pcr { .. } => "PCR",
        TimingEvent::PtsDiscontinuity { .. } | TimingEvent::Pts { .. } => "PTS",
        TimingEvent::Dts { .. } => "DTS",
    }
}

fn render_text(event: &TimingEvent) -> String {
    let domain = event.domain();
    match *event {
        TimingEvent::PcrDiscontinuity { pid, previous, current }
        | TimingEvent::PtsDiscontinuity { pid, previous, current } => {
            format!("pid {pid}: {} discontinuity detected! ({previous} -> {current})", label(event))
        }
        TimingEvent::Pcr { pid, raw, corrected }
        | TimingEvent::Pts { pid, raw, corrected, .. }
        | TimingEvent::Dts { pid, raw, corrected, .. } => format!(
            "pid {pid}: {} = {:.4} -> {:.4} ({raw} -> {corrected})",
            label(event),
            domain.seconds(raw),
            domain.seconds(corrected),
        ),
    }
}

fn seconds(event: &TimingEvent) -> (Option<f64>, Option<f64>) {
    let domain: ClockDomain = event.domain();
    match *event {
        TimingEvent::Pcr { raw, corrected, .. }
        | TimingEvent::Pts { raw, corrected, .. }
        | TimingEvent::Dts { raw, corrected, .. } => {
            (Some(domain.seconds(raw)), Some(domain.seconds(corrected)))
        }
        _ => (None, None),
    }
}

fn render_json(event: &TimingEvent) -> String {
    let (raw_seconds, corrected_seconds) = seconds(event);
    let line = EventJson { event, raw_seconds, corrected_seconds };
    serde_json::to_string(&line)
        .unwrap_or_else(|_| "{\"error\": \"JSON serialization failed\"}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn text_lines() {
        let reporter = Reporter::new(ReportFormat::Text);
        let pcr = TimingEvent::Pcr { pid: 256, raw: 100_000_000, corrected: 27_000_000 };
        assert_eq!(
            reporter.render(&pcr).unwrap(),
            "pid 256: PCR = 3.7037 -> 1.0000 (100000000 -> 27000000)"
        );

        let pts = TimingEvent::Pts { pid: 257, raw: 180_000, corrected: 90_000, fallback: false };
        assert_eq!(reporter.render(&pts).unwrap(), "pid 257: PTS = 2.0000 -> 1.0000 (180000 -> 90000)");

        let jump = TimingEvent::PcrDiscontinuity { pid: 256, previous: 10, current: 5 };
        assert_eq!(reporter.render(&jump).unwrap(), "pid 256: PCR discontinuity detected! (10 -> 5)");
    }

    #[test]
    fn json_lines() {
        let reporter = Reporter::new(ReportFormat::Json);
        let dts = TimingEvent::Dts { pid: 257, raw: 45_000, corrected: 90_000, fallback: true };
        let value: serde_json::Value = serde_json::from_str(&reporter.render(&dts).unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "event": "dts",
                "pid": 257,
                "raw": 45_000,
                "corrected": 90_000,
                "fallback": true,
                "raw_seconds": 0.5,
                "corrected_seconds": 1.0,
            })
        );

        let jump = TimingEvent::PtsDiscontinuity { pid: 1, previous: 2, current: 3 };
        let value: serde_json::Value = serde_json::from_str(&reporter.render(&jump).unwrap()).unwrap();
        assert_eq!(value["event"], "pts_discontinuity");
        assert!(value.get("raw_seconds").is_none());
    }

    #[test]
    fn summary_json() {
        let mut stats = RetimeStats::new();
        stats.on_packet(256);
        stats.on_event(&TimingEvent::PcrDiscontinuity { pid: 256, previous: 10, current: 5 });
        let now = chrono::Utc::now().to_rfc3339();
        let summary = RetimeSummary {
            started_at: now.clone(),
            finished_at: now,
            input: "in.ts".to_string(),
            output: None,
            retimed: true,
            final_offset: None,
            pcr_discontinuities: stats.pcr_discontinuities(),
            pts_discontinuities: 0,
            fallbacks: 0,
            stats,
        };

        let value: serde_json::Value = serde_json::from_str(&summary.to_json()).unwrap();
        for key in ["started_at", "finished_at"] {
            let ts = value[key].as_str().unwrap();
            assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok(), "{key}: {ts}");
        }
        assert_eq!(value["input"], "in.ts");
        assert_eq!(value["retimed"], true);
        assert_eq!(value["pcr_discontinuities"], 1);
        assert!(value.get("output").is_none());
        assert!(value.get("final_offset").is_none());
        assert_eq!(value["stats"]["packets"], 1);
        assert_eq!(value["stats"]["pids"]["256"]["pcr_discontinuities"], 1);

        let with_output = RetimeSummary {
            output: Some("out.ts".to_string()),
            final_offset: Some(-42),
            ..summary
        };
        let value: serde_json::Value = serde_json::from_str(&with_output.to_json()).unwrap();
        assert_eq!(value["output"], "out.ts");
        assert_eq!(value["final_offset"], -42);
    }

    #[test]
    fn silent_reporter() {
        let reporter = Reporter::new(ReportFormat::None);
        assert_eq!(reporter.render(&TimingEvent::Pcr { pid: 1, raw: 1, corrected: 1 }), None);
    }
}
