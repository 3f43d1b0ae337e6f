//! Encode progress parsed from encoder diagnostic output.
//!
//! Two sources are understood:
//! - human-readable stderr: `Duration: 00:01:02.50, ...` once per input and
//!   `... time=00:00:10.00 ...` on each status line
//! - `-progress pipe:1` key/value pairs: `out_time=...`, `out_time_us=...`
//!   (and the misnamed `out_time_ms=`, which is also microseconds)

/// Parse `HH:MM:SS(.frac)` into seconds.
pub fn parse_timestamp(value: &str) -> Option<f64> {
    let mut parts = value.trim().split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let total = hours * 3600.0 + minutes * 60.0 + seconds;
    total.is_finite().then_some(total)
}

/// Total duration from an input report line, if the line carries one.
pub fn parse_duration_line(line: &str) -> Option<f64> {
    let rest = line.split_once("Duration:")?.1;
    let value = rest.split(',').next()?;
    parse_timestamp(value)
}

/// Current encode timestamp from a status or progress line.
pub fn parse_progress_time(line: &str) -> Option<f64> {
    let line = line.trim();
    if let Some((key, value)) = line.split_once('=') {
        if key == "out_time_us" || key == "out_time_ms" {
            let micros: f64 = value.trim().parse().ok()?;
            return Some(micros / 1_000_000.0);
        }
    }
    let rest = line.split_once("time=")?.1;
    let value = rest.split_whitespace().next()?;
    parse_timestamp(value)
}

/// Turns diagnostic lines into de-duplicated whole-percent progress.
///
/// The first positive duration seen is kept for the lifetime of the
/// tracker. Only values strictly above the last emitted one are returned,
/// so a tracker reused across a GPU attempt and its CPU retry never
/// reports going backwards.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    duration_secs: Option<f64>,
    last_percent: Option<u8>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.duration_secs
    }

    pub fn last_percent(&self) -> Option<u8> {
        self.last_percent
    }

    /// Feed one line; returns a new percentage when progress advanced.
    pub fn observe(&mut self, line: &str) -> Option<u8> {
        if self.duration_secs.is_none() {
            if let Some(duration) = parse_duration_line(line) {
                if duration > 0.0 {
                    tracing::debug!(duration_secs = duration, "Encode duration detected");
                    self.duration_secs = Some(duration);
                }
                return None;
            }
        }

        let current = parse_progress_time(line)?;
        let duration = self.duration_secs?;
        let percent = (current / duration * 100.0).clamp(0.0, 100.0).floor();
        if !percent.is_finite() {
            return None;
        }
        self.advance(percent as u8)
    }

    /// Mark the encode complete, returning 100 unless already reported.
    pub fn complete(&mut self) -> Option<u8> {
        self.advance(100)
    }

    fn advance(&mut self, percent: u8) -> Option<u8> {
        match self.last_percent {
            Some(last) if percent <= last => None,
            _ => {
                self.last_percent = Some(percent);
                Some(percent)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("00:01:02.50"), Some(62.5));
        assert_eq!(parse_timestamp("01:00:00"), Some(3600.0));
        assert_eq!(parse_timestamp("N/A"), None);
        assert_eq!(parse_timestamp("12.5"), None);
    }

    #[test]
    fn test_parse_duration_line() {
        let line = "  Duration: 00:00:04.00, start: 0.000000, bitrate: 1411 kb/s";
        assert_eq!(parse_duration_line(line), Some(4.0));
        assert_eq!(parse_duration_line("  Duration: N/A, bitrate: N/A"), None);
        assert_eq!(parse_duration_line("frame=1 time=00:00:01.00"), None);
    }

    #[test]
    fn test_parse_progress_time_variants() {
        let status = "frame=  120 fps= 60 q=28.0 size=256kB time=00:00:02.00 bitrate=1048.6kbits/s";
        assert_eq!(parse_progress_time(status), Some(2.0));
        assert_eq!(parse_progress_time("out_time=00:00:03.000000"), Some(3.0));
        assert_eq!(parse_progress_time("out_time_us=1500000"), Some(1.5));
        assert_eq!(parse_progress_time("out_time_ms=1500000"), Some(1.5));
        assert_eq!(parse_progress_time("progress=continue"), None);
    }

    #[test]
    fn test_tracker_waits_for_duration() {
        let mut tracker = ProgressTracker::new();
        assert_eq!(tracker.observe("time=00:00:01.00"), None);
        assert_eq!(tracker.observe("  Duration: 00:00:10.00, start: 0"), None);
        assert_eq!(tracker.observe("time=00:00:01.00"), Some(10));
        assert_eq!(tracker.observe("out_time=00:00:01.05"), None);
        assert_eq!(tracker.observe("time=00:00:05.00"), Some(50));
    }

    #[test]
    fn test_tracker_keeps_first_duration() {
        let mut tracker = ProgressTracker::new();
        tracker.observe("Duration: 00:00:10.00, start: 0");
        tracker.observe("Duration: 00:01:40.00, start: 0");
        assert_eq!(tracker.duration_secs(), Some(10.0));
    }

    #[test]
    fn test_tracker_clamps_and_completes() {
        let mut tracker = ProgressTracker::new();
        tracker.observe("Duration: 00:00:02.00, start: 0");
        assert_eq!(tracker.observe("time=00:00:09.00"), Some(100));
        assert_eq!(tracker.complete(), None);

        let mut fresh = ProgressTracker::new();
        assert_eq!(fresh.complete(), Some(100));
    }

    #[test]
    fn test_tracker_never_goes_backwards() {
        let mut tracker = ProgressTracker::new();
        tracker.observe("Duration: 00:00:10.00, start: 0");
        assert_eq!(tracker.observe("time=00:00:06.00"), Some(60));
        // A retried attempt restarts its clock.
        assert_eq!(tracker.observe("time=00:00:01.00"), None);
        assert_eq!(tracker.observe("time=00:00:07.00"), Some(70));
    }

    fn line_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            (0u32..3, 0u32..60, 0u32..60, 0u32..100)
                .prop_map(|(h, m, s, c)| format!("  Duration: {h:02}:{m:02}:{s:02}.{c:02}, start: 0")),
            (0u32..3, 0u32..60, 0u32..60, 0u32..100)
                .prop_map(|(h, m, s, c)| format!("frame=1 time={h:02}:{m:02}:{s:02}.{c:02} speed=1x")),
            (0u64..20_000_000_000).prop_map(|us| format!("out_time_us={us}")),
            "[a-z =:.0-9]{0,30}",
        ]
    }

    proptest! {
        #[test]
        fn prop_progress_is_increasing_and_bounded(lines in prop::collection::vec(line_strategy(), 0..60)) {
            let mut tracker = ProgressTracker::new();
            let mut emitted = Vec::new();
            for line in &lines {
                if let Some(p) = tracker.observe(line) {
                    emitted.push(p);
                }
            }
            emitted.extend(tracker.complete());

            prop_assert!(emitted.iter().all(|p| *p <= 100));
            prop_assert!(emitted.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
