//! Colored formatter implementation with terminal color support
//!
//! Produces the same lines as [`PlainFormatter`](super::PlainFormatter) with
//! ANSI colors; latency figures are tinted by [`PerformanceLevel`].

use super::formatter::{LineValues, SnapshotFormatter};
use crate::models::{Phase, SnapshotState, StatsSnapshot, TestConfig};
use colored::*;

/// Latency classification for color coding
#[derive(Debug, Clone, PartialEq)]
pub enum PerformanceLevel {
    Excellent,  // < 20ms
    Good,       // 20-50ms
    Fair,       // 50-100ms
    Poor,       // 100-300ms
    VeryPoor,   // > 300ms
}

impl PerformanceLevel {
    /// Determine performance level from a round-trip time in milliseconds
    pub fn from_latency(latency_ms: f64) -> Self {
        if latency_ms < 20.0 {
            Self::Excellent
        } else if latency_ms < 50.0 {
            Self::Good
        } else if latency_ms < 100.0 {
            Self::Fair
        } else if latency_ms < 300.0 {
            Self::Poor
        } else {
            Self::VeryPoor
        }
    }

    /// Get color for this performance level
    pub fn color(&self) -> Color {
        match self {
            Self::Excellent => Color::Green,
            Self::Good => Color::Cyan,
            Self::Fair => Color::Yellow,
            Self::Poor => Color::Magenta,
            Self::VeryPoor => Color::Red,
        }
    }

    /// Get descriptive text
    pub fn description(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
            Self::VeryPoor => "Very Poor",
        }
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub phase: Color,
    pub success: Color,
    pub warning: Color,
    pub throughput: Color,
    pub muted: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            phase: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            throughput: Color::BrightWhite,
            muted: Color::BrightBlack,
        }
    }
}

/// Colored formatter implementation
#[derive(Debug, Clone, Default)]
pub struct ColoredFormatter {
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a colored formatter with custom color scheme
    pub fn with_color_scheme(color_scheme: ColorScheme) -> Self {
        Self { color_scheme }
    }

    fn tag(&self, phase: Phase) -> ColoredString {
        format!("[{}]", phase.wire_name()).color(self.color_scheme.phase).bold()
    }

    fn latency(&self, value_ms: f64, precision: usize) -> ColoredString {
        format!("{:.*}", precision, value_ms).color(PerformanceLevel::from_latency(value_ms).color())
    }

    fn speed(&self, gbps: f64) -> ColoredString {
        format!("{:.2}", gbps).color(self.color_scheme.throughput).bold()
    }
}

impl SnapshotFormatter for ColoredFormatter {
    fn format_run_header(&self, config: &TestConfig) -> String {
        format!(
            "{} {}\n{} {} streams, {}s duration per phase\n",
            "Target:".bold(),
            config.authority().color(self.color_scheme.phase),
            "Configuration:".bold(),
            config.stream_count(),
            config.phase_duration().as_secs()
        )
    }

    fn format_snapshot(&self, snapshot: &StatsSnapshot) -> String {
        let v = LineValues::from(snapshot);
        let tag = self.tag(snapshot.phase);

        match snapshot.state {
            SnapshotState::Starting => {
                format!("\n{} {}\n", tag, "Starting...".color(self.color_scheme.muted))
            }
            SnapshotState::Running if snapshot.phase == Phase::IdlePing => {
                format!("\r{} Running... {} ms", tag, self.latency(v.ping, 1))
            }
            SnapshotState::Running => format!(
                "\r{} Running... {} Gbps | Ping: {} ms | Jitter: {} ms   ",
                tag,
                self.speed(v.speed),
                self.latency(v.ping, 1),
                format!("{:.1}", v.jitter).color(self.color_scheme.muted)
            ),
            SnapshotState::Complete if snapshot.phase == Phase::IdlePing => format!(
                "\r{} {}: {} Gbps | Avg: {} ms | Jitter: {:.1} ms\n",
                tag,
                "COMPLETE".color(self.color_scheme.success).bold(),
                self.speed(v.speed),
                self.latency(v.ping, 1),
                v.jitter
            ),
            SnapshotState::Complete => format!(
                "\r{} {}: {} Gbps | Latency Avg: {} ms (Min: {} / Max: {}) | Max Jitter: {:.1} ms\n",
                tag,
                "COMPLETE".color(self.color_scheme.success).bold(),
                self.speed(v.speed),
                self.latency(v.ping_avg, 1),
                self.latency(v.ping_min, 0),
                self.latency(v.ping_max, 0),
                v.jitter_max
            ),
            SnapshotState::Done => format!("\n{}\n", "Test Complete.".color(self.color_scheme.success).bold()),
        }
    }

    fn format_warning(&self, warning: &str) -> String {
        format!("{} {}\n", "WARNING:".color(self.color_scheme.warning).bold(), warning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LatencySummary;

    #[test]
    fn test_performance_levels() {
        assert_eq!(PerformanceLevel::from_latency(5.0), PerformanceLevel::Excellent);
        assert_eq!(PerformanceLevel::from_latency(35.0), PerformanceLevel::Good);
        assert_eq!(PerformanceLevel::from_latency(75.0), PerformanceLevel::Fair);
        assert_eq!(PerformanceLevel::from_latency(150.0), PerformanceLevel::Poor);
        assert_eq!(PerformanceLevel::from_latency(900.0), PerformanceLevel::VeryPoor);
        assert_eq!(PerformanceLevel::VeryPoor.description(), "Very Poor");
    }

    #[test]
    fn test_colored_lines_keep_content() {
        colored::control::set_override(false);
        let formatter = ColoredFormatter::new();
        let summary = LatencySummary { min_ms: 8.0, max_ms: 31.0, avg_ms: 14.3, jitter_max_ms: 9.0 };
        let snapshot = StatsSnapshot::complete(Phase::Upload, Some(3.5), Some(12.0), Some(3.0), summary);

        let out = formatter.format_snapshot(&snapshot);
        assert!(out.starts_with('\r'));
        assert!(out.contains("[upload]"));
        assert!(out.contains("COMPLETE"));
        assert!(out.contains("3.50"));
        assert!(out.contains("Max Jitter: 9.0 ms"));
        colored::control::unset_override();
    }

    #[test]
    fn test_done_line() {
        let out = ColoredFormatter::new().format_snapshot(&StatsSnapshot::done());
        assert!(out.contains("Test Complete."));
    }
}
