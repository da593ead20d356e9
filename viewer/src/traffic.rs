//! Traffic-level classification derived from the detected object count.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficLevel {
    Light,
    Medium,
    Heavy,
}

impl TrafficLevel {
    pub fn from_count(detected_count: i64) -> Self {
        if detected_count < 4 {
            TrafficLevel::Light
        } else if detected_count < 7 {
            TrafficLevel::Medium
        } else {
            TrafficLevel::Heavy
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TrafficLevel::Light => "LIGHT TRAFFIC",
            TrafficLevel::Medium => "MEDIUM TRAFFIC",
            TrafficLevel::Heavy => "HEAVY TRAFFIC",
        }
    }

    /// ANSI color for the terminal rendering.
    pub fn color(self) -> &'static str {
        match self {
            TrafficLevel::Light => "\x1b[92m",
            TrafficLevel::Medium => "\x1b[93m",
            TrafficLevel::Heavy => "\x1b[91m",
        }
    }
}
