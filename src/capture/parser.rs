/// Column layout of the capture tool's per-frame CSV stream. The application
/// name leads the record and the frame-to-frame present time (ms) sits at a
/// fixed column; everything in between (process id, swap-chain address,
/// present runtime/flags, ...) is ignored here.
pub const FRAME_LOG_COLUMNS: usize = 23;
pub const APPLICATION_COLUMN: usize = 0;
pub const FRAME_TIME_COLUMN: usize = 9;

#[derive(Debug, Clone, PartialEq)]
pub struct FrameSample {
    pub application: String,
    pub frame_time_ms: f64,
}

/// Extracts one frame sample from a log line. Parsing is tolerant: short,
/// malformed or header lines yield `None` and the stream moves on.
pub fn parse_frame_line(line: &str) -> Option<FrameSample> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < FRAME_LOG_COLUMNS {
        return None;
    }

    let application = fields[APPLICATION_COLUMN].trim();
    if application.is_empty() || application.eq_ignore_ascii_case("application") {
        return None;
    }

    let frame_time_ms = fields[FRAME_TIME_COLUMN].trim().parse::<f64>().ok()?;
    if !frame_time_ms.is_finite() || frame_time_ms <= 0.0 {
        return None;
    }

    Some(FrameSample {
        application: application.to_string(),
        frame_time_ms,
    })
}
