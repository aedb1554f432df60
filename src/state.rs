use tokio::sync::RwLock;
use tracing::warn;

/// Rounding contract for the wire schema: usage, temperature, clock and power
/// carry 1 decimal; voltage and memory/disk quantities carry 2.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct CpuStats {
    pub name: String,
    pub usage: f64,
    pub temperature: f64,
    pub voltage: f64,
    pub power: f64,
    pub clock_speed: f64,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct GpuStats {
    pub name: String,
    pub usage: f64,
    pub temperature: f64,
    pub memory_used: f64,
    pub memory_total: f64,
    pub power: f64,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct RamStats {
    pub total: f64,
    pub used: f64,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct OsInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct DiskInfo {
    pub number: u32,
    pub name: String,
    pub device: String,
    pub mountpoint: String,
    pub fstype: String,
    pub total: f64,
    pub used: f64,
    pub free: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct BenchmarkStats {
    pub fps: f64,
    pub min_fps: f64,
    pub max_fps: f64,
    pub frametime: f64,
    pub is_running: bool,
}

/// The normalized record broadcast to clients each publish cycle. Serializes
/// to the wire schema verbatim; field order is stable, so two cycles with no
/// sensor change encode to byte-identical JSON.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Snapshot {
    pub cpu: CpuStats,
    pub gpu: GpuStats,
    pub ram: RamStats,
    pub os: OsInfo,
    pub disks: Vec<DiskInfo>,
    pub benchmarking: BenchmarkStats,
}

struct Inner {
    snapshot: Snapshot,
    target: Option<String>,
    seen_frame: bool,
    capture_available: bool,
}

/// Shared current-stats record. The sampler owns the cpu/gpu/ram/os/disks
/// sub-records, the frame-log consumer owns benchmarking; each publishes a
/// complete replacement of its sub-record under the write lock so readers
/// never observe a half-written one.
pub struct StatsStore {
    inner: RwLock<Inner>,
}

impl StatsStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                snapshot: Snapshot::default(),
                target: None,
                seen_frame: false,
                capture_available: true,
            }),
        }
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.inner.read().await.snapshot.clone()
    }

    pub async fn benchmark_target(&self) -> Option<String> {
        self.inner.read().await.target.clone()
    }

    /// Replaces the sampler-owned sub-records in one swap.
    pub async fn apply_hardware(&self, fragment: crate::collectors::HardwareFragment) {
        let mut inner = self.inner.write().await;
        inner.snapshot.cpu = fragment.cpu;
        inner.snapshot.gpu = fragment.gpu;
        inner.snapshot.ram = fragment.ram;
        inner.snapshot.os = fragment.os;
        inner.snapshot.disks = fragment.disks;
    }

    /// Arms or disarms benchmarking. Arming resets the frame metrics so
    /// min/max track the new target; disarming freezes them in place.
    pub async fn set_benchmark_target(&self, app: Option<String>) {
        let mut inner = self.inner.write().await;
        match app {
            Some(app) if !inner.capture_available => {
                warn!(app = %app, "frame capture unavailable, ignoring benchmark request");
            }
            Some(app) => {
                inner.target = Some(app);
                inner.seen_frame = false;
                inner.snapshot.benchmarking = BenchmarkStats {
                    is_running: true,
                    ..BenchmarkStats::default()
                };
            }
            None => {
                inner.target = None;
                let mut frozen = inner.snapshot.benchmarking.clone();
                frozen.is_running = false;
                inner.snapshot.benchmarking = frozen;
            }
        }
    }

    /// Recomputes the benchmarking sub-record from one frame of the target
    /// application. Frames for other applications are ignored.
    pub async fn record_frame(&self, application: &str, frame_time_ms: f64) {
        if !frame_time_ms.is_finite() || frame_time_ms <= 0.0 {
            return;
        }

        let mut inner = self.inner.write().await;
        let Some(target) = inner.target.clone() else {
            return;
        };
        if !application.to_lowercase().contains(&target.to_lowercase()) {
            return;
        }

        let fps = round2(1000.0 / frame_time_ms);
        let prev = &inner.snapshot.benchmarking;
        let (min_fps, max_fps) = if inner.seen_frame {
            (prev.min_fps.min(fps), prev.max_fps.max(fps))
        } else {
            (fps, fps)
        };
        inner.snapshot.benchmarking = BenchmarkStats {
            fps,
            min_fps,
            max_fps,
            frametime: round2(frame_time_ms),
            is_running: true,
        };
        inner.seen_frame = true;
    }

    /// Called when the capture subprocess cannot be started or its stream
    /// ends. Benchmarking stays disabled for the rest of the process.
    pub async fn disable_capture(&self) {
        let mut inner = self.inner.write().await;
        inner.capture_available = false;
        inner.target = None;
        let mut frozen = inner.snapshot.benchmarking.clone();
        frozen.is_running = false;
        inner.snapshot.benchmarking = frozen;
    }
}

impl Default for StatsStore {
    fn default() -> Self {
        Self::new()
    }
}
