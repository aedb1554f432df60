pub mod disks;
pub mod hardware;
pub mod normalize;

use crate::state::{CpuStats, DiskInfo, GpuStats, OsInfo, RamStats};
use hardware::HardwareSession;

/// One complete poll of the sampler-owned sub-records. Built off to the side
/// and handed to the store as a unit.
#[derive(Debug, Clone, Default)]
pub struct HardwareFragment {
    pub cpu: CpuStats,
    pub gpu: GpuStats,
    pub ram: RamStats,
    pub os: OsInfo,
    pub disks: Vec<DiskInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Load,
    Temperature,
    Clock,
    Voltage,
    Power,
    Data,
    SmallData,
}

/// A named, typed numeric reading exposed by the hardware backend.
#[derive(Debug, Clone)]
pub struct SensorReading {
    pub kind: SensorKind,
    pub name: String,
    pub value: f64,
}

/// Narrow hardware-telemetry contract: a component category (the kind string
/// distinguishes GPU vendors, e.g. "GpuNvidia") with its sensor list.
#[derive(Debug, Clone)]
pub struct HardwareComponent {
    pub kind: String,
    pub name: String,
    pub sensors: Vec<SensorReading>,
}

#[derive(Debug, Clone)]
pub struct Partition {
    pub device: String,
    pub mountpoint: String,
    pub fstype: String,
    pub flags: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct PartitionUsage {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub percent: f64,
}

/// Narrow disk-usage contract. Enumeration re-runs every cycle so hot-plugged
/// devices appear and removed ones disappear.
pub trait DiskBackend {
    fn partitions(&mut self) -> Vec<Partition>;
    fn usage(&mut self, mountpoint: &str) -> Option<PartitionUsage>;
}

/// Runs one full sampling cycle against the session. Blocking; the caller is
/// expected to run this off the async executor.
pub fn sample(session: &mut HardwareSession) -> HardwareFragment {
    let components = session.components();
    let (cpu, gpu, ram) = normalize::normalize(&components);
    let os = session.os_info();
    let disks = disks::enumerate(session, cfg!(windows));

    HardwareFragment {
        cpu,
        gpu,
        ram,
        os,
        disks,
    }
}
