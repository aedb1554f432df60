use crate::collectors::{
    DiskBackend, HardwareComponent, Partition, PartitionUsage, SensorKind, SensorReading,
};
use crate::state::OsInfo;
use std::process::Command;
use sysinfo::{ComponentExt, CpuExt, DiskExt, System, SystemExt};
use tracing::debug;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Owned hardware handle. Enumerates components on demand instead of keeping
/// module-level sensor references; `reopen` rebuilds the whole session if the
/// backend gets into a bad state.
pub struct HardwareSession {
    system: System,
}

impl HardwareSession {
    pub fn open() -> Self {
        Self {
            system: System::new_all(),
        }
    }

    pub fn reopen(&mut self) {
        self.system = System::new_all();
    }

    /// One backend enumeration: CPU and memory from sysinfo, GPUs from
    /// nvidia-smi when present. Missing sensors are simply absent from the
    /// component's list.
    pub fn components(&mut self) -> Vec<HardwareComponent> {
        self.system.refresh_cpu();
        self.system.refresh_memory();
        self.system.refresh_components_list();
        self.system.refresh_components();

        let mut out = vec![self.cpu_component(), self.memory_component()];
        out.extend(nvidia_components());
        out
    }

    pub fn os_info(&self) -> OsInfo {
        OsInfo {
            name: self.system.name().unwrap_or_default().trim().to_string(),
            version: self
                .system
                .os_version()
                .unwrap_or_default()
                .trim()
                .to_string(),
        }
    }

    fn cpu_component(&self) -> HardwareComponent {
        let cpus = self.system.cpus();
        let name = cpus
            .first()
            .map(|c| c.brand().trim().to_string())
            .unwrap_or_default();

        let mut sensors = Vec::new();
        if !cpus.is_empty() {
            let usage = cpus.iter().map(|c| c.cpu_usage() as f64).sum::<f64>() / cpus.len() as f64;
            sensors.push(SensorReading {
                kind: SensorKind::Load,
                name: "CPU Total".to_string(),
                value: usage,
            });

            let clock = cpus.iter().map(|c| c.frequency() as f64).sum::<f64>() / cpus.len() as f64;
            if clock > 0.0 {
                sensors.push(SensorReading {
                    kind: SensorKind::Clock,
                    name: "Cores (Average)".to_string(),
                    value: clock,
                });
            }
        }

        if let Some(temp) = cpu_temperature(&self.system) {
            sensors.push(SensorReading {
                kind: SensorKind::Temperature,
                name: "Core (Tctl/Tdie)".to_string(),
                value: temp,
            });
        }

        HardwareComponent {
            kind: "Cpu".to_string(),
            name,
            sensors,
        }
    }

    fn memory_component(&self) -> HardwareComponent {
        let used = self.system.used_memory() as f64 / GIB;
        let available = self.system.available_memory() as f64 / GIB;

        HardwareComponent {
            kind: "Memory".to_string(),
            name: "Generic Memory".to_string(),
            sensors: vec![
                SensorReading {
                    kind: SensorKind::Data,
                    name: "Memory Used".to_string(),
                    value: used,
                },
                SensorReading {
                    kind: SensorKind::Data,
                    name: "Memory Available".to_string(),
                    value: available,
                },
            ],
        }
    }
}

impl DiskBackend for HardwareSession {
    fn partitions(&mut self) -> Vec<Partition> {
        self.system.refresh_disks_list();
        self.system.refresh_disks();
        self.system
            .disks()
            .iter()
            .map(|d| Partition {
                device: d.name().to_string_lossy().to_string(),
                mountpoint: d.mount_point().to_string_lossy().to_string(),
                fstype: String::from_utf8_lossy(d.file_system()).to_string(),
                flags: Vec::new(),
            })
            .collect()
    }

    fn usage(&mut self, mountpoint: &str) -> Option<PartitionUsage> {
        let disk = self
            .system
            .disks()
            .iter()
            .find(|d| d.mount_point().to_string_lossy() == mountpoint)?;
        let total = disk.total_space();
        if total == 0 {
            return None;
        }
        let free = disk.available_space();
        let used = total.saturating_sub(free);
        Some(PartitionUsage {
            total_bytes: total,
            used_bytes: used,
            free_bytes: free,
            percent: used as f64 / total as f64 * 100.0,
        })
    }
}

fn cpu_temperature(system: &System) -> Option<f64> {
    let markers = ["cpu", "package", "tctl", "tdie", "coretemp", "k10temp"];
    system
        .components()
        .iter()
        .filter_map(|c| {
            let label = c.label().to_lowercase();
            let temp = c.temperature() as f64;
            if !(0.0..=130.0).contains(&temp) {
                return None;
            }
            if label.contains("gpu")
                || label.contains("nvidia")
                || label.contains("amdgpu")
                || label.contains("radeon")
            {
                return None;
            }
            if markers.iter().any(|m| label.contains(m)) {
                Some(temp)
            } else {
                None
            }
        })
        .max_by(|a, b| a.total_cmp(b))
}

fn nvidia_components() -> Vec<HardwareComponent> {
    let output = run_nvidia_smi(&[
        "--query-gpu=name,utilization.gpu,temperature.gpu,memory.used,memory.total,power.draw",
        "--format=csv,noheader,nounits",
    ]);

    let Some(output) = output else {
        return Vec::new();
    };
    if !output.status.success() {
        debug!(status = %output.status, "nvidia-smi query failed");
        return Vec::new();
    }

    let Ok(text) = String::from_utf8(output.stdout) else {
        return Vec::new();
    };

    text.lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split(',').map(|v| v.trim()).collect();
            if parts.len() < 6 {
                return None;
            }

            let mut sensors = Vec::new();
            if let Some(v) = parse_f64_loose(parts[1]) {
                sensors.push(SensorReading {
                    kind: SensorKind::Load,
                    name: "GPU Core".to_string(),
                    value: v,
                });
            }
            if let Some(v) = parse_f64_loose(parts[2]) {
                sensors.push(SensorReading {
                    kind: SensorKind::Temperature,
                    name: "GPU Core".to_string(),
                    value: v,
                });
            }
            // nvidia-smi reports memory in MiB; the wire schema carries GiB.
            if let Some(v) = parse_f64_loose(parts[3]) {
                sensors.push(SensorReading {
                    kind: SensorKind::SmallData,
                    name: "GPU Memory Used".to_string(),
                    value: v / 1024.0,
                });
            }
            if let Some(v) = parse_f64_loose(parts[4]) {
                sensors.push(SensorReading {
                    kind: SensorKind::SmallData,
                    name: "GPU Memory Total".to_string(),
                    value: v / 1024.0,
                });
            }
            if let Some(v) = parse_f64_loose(parts[5]) {
                sensors.push(SensorReading {
                    kind: SensorKind::Power,
                    name: "GPU Package".to_string(),
                    value: v,
                });
            }

            Some(HardwareComponent {
                kind: "GpuNvidia".to_string(),
                name: parts[0].to_string(),
                sensors,
            })
        })
        .collect()
}

fn run_nvidia_smi(args: &[&str]) -> Option<std::process::Output> {
    if let Ok(output) = Command::new("nvidia-smi").args(args).output() {
        return Some(output);
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(output) = Command::new(r"C:\Windows\System32\nvidia-smi.exe")
            .args(args)
            .output()
        {
            return Some(output);
        }
    }

    None
}

fn parse_f64_loose(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if let Ok(v) = trimmed.parse::<f64>() {
        return Some(v);
    }
    trimmed.replace(',', ".").parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loose_parse_accepts_decimal_comma() {
        assert_eq!(parse_f64_loose(" 42.5 "), Some(42.5));
        assert_eq!(parse_f64_loose("42,5"), Some(42.5));
        assert_eq!(parse_f64_loose("[N/A]"), None);
    }

    #[test]
    fn session_reports_cpu_and_memory_components() {
        let mut session = HardwareSession::open();
        let components = session.components();

        assert!(components.iter().any(|c| c.kind == "Cpu"));
        let memory = components
            .iter()
            .find(|c| c.kind == "Memory")
            .expect("memory component");
        assert!(memory
            .sensors
            .iter()
            .any(|s| s.kind == SensorKind::Data && s.name == "Memory Used"));
    }
}
