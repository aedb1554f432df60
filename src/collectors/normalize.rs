use crate::collectors::{HardwareComponent, SensorKind, SensorReading};
use crate::state::{round1, round2, CpuStats, GpuStats, RamStats};

/// Sensor selection is name-based and backend-version dependent, so every
/// mapping lives in this one table. A field matches the first sensor of the
/// rule's kind whose name contains one of the aliases (case-insensitive).
struct FieldRule {
    kind: SensorKind,
    aliases: &'static [&'static str],
}

const CPU_USAGE: FieldRule = FieldRule {
    kind: SensorKind::Load,
    aliases: &["total"],
};
const CPU_TEMPERATURE: FieldRule = FieldRule {
    kind: SensorKind::Temperature,
    aliases: &["core (tctl/tdie)", "package"],
};
const CPU_CLOCK: FieldRule = FieldRule {
    kind: SensorKind::Clock,
    aliases: &["cores"],
};
const CPU_VOLTAGE: FieldRule = FieldRule {
    kind: SensorKind::Voltage,
    aliases: &["core"],
};
const CPU_POWER: FieldRule = FieldRule {
    kind: SensorKind::Power,
    aliases: &["package"],
};

const GPU_USAGE: FieldRule = FieldRule {
    kind: SensorKind::Load,
    aliases: &["core"],
};
const GPU_TEMPERATURE: FieldRule = FieldRule {
    kind: SensorKind::Temperature,
    aliases: &["core"],
};
const GPU_POWER: FieldRule = FieldRule {
    kind: SensorKind::Power,
    aliases: &["gpu package"],
};
const GPU_MEMORY_USED: FieldRule = FieldRule {
    kind: SensorKind::SmallData,
    aliases: &["gpu memory used"],
};
const GPU_MEMORY_TOTAL: FieldRule = FieldRule {
    kind: SensorKind::SmallData,
    aliases: &["gpu memory total"],
};

const RAM_USED: FieldRule = FieldRule {
    kind: SensorKind::Data,
    aliases: &["used"],
};
const RAM_AVAILABLE: FieldRule = FieldRule {
    kind: SensorKind::Data,
    aliases: &["available"],
};

impl FieldRule {
    fn pick(&self, sensors: &[SensorReading]) -> Option<f64> {
        sensors
            .iter()
            .find(|s| {
                s.kind == self.kind && {
                    let name = s.name.to_lowercase();
                    self.aliases.iter().any(|alias| name.contains(alias))
                }
            })
            .map(|s| s.value)
    }
}

/// Maps one backend enumeration onto the fixed schema. A component category
/// that is absent, or a sensor no rule matches, leaves the field at zero;
/// partial data is the normal case, not an error.
pub fn normalize(components: &[HardwareComponent]) -> (CpuStats, GpuStats, RamStats) {
    let mut cpu = CpuStats::default();
    let mut gpu = GpuStats::default();
    let mut ram = RamStats::default();

    for component in components {
        if component.kind == "Cpu" {
            cpu = normalize_cpu(component);
        } else if component.kind.contains("Gpu") {
            // Multi-GPU hosts: the last enumerated adapter wins.
            gpu = normalize_gpu(component);
        } else if component.kind == "Memory" {
            ram = normalize_ram(component);
        }
    }

    (cpu, gpu, ram)
}

fn normalize_cpu(component: &HardwareComponent) -> CpuStats {
    let sensors = &component.sensors;
    CpuStats {
        name: component.name.clone(),
        usage: round1(CPU_USAGE.pick(sensors).unwrap_or(0.0)),
        temperature: round1(CPU_TEMPERATURE.pick(sensors).unwrap_or(0.0)),
        voltage: round2(CPU_VOLTAGE.pick(sensors).unwrap_or(0.0)),
        power: round1(CPU_POWER.pick(sensors).unwrap_or(0.0)),
        clock_speed: round1(CPU_CLOCK.pick(sensors).unwrap_or(0.0)),
    }
}

fn normalize_gpu(component: &HardwareComponent) -> GpuStats {
    let sensors = &component.sensors;
    GpuStats {
        name: component.name.clone(),
        usage: round1(GPU_USAGE.pick(sensors).unwrap_or(0.0)),
        temperature: round1(GPU_TEMPERATURE.pick(sensors).unwrap_or(0.0)),
        memory_used: round2(GPU_MEMORY_USED.pick(sensors).unwrap_or(0.0)),
        memory_total: round2(GPU_MEMORY_TOTAL.pick(sensors).unwrap_or(0.0)),
        power: round1(GPU_POWER.pick(sensors).unwrap_or(0.0)),
    }
}

fn normalize_ram(component: &HardwareComponent) -> RamStats {
    let used = RAM_USED.pick(&component.sensors).unwrap_or(0.0);
    // The backend exposes no true total; derive it from the instantaneous
    // used + available readings of the same cycle.
    let total = RAM_AVAILABLE
        .pick(&component.sensors)
        .map(|available| used + available)
        .unwrap_or(0.0);

    RamStats {
        total: round2(total),
        used: round2(used),
    }
}
