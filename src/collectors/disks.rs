use crate::collectors::{DiskBackend, Partition};
use crate::state::{round1, round2, DiskInfo};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Rebuilds the disk list from a fresh enumeration. On the Windows platform
/// family, CD-ROM drives and filesystem-less mounts are skipped; elsewhere
/// every reported partition appears. Numbering is 1-based in enumeration
/// order.
pub fn enumerate<B: DiskBackend>(backend: &mut B, windows_family: bool) -> Vec<DiskInfo> {
    let mut out = Vec::new();

    for partition in backend.partitions() {
        if windows_family && !keep_on_windows(&partition) {
            continue;
        }
        let Some(usage) = backend.usage(&partition.mountpoint) else {
            continue;
        };

        out.push(DiskInfo {
            number: out.len() as u32 + 1,
            name: device_basename(&partition.device),
            device: partition.device,
            mountpoint: partition.mountpoint,
            fstype: partition.fstype,
            total: round2(usage.total_bytes as f64 / GIB),
            used: round2(usage.used_bytes as f64 / GIB),
            free: round2(usage.free_bytes as f64 / GIB),
            percent: round1(usage.percent),
        });
    }

    out
}

fn keep_on_windows(partition: &Partition) -> bool {
    if partition.fstype.is_empty() {
        return false;
    }
    !partition
        .flags
        .iter()
        .any(|flag| flag.eq_ignore_ascii_case("cdrom"))
}

fn device_basename(device: &str) -> String {
    device
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(device)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::PartitionUsage;
    use std::collections::HashMap;

    struct FakeDisks {
        partitions: Vec<Partition>,
        usage: HashMap<String, PartitionUsage>,
    }

    impl DiskBackend for FakeDisks {
        fn partitions(&mut self) -> Vec<Partition> {
            self.partitions.clone()
        }

        fn usage(&mut self, mountpoint: &str) -> Option<PartitionUsage> {
            self.usage.get(mountpoint).copied()
        }
    }

    fn partition(device: &str, mountpoint: &str, fstype: &str, flags: &[&str]) -> Partition {
        Partition {
            device: device.to_string(),
            mountpoint: mountpoint.to_string(),
            fstype: fstype.to_string(),
            flags: flags.iter().map(|f| f.to_string()).collect(),
        }
    }

    fn usage_gib(total: f64, used: f64) -> PartitionUsage {
        let total_bytes = (total * GIB) as u64;
        let used_bytes = (used * GIB) as u64;
        PartitionUsage {
            total_bytes,
            used_bytes,
            free_bytes: total_bytes - used_bytes,
            percent: used / total * 100.0,
        }
    }

    fn backend() -> FakeDisks {
        let mut usage = HashMap::new();
        usage.insert("/".to_string(), usage_gib(100.0, 25.0));
        usage.insert("D:\\".to_string(), usage_gib(500.0, 100.0));
        FakeDisks {
            partitions: vec![
                partition("/dev/nvme0n1p2", "/", "ext4", &[]),
                partition("D:\\", "D:\\", "NTFS", &[]),
                partition("E:\\", "E:\\", "UDF", &["ro", "cdrom"]),
                partition("F:\\", "F:\\", "", &[]),
            ],
            usage,
        }
    }

    #[test]
    fn windows_family_skips_cdrom_and_empty_fstype() {
        let disks = enumerate(&mut backend(), true);
        let mounts: Vec<&str> = disks.iter().map(|d| d.mountpoint.as_str()).collect();
        assert_eq!(mounts, vec!["/", "D:\\"]);
        assert_eq!(disks[0].number, 1);
        assert_eq!(disks[1].number, 2);
    }

    #[test]
    fn other_platforms_keep_all_partitions_with_usage() {
        let mut fake = backend();
        let disks = enumerate(&mut fake, false);
        // E:\ and F:\ have no usage entry and drop out; the rest stay.
        let mounts: Vec<&str> = disks.iter().map(|d| d.mountpoint.as_str()).collect();
        assert_eq!(mounts, vec!["/", "D:\\"]);
    }

    #[test]
    fn sizes_are_gib_with_two_decimals() {
        let mut usage = HashMap::new();
        usage.insert(
            "/".to_string(),
            PartitionUsage {
                total_bytes: 256_060_514_304,
                used_bytes: 103_079_215_104,
                free_bytes: 152_981_299_200,
                percent: 40.256,
            },
        );
        let mut fake = FakeDisks {
            partitions: vec![partition("/dev/sda1", "/", "ext4", &[])],
            usage,
        };

        let disks = enumerate(&mut fake, false);
        assert_eq!(disks.len(), 1);
        let disk = &disks[0];
        assert_eq!(disk.name, "sda1");
        assert_eq!(disk.device, "/dev/sda1");
        assert_eq!(disk.total, 238.47);
        assert_eq!(disk.used, 96.0);
        assert_eq!(disk.free, 142.47);
        assert_eq!(disk.percent, 40.3);
    }

    #[test]
    fn hot_plug_appears_on_next_enumeration() {
        let mut fake = backend();
        assert_eq!(enumerate(&mut fake, true).len(), 2);

        fake.partitions
            .push(partition("/dev/sdb1", "/mnt/usb", "exfat", &[]));
        fake.usage
            .insert("/mnt/usb".to_string(), usage_gib(64.0, 1.0));
        assert_eq!(enumerate(&mut fake, true).len(), 3);
    }
}
