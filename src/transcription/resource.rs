//! CPU throttling + disk/RAM pre-flight checks (spec §4.4.5, §4.4.7).

use sysinfo::System;
use tracing::debug;

pub struct ResourceMonitor {
    system: System,
}

impl ResourceMonitor {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        Self { system }
    }

    /// Global CPU utilization percentage, sampled after each worker
    /// completion (spec §4.4.5).
    pub fn cpu_utilization_percent(&mut self) -> f32 {
        self.system.refresh_cpu_usage();
        let cpus = self.system.cpus();
        if cpus.is_empty() {
            return 0.0;
        }
        cpus.iter().map(|c| c.cpu_usage()).sum::<f32>() / cpus.len() as f32
    }

    pub fn free_disk_mib(&mut self, path: &std::path::Path) -> Option<u64> {
        let disks = sysinfo::Disks::new_with_refreshed_list();
        let mut best: Option<u64> = None;
        let mut best_len = 0usize;
        for disk in disks.list() {
            let mount = disk.mount_point();
            if path.starts_with(mount) && mount.as_os_str().len() > best_len {
                best_len = mount.as_os_str().len();
                best = Some(disk.available_space() / (1024 * 1024));
            }
        }
        best
    }

    pub fn free_ram_mib(&mut self) -> Option<u64> {
        self.system.refresh_memory();
        let available = self.system.available_memory();
        if available == 0 {
            None
        } else {
            Some(available / (1024 * 1024))
        }
    }
}

impl Default for ResourceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Pre-flight result for Stage 3 (spec §4.4.7).
#[derive(Debug, Clone)]
pub enum PreflightFailure {
    NoBackendAvailable,
    InsufficientDisk { need_mib: u64, have_mib: u64 },
    InsufficientMemory { need_mib: u64, have_mib: u64 },
}

impl std::fmt::Display for PreflightFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreflightFailure::NoBackendAvailable => write!(f, "no transcription backend available"),
            PreflightFailure::InsufficientDisk { need_mib, have_mib } => {
                write!(f, "insufficient free disk: need {need_mib} MiB, have {have_mib} MiB")
            }
            PreflightFailure::InsufficientMemory { need_mib, have_mib } => {
                write!(f, "insufficient free memory: need {need_mib} MiB, have {have_mib} MiB")
            }
        }
    }
}

/// Run the Stage 3 pre-flight checks: disk >= batch bytes + buffer, RAM >=
/// floor (skipped if no probe is available). Caller is responsible for the
/// backend-availability check, which depends on async backend state.
pub fn check_resources(
    monitor: &mut ResourceMonitor,
    staging_dir: &std::path::Path,
    batch_bytes: u64,
    disk_buffer_mib: u64,
    min_free_ram_mib: u64,
) -> Result<(), PreflightFailure> {
    let need_disk_mib = batch_bytes / (1024 * 1024) + disk_buffer_mib;
    if let Some(free_disk) = monitor.free_disk_mib(staging_dir) {
        if free_disk < need_disk_mib {
            return Err(PreflightFailure::InsufficientDisk { need_mib: need_disk_mib, have_mib: free_disk });
        }
    } else {
        debug!("no disk probe available, skipping disk pre-flight check");
    }

    if let Some(free_ram) = monitor.free_ram_mib() {
        if free_ram < min_free_ram_mib {
            return Err(PreflightFailure::InsufficientMemory { need_mib: min_free_ram_mib, have_mib: free_ram });
        }
    } else {
        debug!("no memory probe available, skipping RAM pre-flight check");
    }

    Ok(())
}
