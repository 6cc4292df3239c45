//! Simulated inter-processor interrupts
//!
//! The I/O layer never brings up CPUs itself; it only sees the kernel's
//! "send IPI" primitive. This records each IPI so tests can observe it.

use kernel_api::{CpuMask, IpiSender, KernelError, MpIpi};
use std::sync::Mutex;

/// SMP configuration
#[derive(Debug, Clone)]
pub struct SmpConfig {
    pub core_count: u32,
}

impl Default for SmpConfig {
    fn default() -> Self {
        Self { core_count: 2 }
    }
}

/// One delivered IPI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpiRecord {
    pub cpu: u32,
    pub ipi: MpIpi,
}

/// Records IPIs instead of raising them
#[derive(Debug, Default)]
pub struct SimulatedIpi {
    config: SmpConfig,
    delivered: Mutex<Vec<IpiRecord>>,
}

impl SimulatedIpi {
    pub fn new(config: SmpConfig) -> Self {
        Self {
            config,
            delivered: Mutex::new(Vec::new()),
        }
    }

    /// IPIs delivered so far, in order
    pub fn delivered(&self) -> Vec<IpiRecord> {
        self.delivered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl IpiSender for SimulatedIpi {
    /// Delivers `ipi` to every present CPU in `target`
    ///
    /// Bits for CPUs that do not exist are ignored; a mask naming no
    /// present CPU is rejected.
    fn send_ipi(&self, target: CpuMask, ipi: MpIpi) -> Result<(), KernelError> {
        let cpus: Vec<u32> = (0..self.config.core_count)
            .filter(|cpu| target.contains(*cpu))
            .collect();
        if cpus.is_empty() {
            return Err(KernelError::InvalidArgs);
        }
        let mut delivered = self
            .delivered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        delivered.extend(cpus.into_iter().map(|cpu| IpiRecord { cpu, ipi }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipi_to_all_present_cpus() {
        let smp = SimulatedIpi::new(SmpConfig { core_count: 2 });
        smp.send_ipi(CpuMask::ALL, MpIpi::Reschedule).unwrap();
        assert_eq!(
            smp.delivered(),
            vec![
                IpiRecord {
                    cpu: 0,
                    ipi: MpIpi::Reschedule
                },
                IpiRecord {
                    cpu: 1,
                    ipi: MpIpi::Reschedule
                },
            ]
        );
    }

    #[test]
    fn test_ipi_to_absent_cpu_rejected() {
        let smp = SimulatedIpi::new(SmpConfig { core_count: 1 });
        let mask = CpuMask::single(5).unwrap();
        assert_eq!(smp.send_ipi(mask, MpIpi::Generic), Err(KernelError::InvalidArgs));
        assert!(smp.delivered().is_empty());
    }
}
