//! Inter-processor interrupt interface
//!
//! SMP bring-up lives in the kernel. The userspace layer only ever sees it
//! as an opaque "send an IPI to this set of CPUs" primitive.

use crate::KernelError;
use serde::{Deserialize, Serialize};

/// Set of target CPUs, one bit per CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CpuMask(pub u32);

impl CpuMask {
    pub const ALL: CpuMask = CpuMask(u32::MAX);

    /// Mask naming one CPU. CPUs past 31 are not addressable.
    pub fn single(cpu: u32) -> Option<Self> {
        1u32.checked_shl(cpu).map(CpuMask)
    }

    pub fn contains(&self, cpu: u32) -> bool {
        1u32.checked_shl(cpu)
            .map(|bit| self.0 & bit != 0)
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Kind of inter-processor interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MpIpi {
    Generic,
    Reschedule,
    Halt,
}

/// Sends an IPI to a set of CPUs, if the platform supports it
pub trait IpiSender {
    fn send_ipi(&self, target: CpuMask, ipi: MpIpi) -> Result<(), KernelError>;
}
