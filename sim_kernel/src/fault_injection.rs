//! Deterministic fault injection for testing
//!
//! Lets a test make specific kernel calls fail so the I/O layer's rollback
//! and skip paths can be exercised.
//!
//! ## Example
//!
//! ```
//! use sim_kernel::fault_injection::{FaultPlan, HandleFault};
//!
//! let plan = FaultPlan::new()
//!     .with_handle_fault(HandleFault::FailDuplicate { count: 1 });
//! assert_eq!(plan.handle_faults().len(), 1);
//! ```

use core_types::RawHandle;

/// A fault to inject into handle operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleFault {
    /// The next close of this handle reports `Io`; the handle is still
    /// released
    FailClose { handle: RawHandle },
    /// The next N duplicate calls fail `NoResources`
    FailDuplicate { count: usize },
}

/// A plan describing all faults to inject
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    handle_faults: Vec<HandleFault>,
}

impl FaultPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handle_fault(mut self, fault: HandleFault) -> Self {
        self.handle_faults.push(fault);
        self
    }

    pub fn handle_faults(&self) -> &[HandleFault] {
        &self.handle_faults
    }
}

/// Applies a fault plan, consuming one-shot faults as they fire
#[derive(Debug, Default)]
pub struct FaultInjector {
    failing_closes: Vec<RawHandle>,
    failing_duplicates: usize,
}

impl FaultInjector {
    pub fn new(plan: FaultPlan) -> Self {
        let mut injector = Self::default();
        injector.extend(plan);
        injector
    }

    pub fn extend(&mut self, plan: FaultPlan) {
        for fault in plan.handle_faults {
            match fault {
                HandleFault::FailClose { handle } => self.failing_closes.push(handle),
                HandleFault::FailDuplicate { count } => self.failing_duplicates += count,
            }
        }
    }

    /// Whether this close should report failure
    pub fn should_fail_close(&mut self, handle: RawHandle) -> bool {
        match self.failing_closes.iter().position(|h| *h == handle) {
            Some(index) => {
                self.failing_closes.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// Whether this duplicate should fail
    pub fn should_fail_duplicate(&mut self) -> bool {
        if self.failing_duplicates > 0 {
            self.failing_duplicates -= 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_close_is_one_shot() {
        let mut injector =
            FaultInjector::new(FaultPlan::new().with_handle_fault(HandleFault::FailClose {
                handle: 9,
            }));
        assert!(!injector.should_fail_close(8));
        assert!(injector.should_fail_close(9));
        assert!(!injector.should_fail_close(9));
    }

    #[test]
    fn test_fail_duplicate_counts_down() {
        let mut injector = FaultInjector::new(
            FaultPlan::new().with_handle_fault(HandleFault::FailDuplicate { count: 2 }),
        );
        assert!(injector.should_fail_duplicate());
        assert!(injector.should_fail_duplicate());
        assert!(!injector.should_fail_duplicate());
    }
}
