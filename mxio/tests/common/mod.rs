//! Shared fixtures for the integration suites

#![allow(dead_code)]

use core_types::{HandleInfo, HandleType};
use kernel_api::{Handle, KernelRef};
use mxio::{Mxio, MxioConfig, StartupBundle};
use sim_kernel::rio_peer::MemFs;
use sim_kernel::SimulatedKernel;
use std::sync::Arc;

pub struct World {
    pub sim: Arc<SimulatedKernel>,
    pub kernel: KernelRef,
    pub fs: MemFs,
}

pub fn world() -> World {
    let sim = SimulatedKernel::shared();
    let kernel: KernelRef = sim.clone();
    let fs = MemFs::new(kernel.clone())
        .with_file("/data.txt", b"payload")
        .with_file("/bin/sh", b"#!")
        .with_dir("/tmp");
    World { sim, kernel, fs }
}

impl World {
    /// A context booted with only a root
    pub fn booted(&self) -> Mxio {
        self.booted_with(MxioConfig::default())
    }

    pub fn booted_with(&self, config: MxioConfig) -> Mxio {
        let root = self.fs.serve("/").expect("serve root");
        let mut bundle = StartupBundle::new(vec![(root, HandleInfo::new(HandleType::MxioRoot, 0))]);
        Mxio::bootstrap(self.kernel.clone(), config, &mut bundle).expect("bootstrap")
    }

    pub fn event(&self) -> Handle {
        use kernel_api::KernelApi;
        Handle::from_raw(self.kernel.clone(), self.kernel.event_create().expect("event"))
    }

    /// Waits for peer threads to let go of their handles
    pub fn settle(&self, expected: usize) -> usize {
        for _ in 0..200 {
            let live = self.sim.live_handle_count();
            if live == expected {
                return live;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        self.sim.live_handle_count()
    }
}

/// Reads until `len` bytes arrived or EOF
pub fn read_exact(mxio: &mut Mxio, fd: i32, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let n = mxio.read(fd, &mut out[filled..]).expect("read");
        if n == 0 {
            break;
        }
        filled += n;
    }
    out.truncate(filled);
    out
}
