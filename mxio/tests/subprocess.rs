//! Subprocess Integration Tests
//!
//! A parent packs its descriptors, the kernel carries the bundle to a new
//! process, and the child's bootstrap rebuilds the same fd layout.

mod common;

use common::{read_exact, world, World};
use core_types::{HandleInfo, HandleType};
use kernel_api::{Handle, KernelError};
use mxio::{Events, IoKind, Mxio, MxioConfig, RemoteIo, StartupBundle};

fn boot_child(w: &World, process: &Handle) -> Mxio {
    let entries = w.sim.take_startup_bundle(process.raw()).unwrap();
    let mut bundle = StartupBundle::from_raw(&w.kernel, entries);
    let child = Mxio::bootstrap(w.kernel.clone(), MxioConfig::default(), &mut bundle).unwrap();
    assert_eq!(bundle.remaining().count(), 0);
    child
}

#[test]
fn test_child_inherits_fd_layout() {
    let w = world();
    let mut parent = w.booted();
    let file = parent.open("/data.txt", 0).unwrap();
    let (r, wr) = parent.pipe().unwrap();
    assert_eq!((file, r, wr), (3, 4, 5));

    let argv = vec!["child".to_string()];
    let process = parent.start_process("child", &argv).unwrap();
    let entries = w.sim.take_startup_bundle(process.raw()).unwrap();
    let infos: Vec<HandleInfo> = entries.iter().map(|(_, info)| *info).collect();
    assert_eq!(
        infos,
        vec![
            HandleInfo::new(HandleType::MxioRoot, 0),
            HandleInfo::new(HandleType::MxioRemote, 3),
            HandleInfo::new(HandleType::MxioPipe, 4),
            HandleInfo::new(HandleType::MxioPipe, 5),
        ]
    );

    let mut bundle = StartupBundle::from_raw(&w.kernel, entries);
    let mut child = Mxio::bootstrap(w.kernel.clone(), MxioConfig::default(), &mut bundle).unwrap();

    let kinds: Vec<(i32, IoKind)> = child
        .fd_table()
        .occupied()
        .map(|(fd, io)| (fd, io.kind()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (0, IoKind::Null),
            (1, IoKind::Null),
            (2, IoKind::Null),
            (3, IoKind::Remote),
            (4, IoKind::Pipe),
            (5, IoKind::Pipe),
        ]
    );

    assert_eq!(read_exact(&mut child, 3, 7), b"payload");
    child.write(5, b"from child").unwrap();
    assert_eq!(read_exact(&mut parent, 4, 10), b"from child");

    let fd = child.open("/bin/sh", 0).unwrap();
    assert_eq!(fd, 6);
}

#[test]
fn test_paired_remote_survives_the_trip() {
    let w = world();
    let mut parent = w.booted();
    let (channel, event) = w.fs.serve_with_event("/data.txt").unwrap();
    parent
        .bind(Box::new(RemoteIo::new(channel, Some(event))), 7)
        .unwrap();

    let process = parent.start_process("child", &[]).unwrap();
    let mut child = boot_child(&w, &process);

    assert_eq!(child.wait_fd(7, Events::READABLE), Ok(Events::READABLE));
    assert_eq!(read_exact(&mut child, 7, 7), b"payload");
}

#[test]
fn test_parent_table_untouched_by_packing() {
    let w = world();
    let mut parent = w.booted();
    parent.pipe().unwrap();
    let before: Vec<i32> = parent.fd_table().occupied().map(|(fd, _)| fd).collect();

    let _process = parent.start_process("child", &[]).unwrap();
    let after: Vec<i32> = parent.fd_table().occupied().map(|(fd, _)| fd).collect();
    assert_eq!(before, after);

    parent.write(3, b"still mine").unwrap();
    assert_eq!(read_exact(&mut parent, 4, 10), b"still mine");
}

#[test]
fn test_start_without_root_fails() {
    let w = world();
    let mut bundle = StartupBundle::default();
    let mxio = Mxio::bootstrap(w.kernel.clone(), MxioConfig::default(), &mut bundle).unwrap();
    assert!(matches!(
        mxio.start_process("orphan", &[]),
        Err(KernelError::BadHandle)
    ));
}

#[test]
fn test_child_exit_code_through_process_handle() {
    let w = world();
    let parent = w.booted();
    let process = parent.start_process("child", &[]).unwrap();
    let _child = boot_child(&w, &process);

    let exiter = {
        let sim = w.sim.clone();
        let raw = process.raw();
        sim_kernel::test_utils::thread_create("exit", move || sim.exit_process(raw, 42)).unwrap()
    };
    assert_eq!(sim_kernel::test_utils::process_wait_exit(&process), Ok(42));
    assert!(exiter.join().unwrap().is_ok());
}
