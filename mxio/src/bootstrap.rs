//! Process bootstrap
//!
//! A new process receives a bundle of handles, each tagged with a
//! [`HandleInfo`] word. Bootstrap turns that bundle into the root resolver
//! and the initial fd table, in two passes:
//!
//! 1. **Group**: walk the info words and decide what each entry becomes.
//!    Two adjacent entries carrying the identical remote tag form one unit:
//!    a channel plus its event handle.
//! 2. **Construct**: take the grouped handles out of the bundle and build
//!    the objects.
//!
//! Entries taken are marked consumed, so whatever remains afterwards is
//! exactly what bootstrap chose not to interpret.

use crate::config::{MxioConfig, UnknownHandlePolicy, STDIO_FDS};
use crate::null::NullIo;
use crate::pipe::PipeIo;
use crate::remote::RemoteIo;
use crate::unistd::Mxio;
use crate::io::IoObject;
use crate::ConfigError;
use core_types::{HandleInfo, HandleType, RawHandle};
use kernel_api::{BundleEntry, Handle, KernelRef};

/// Handles delivered at process start
#[derive(Debug, Default)]
pub struct StartupBundle {
    entries: Vec<(Option<Handle>, HandleInfo)>,
}

impl StartupBundle {
    pub fn new(entries: Vec<(Handle, HandleInfo)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(handle, info)| (Some(handle), info))
                .collect(),
        }
    }

    /// Takes ownership of raw entries as the kernel delivers them
    pub fn from_raw(kernel: &KernelRef, entries: Vec<BundleEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(raw, info)| (Some(Handle::from_raw(kernel.clone(), raw)), info))
                .collect(),
        }
    }

    /// Number of entries, consumed or not
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at `index`; a consumed entry reads as `(0, HandleInfo::NONE)`
    pub fn entry(&self, index: usize) -> Option<(RawHandle, HandleInfo)> {
        self.entries
            .get(index)
            .map(|(handle, info)| (handle.as_ref().map_or(0, Handle::raw), *info))
    }

    /// Entries not consumed by bootstrap
    pub fn remaining(&self) -> impl Iterator<Item = (RawHandle, HandleInfo)> + '_ {
        self.entries
            .iter()
            .filter_map(|(handle, info)| handle.as_ref().map(|h| (h.raw(), *info)))
    }

    /// Takes the handle at `index`, marking the entry consumed
    pub fn take(&mut self, index: usize) -> Option<Handle> {
        let (handle, info) = self.entries.get_mut(index)?;
        let handle = handle.take()?;
        *info = HandleInfo::NONE;
        Some(handle)
    }

    /// Gives up every entry not yet consumed
    pub fn into_remaining(self) -> Vec<(Handle, HandleInfo)> {
        self.entries
            .into_iter()
            .filter_map(|(handle, info)| handle.map(|h| (h, info)))
            .collect()
    }
}

/// What one or two bundle entries decode to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Root { index: usize },
    Remote { fd: u16, primary: usize, event: Option<usize> },
    Pipe { fd: u16, index: usize },
    ProcSelf { index: usize },
    Unknown { index: usize },
}

/// First pass: group entries into units by their info words
fn group(infos: &[HandleInfo]) -> Vec<Unit> {
    let mut units = Vec::new();
    let mut index = 0;
    while index < infos.len() {
        let info = infos[index];
        let unit = match info.handle_type() {
            _ if info.is_none() => {
                index += 1;
                continue;
            }
            HandleType::MxioRoot => Unit::Root { index },
            HandleType::MxioRemote => {
                let paired = infos.get(index + 1) == Some(&info);
                let unit = Unit::Remote {
                    fd: info.arg(),
                    primary: index,
                    event: paired.then_some(index + 1),
                };
                if paired {
                    index += 1;
                }
                unit
            }
            HandleType::MxioPipe => Unit::Pipe {
                fd: info.arg(),
                index,
            },
            HandleType::ProcSelf => Unit::ProcSelf { index },
            HandleType::Unknown(_) => Unit::Unknown { index },
        };
        units.push(unit);
        index += 1;
    }
    units
}

impl Mxio {
    /// Builds a process's I/O context from its startup bundle
    ///
    /// Consumed entries are marked in `bundle`. Entries of unknown type are
    /// left there or moved into the context, per
    /// [`MxioConfig::unknown_handles`]. Runs once per process; the returned
    /// context tears the fd table down when dropped.
    pub fn bootstrap(
        kernel: KernelRef,
        config: MxioConfig,
        bundle: &mut StartupBundle,
    ) -> Result<Mxio, ConfigError> {
        let mut mxio = Mxio::new(kernel, config)?;
        let infos: Vec<HandleInfo> = bundle.entries.iter().map(|(_, info)| *info).collect();

        for unit in group(&infos) {
            match unit {
                Unit::Root { index } => {
                    if let Some(handle) = bundle.take(index) {
                        log::debug!("bootstrap: root {:?}", handle);
                        mxio.install_root(Box::new(RemoteIo::new(handle, None)));
                    }
                }
                Unit::Remote { fd, primary, event } => {
                    let Some(channel) = bundle.take(primary) else {
                        continue;
                    };
                    let event = event.and_then(|index| bundle.take(index));
                    log::debug!(
                        "bootstrap: remote fd {} {:?} event {:?}",
                        fd,
                        channel,
                        event
                    );
                    mxio.bind_inherited(Box::new(RemoteIo::new(channel, event)), fd);
                }
                Unit::Pipe { fd, index } => {
                    if let Some(handle) = bundle.take(index) {
                        log::debug!("bootstrap: pipe fd {} {:?}", fd, handle);
                        mxio.bind_inherited(Box::new(PipeIo::new(handle)), fd);
                    }
                }
                Unit::ProcSelf { index } => {
                    if mxio.process.is_some() {
                        log::warn!("bootstrap: extra process handle at {} left in bundle", index);
                        continue;
                    }
                    mxio.process = bundle.take(index);
                }
                Unit::Unknown { index } => match mxio.config.unknown_handles {
                    UnknownHandlePolicy::Ignore => {
                        log::debug!("bootstrap: leaving entry {} ({})", index, infos[index]);
                    }
                    UnknownHandlePolicy::Retain => {
                        if let Some(handle) = bundle.take(index) {
                            mxio.retained.push((handle, infos[index]));
                        }
                    }
                },
            }
        }

        if mxio.config.stdio_fallback {
            for fd in 0..STDIO_FDS as i32 {
                if mxio.table.resolve(fd).is_none() {
                    if let Err(err) = mxio.table.bind(Box::new(NullIo::new()), fd) {
                        log::warn!("bootstrap: cannot bind null stdio at fd {}: {}", fd, err.status);
                        err.close();
                    }
                }
            }
        }
        Ok(mxio)
    }

    /// Binds an inherited object at its tagged fd, closing it if it cannot
    /// be bound
    fn bind_inherited(&mut self, io: Box<dyn IoObject>, fd: u16) {
        if let Err(err) = self.table.bind(io, i32::from(fd)) {
            log::warn!("bootstrap: cannot bind inherited fd {}: {}", fd, err.status);
            err.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(ty: HandleType, arg: u16) -> HandleInfo {
        HandleInfo::new(ty, arg)
    }

    #[test]
    fn test_group_pairs_adjacent_identical_remote_tags() {
        let infos = [
            info(HandleType::MxioRoot, 0),
            info(HandleType::MxioRemote, 3),
            info(HandleType::MxioRemote, 3),
        ];
        assert_eq!(
            group(&infos),
            vec![
                Unit::Root { index: 0 },
                Unit::Remote {
                    fd: 3,
                    primary: 1,
                    event: Some(2)
                },
            ]
        );
    }

    #[test]
    fn test_group_does_not_pair_different_fds() {
        let infos = [info(HandleType::MxioRemote, 3), info(HandleType::MxioRemote, 4)];
        assert_eq!(
            group(&infos),
            vec![
                Unit::Remote {
                    fd: 3,
                    primary: 0,
                    event: None
                },
                Unit::Remote {
                    fd: 4,
                    primary: 1,
                    event: None
                },
            ]
        );
    }

    #[test]
    fn test_group_does_not_pair_roots_or_pipes() {
        let infos = [
            info(HandleType::MxioRoot, 0),
            info(HandleType::MxioRoot, 0),
            info(HandleType::MxioPipe, 1),
            info(HandleType::MxioPipe, 1),
        ];
        assert_eq!(group(&infos).len(), 4);
    }

    #[test]
    fn test_group_skips_consumed_and_keeps_unknown() {
        let infos = [
            HandleInfo::NONE,
            info(HandleType::Unknown(0x7f), 0),
            info(HandleType::ProcSelf, 0),
        ];
        assert_eq!(
            group(&infos),
            vec![Unit::Unknown { index: 1 }, Unit::ProcSelf { index: 2 }]
        );
    }
}
