//! In-memory remote I/O peer
//!
//! [`MemFs`] plays the part of the filesystem server at the far end of a
//! remote I/O object. Each served node gets its own thread holding the
//! server end of a message pipe; the thread answers RIO requests until the
//! client closes its end or sends `Close`.
//!
//! It is a test fixture: just enough filesystem to exercise open, read,
//! write, seek, stat, readdir, ioctl and clone over the real wire protocol.

use core_types::RawHandle;
use ipc::{
    DirentWriter, RioOp, RioReply, RioRequest, VnAttr, DIRENT_TYPE_DIR, DIRENT_TYPE_FILE,
    MXIO_CHUNK_SIZE, S_IFDIR, S_IFREG,
};
use kernel_api::{Deadline, Handle, KernelError, KernelRef, Signals};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// `open` flag: create the file if it does not exist
pub const OPEN_CREATE: u32 = 0o100;

/// ioctl understood by every node: copies the input back as output
pub const IOCTL_ECHO: u32 = 0x1;

#[derive(Debug, Clone)]
enum NodeData {
    File(Vec<u8>),
    Dir,
}

#[derive(Debug, Clone)]
struct Node {
    inode: u64,
    data: NodeData,
}

#[derive(Debug)]
struct Tree {
    nodes: BTreeMap<String, Node>,
    next_inode: u64,
}

impl Tree {
    fn insert(&mut self, path: &str, data: NodeData) {
        if let Some(parent) = parent_of(path) {
            if !self.nodes.contains_key(&parent) {
                self.insert(&parent, NodeData::Dir);
            }
        }
        let inode = self.next_inode;
        self.next_inode += 1;
        self.nodes.insert(path.to_string(), Node { inode, data });
    }
}

/// Joins `path` onto `base` and folds `.` and `..`
fn resolve(base: &str, path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{}/{}", base, path)
    };
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

fn parent_of(path: &str) -> Option<String> {
    if path == "/" {
        return None;
    }
    let cut = path.rfind('/')?;
    Some(if cut == 0 {
        "/".to_string()
    } else {
        path[..cut].to_string()
    })
}

/// In-memory filesystem served over RIO
#[derive(Clone)]
pub struct MemFs {
    tree: Arc<Mutex<Tree>>,
    kernel: KernelRef,
}

impl MemFs {
    /// Creates a filesystem holding only the root directory
    pub fn new(kernel: KernelRef) -> Self {
        let mut tree = Tree {
            nodes: BTreeMap::new(),
            next_inode: 1,
        };
        tree.insert("/", NodeData::Dir);
        Self {
            tree: Arc::new(Mutex::new(tree)),
            kernel,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds a file, creating parent directories as needed
    pub fn with_file(self, path: &str, contents: &[u8]) -> Self {
        self.lock()
            .insert(&resolve("/", path), NodeData::File(contents.to_vec()));
        self
    }

    pub fn with_dir(self, path: &str) -> Self {
        self.lock().insert(&resolve("/", path), NodeData::Dir);
        self
    }

    /// Current contents of a file
    pub fn file_contents(&self, path: &str) -> Option<Vec<u8>> {
        match self.lock().nodes.get(&resolve("/", path)) {
            Some(Node {
                data: NodeData::File(bytes),
                ..
            }) => Some(bytes.clone()),
            _ => None,
        }
    }

    /// Serves `path` and returns the client end of its channel
    pub fn serve(&self, path: &str) -> Result<Handle, KernelError> {
        let raw = self.spawn_node(resolve("/", path), None)?;
        Ok(Handle::from_raw(self.kernel.clone(), raw))
    }

    /// Serves `path` with an event handle asserting `USER_0` (readable)
    ///
    /// Returns the client's channel end and the client's event handle.
    pub fn serve_with_event(&self, path: &str) -> Result<(Handle, Handle), KernelError> {
        let event = Handle::from_raw(self.kernel.clone(), self.kernel.event_create()?);
        self.kernel
            .object_signal(event.raw(), Signals::empty(), Signals::USER_0)?;
        let server_event = event.duplicate()?;
        let raw = self.spawn_node(resolve("/", path), Some(server_event))?;
        Ok((Handle::from_raw(self.kernel.clone(), raw), event))
    }

    fn spawn_node(&self, path: String, event: Option<Handle>) -> Result<RawHandle, KernelError> {
        let (client, server) = self.kernel.message_pipe_create()?;
        let server = Handle::from_raw(self.kernel.clone(), server);
        let mut node = NodeServer {
            fs: self.clone(),
            path,
            offset: 0,
            readdir_cursor: 0,
            event,
        };
        let name = format!("rio:{}", node.path);
        let spawned = std::thread::Builder::new()
            .name(name)
            .spawn(move || node.run(server));
        if spawned.is_err() {
            let _ = self.kernel.handle_close(client);
            return Err(KernelError::NoResources);
        }
        Ok(client)
    }
}

struct NodeServer {
    fs: MemFs,
    path: String,
    offset: u64,
    readdir_cursor: usize,
    event: Option<Handle>,
}

/// What to send back, and whether the connection ends afterwards
struct Outcome {
    reply: RioReply,
    handles: Vec<RawHandle>,
    done: bool,
}

impl Outcome {
    fn reply(reply: RioReply) -> Self {
        Self {
            reply,
            handles: Vec::new(),
            done: false,
        }
    }

    fn error(request: &RioRequest, err: KernelError) -> Self {
        Self::reply(RioReply::error(request, err.code()))
    }
}

impl NodeServer {
    fn run(&mut self, channel: Handle) {
        let kernel = channel.kernel().clone();
        loop {
            let wanted = Signals::READABLE | Signals::PEER_CLOSED;
            if channel.wait_one(wanted, Deadline::Infinite).is_err() {
                break;
            }
            let message = match kernel.message_read(channel.raw()) {
                Ok(message) => message,
                Err(KernelError::ShouldWait) => continue,
                Err(_) => break,
            };
            for stray in message.handles {
                let _ = kernel.handle_close(stray);
            }
            let request = match RioRequest::decode(&message.bytes) {
                Ok(request) => request,
                Err(err) => {
                    log::warn!("{}: dropping undecodable request: {}", self.path, err);
                    continue;
                }
            };
            let outcome = self.handle(&request);
            let Ok(bytes) = outcome.reply.encode() else {
                break;
            };
            if kernel
                .message_write(channel.raw(), &bytes, outcome.handles)
                .is_err()
                || outcome.done
            {
                break;
            }
        }
    }

    fn handle(&mut self, request: &RioRequest) -> Outcome {
        match &request.op {
            RioOp::Close => Outcome {
                reply: RioReply::ok(request, 0),
                handles: Vec::new(),
                done: true,
            },
            RioOp::Clone => self.clone_node(request),
            RioOp::Open { path, flags } => self.open(request, path, *flags),
            RioOp::Read { max } => self.read(request, *max),
            RioOp::Write { data } => self.write(request, data),
            RioOp::Seek { offset, whence } => self.seek(request, *offset, *whence),
            RioOp::Stat { max } => self.stat(request, *max),
            RioOp::Readdir { max } => self.readdir(request, *max),
            RioOp::Ioctl { op, input, max } => {
                if *op != IOCTL_ECHO {
                    return Outcome::error(request, KernelError::NotSupported);
                }
                let out: Vec<u8> = input.iter().take(*max).copied().collect();
                Outcome::reply(RioReply::ok(request, out.len() as i32).with_data(out))
            }
        }
    }

    fn clone_node(&mut self, request: &RioRequest) -> Outcome {
        let event = match self.event.as_ref().map(|event| event.duplicate()).transpose() {
            Ok(event) => event,
            Err(err) => return Outcome::error(request, err),
        };
        let client_event = match event.as_ref().map(|event| event.duplicate()).transpose() {
            Ok(event) => event,
            Err(err) => return Outcome::error(request, err),
        };
        match self.fs.spawn_node(self.path.clone(), event) {
            Ok(client) => {
                let mut handles = vec![client];
                handles.extend(client_event.map(Handle::into_raw));
                Outcome {
                    reply: RioReply::ok(request, handles.len() as i32),
                    handles,
                    done: false,
                }
            }
            Err(err) => Outcome::error(request, err),
        }
    }

    fn open(&mut self, request: &RioRequest, path: &str, flags: u32) -> Outcome {
        let target = resolve(&self.path, path);
        {
            let mut tree = self.fs.lock();
            if !tree.nodes.contains_key(&target) {
                let parent_is_dir = parent_of(&target)
                    .and_then(|parent| tree.nodes.get(&parent).map(|n| n.data.clone()))
                    .map(|data| matches!(data, NodeData::Dir))
                    .unwrap_or(false);
                if flags & OPEN_CREATE == 0 || !parent_is_dir {
                    return Outcome::error(request, KernelError::NotFound);
                }
                tree.insert(&target, NodeData::File(Vec::new()));
            }
        }
        match self.fs.spawn_node(target, None) {
            Ok(client) => Outcome {
                reply: RioReply::ok(request, 1),
                handles: vec![client],
                done: false,
            },
            Err(err) => Outcome::error(request, err),
        }
    }

    fn read(&mut self, request: &RioRequest, max: usize) -> Outcome {
        let tree = self.fs.lock();
        let Some(Node {
            data: NodeData::File(bytes),
            ..
        }) = tree.nodes.get(&self.path)
        else {
            return Outcome::error(request, KernelError::InvalidArgs);
        };
        let start = (self.offset as usize).min(bytes.len());
        let end = start + max.min(MXIO_CHUNK_SIZE).min(bytes.len() - start);
        let chunk = bytes[start..end].to_vec();
        drop(tree);
        self.offset = end as u64;
        Outcome::reply(
            RioReply::ok(request, chunk.len() as i32)
                .with_data(chunk)
                .with_offset(self.offset),
        )
    }

    fn write(&mut self, request: &RioRequest, data: &[u8]) -> Outcome {
        let mut tree = self.fs.lock();
        let Some(Node {
            data: NodeData::File(bytes),
            ..
        }) = tree.nodes.get_mut(&self.path)
        else {
            return Outcome::error(request, KernelError::InvalidArgs);
        };
        let start = self.offset as usize;
        let end = start + data.len();
        if bytes.len() < end {
            bytes.resize(end, 0);
        }
        bytes[start..end].copy_from_slice(data);
        drop(tree);
        self.offset = end as u64;
        Outcome::reply(RioReply::ok(request, data.len() as i32).with_offset(self.offset))
    }

    fn seek(&mut self, request: &RioRequest, offset: i64, whence: u32) -> Outcome {
        let size = match self.fs.lock().nodes.get(&self.path) {
            Some(Node {
                data: NodeData::File(bytes),
                ..
            }) => bytes.len() as i64,
            _ => 0,
        };
        let base = match whence {
            0 => 0,
            1 => self.offset as i64,
            2 => size,
            _ => return Outcome::error(request, KernelError::InvalidArgs),
        };
        match base.checked_add(offset) {
            Some(target) if target >= 0 => {
                self.offset = target as u64;
                Outcome::reply(RioReply::ok(request, 0).with_offset(self.offset))
            }
            _ => Outcome::error(request, KernelError::InvalidArgs),
        }
    }

    fn stat(&mut self, request: &RioRequest, max: usize) -> Outcome {
        let attr = match self.fs.lock().nodes.get(&self.path) {
            Some(Node {
                inode,
                data: NodeData::File(bytes),
            }) => VnAttr {
                mode: S_IFREG | 0o644,
                inode: *inode,
                size: bytes.len() as u64,
            },
            Some(Node {
                inode,
                data: NodeData::Dir,
            }) => VnAttr {
                mode: S_IFDIR | 0o755,
                inode: *inode,
                size: 0,
            },
            None => return Outcome::error(request, KernelError::NotFound),
        };
        let mut bytes = attr.to_bytes().to_vec();
        bytes.truncate(max);
        Outcome::reply(RioReply::ok(request, bytes.len() as i32).with_data(bytes))
    }

    fn readdir(&mut self, request: &RioRequest, max: usize) -> Outcome {
        let tree = self.fs.lock();
        if !matches!(
            tree.nodes.get(&self.path),
            Some(Node {
                data: NodeData::Dir,
                ..
            })
        ) {
            return Outcome::error(request, KernelError::InvalidArgs);
        }
        let children: Vec<(String, u32)> = tree
            .nodes
            .iter()
            .filter(|(path, _)| parent_of(path).as_deref() == Some(self.path.as_str()))
            .map(|(path, node)| {
                let name = path.rsplit('/').next().unwrap_or_default().to_string();
                let kind = match node.data {
                    NodeData::Dir => DIRENT_TYPE_DIR,
                    NodeData::File(_) => DIRENT_TYPE_FILE,
                };
                (name, kind)
            })
            .collect();
        drop(tree);

        let mut writer = DirentWriter::new(max);
        for (name, kind) in children.iter().skip(self.readdir_cursor) {
            if !writer.push(name, *kind) {
                break;
            }
            self.readdir_cursor += 1;
        }
        let bytes = writer.into_bytes();
        Outcome::reply(RioReply::ok(request, bytes.len() as i32).with_data(bytes))
    }
}
