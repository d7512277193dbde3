use std::fs;
use std::io;
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::IpcStream;

/// Room in `sockaddr_un.sun_path`, terminator included.
#[cfg(target_os = "linux")]
const SUN_PATH_LEN: usize = 108;
#[cfg(not(target_os = "linux"))]
const SUN_PATH_LEN: usize = 104;

/// Listening Unix domain socket bound to a filesystem path.
///
/// The socket file is removed on drop, provided it is still the one this
/// listener created.
pub struct UnixDomainSocket {
    listener: UnixListener,
    path: PathBuf,
    /// `(device, inode)` of the socket file created by `bind`.
    created: (u64, u64),
}

impl UnixDomainSocket {
    /// Permissions given to the socket file by [`UnixDomainSocket::bind`].
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;

    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_mode(path, Self::DEFAULT_SOCKET_MODE)
    }

    /// Bind `path` and restrict the socket file to `mode`.
    ///
    /// A socket left at `path` by an earlier server is replaced. Any other
    /// kind of file is left alone and reported as a bind error.
    pub fn bind_with_mode(path: impl AsRef<Path>, mode: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let len = path.as_os_str().len();
        if len >= SUN_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len,
                max: SUN_PATH_LEN,
            });
        }
        let bind_error = |source: io::Error| TransportError::Bind {
            path: path.clone(),
            source,
        };

        remove_stale_socket(&path).map_err(bind_error)?;
        let listener = UnixListener::bind(&path).map_err(bind_error)?;
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).map_err(bind_error)?;
        let created = socket_id(&path).ok_or_else(|| {
            bind_error(io::Error::new(
                io::ErrorKind::NotFound,
                "socket file disappeared after bind",
            ))
        })?;

        info!(path = %path.display(), mode = format_args!("{mode:o}"), "listening");
        Ok(Self {
            listener,
            path,
            created,
        })
    }

    /// Accept an incoming connection, blocking unless the listener is in
    /// non-blocking mode.
    pub fn accept(&self) -> Result<IpcStream> {
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!("accepted connection");
        Ok(IpcStream::from_unix(stream))
    }

    /// Accept a pending connection if there is one.
    ///
    /// Requires [`UnixDomainSocket::set_nonblocking`]. The accepted stream
    /// itself is left in blocking mode.
    pub fn try_accept(&self) -> Result<Option<IpcStream>> {
        match self.listener.accept() {
            Ok((stream, _addr)) => {
                stream.set_nonblocking(false)?;
                debug!("accepted connection");
                Ok(Some(IpcStream::from_unix(stream)))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(TransportError::Accept(e)),
        }
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        self.listener.set_nonblocking(nonblocking)?;
        Ok(())
    }

    /// Connect to a listening Unix domain socket (blocking).
    pub fn connect(path: impl AsRef<Path>) -> Result<IpcStream> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|source| TransportError::Connect {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(?path, "connected to unix domain socket");
        Ok(IpcStream::from_unix(stream))
    }

    /// The path this socket is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UnixDomainSocket {
    fn drop(&mut self) {
        if socket_id(&self.path) == Some(self.created) {
            debug!(path = %self.path.display(), "removing socket file");
            let _ = fs::remove_file(&self.path);
        } else {
            debug!(path = %self.path.display(), "socket path no longer ours; leaving it");
        }
    }
}

/// Clear a socket file left behind by an earlier listener.
fn remove_stale_socket(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.file_type().is_socket() => {
            debug!(path = %path.display(), "removing stale socket");
            fs::remove_file(path)
        }
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "existing path is not a unix socket",
        )),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

/// `(device, inode)` of the socket at `path`, or `None` if there is no
/// socket there.
fn socket_id(path: &Path) -> Option<(u64, u64)> {
    let metadata = fs::symlink_metadata(path).ok()?;
    metadata
        .file_type()
        .is_socket()
        .then(|| (metadata.dev(), metadata.ino()))
}
