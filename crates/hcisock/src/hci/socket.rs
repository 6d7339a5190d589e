//! HCI Socket implementation for Bluetooth communication
//!
//! This module provides a wrapper around the Linux HCI socket interface,
//! allowing for communication with Bluetooth controllers. In raw mode every
//! packet crossing the socket is also fed through the shadow-connection
//! manager, which may suppress outbound LE create connection commands.

use crate::config::Config;
use crate::error::{HciError, Result};
use crate::gap::{normalize_local_address_type, BdAddr};
use crate::hci::constants::*;
use crate::hci::device::{self, DeviceEntry, DeviceFlags};
use crate::shadow::{
    Direction, Disposition, KernelL2cap, L2capConnector, L2capEndpoint, ShadowManager,
};
use log::{debug, info, warn};
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

/// Channel the socket is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    Unbound,
    Raw,
    User,
    Control,
}

/// Something the drain loop has to tell the caller
#[derive(Debug)]
pub enum SocketEvent<'a> {
    Data(&'a [u8]),
    Error(HciError),
}

/// Represents an HCI socket
///
/// The shadow-connection tables are single-threaded, so the socket is
/// neither `Send` nor `Sync`; drive it from one I/O thread.
pub struct HciSocket<C: L2capConnector = KernelL2cap> {
    fd: RawFd,
    mode: BindMode,
    dev_id: u16,
    address: BdAddr,
    address_type: u8,
    config: Config,
    shadows: Option<ShadowManager<C>>,
}

// Define the sockaddr_hci structure
#[repr(C)]
struct SockaddrHci {
    hci_family: libc::sa_family_t,
    hci_dev: u16,
    hci_channel: u16,
}

impl HciSocket {
    /// Opens a new, unbound, non-blocking HCI socket
    pub fn new() -> Result<Self> {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Result<Self> {
        let fd = unsafe {
            libc::socket(
                libc::AF_BLUETOOTH,
                libc::SOCK_RAW | libc::SOCK_CLOEXEC | libc::SOCK_NONBLOCK,
                BTPROTO_HCI,
            )
        };

        if fd < 0 {
            return Err(HciError::SocketError(io::Error::last_os_error()));
        }

        Ok(HciSocket {
            fd,
            mode: BindMode::Unbound,
            dev_id: 0,
            address: BdAddr::ANY,
            address_type: 0,
            config,
            shadows: None,
        })
    }

    /// Opens an HCI socket bound to `dev_id` on the raw channel
    pub fn open(dev_id: u16) -> Result<Self> {
        let mut socket = Self::new()?;
        socket.bind_raw(Some(dev_id))?;
        Ok(socket)
    }

    /// Binds the raw channel of a device that is up.
    ///
    /// With `None` the first device that is up is chosen. Returns the bound
    /// device id. Shadow-connection tracking is active only in this mode.
    pub fn bind_raw(&mut self, dev_id: Option<u16>) -> Result<u16> {
        let dev_id = self.dev_id_for(dev_id, true);
        self.bind(dev_id, HCI_CHANNEL_RAW)?;
        self.dev_id = dev_id;
        self.mode = BindMode::Raw;

        match device::device_info(self.fd, dev_id) {
            Ok(info) => {
                self.address = info.address;
                self.address_type = normalize_local_address_type(info.dev_type);
            }
            Err(e) => {
                warn!("Could not read address of hci{}: {}", dev_id, e);
                self.address = BdAddr::ANY;
                self.address_type = 0;
            }
        }

        info!(
            "Bound hci{} raw channel, local address {} type {}",
            dev_id, self.address, self.address_type
        );
        self.shadows = Some(ShadowManager::new(
            dev_id,
            L2capEndpoint::new(self.address, self.address_type),
            &self.config,
        ));
        Ok(dev_id)
    }
}

impl<C: L2capConnector> HciSocket<C> {
    /// Wraps an already bound descriptor, tracking shadows through `shadows`
    #[cfg(test)]
    pub(crate) fn from_parts(fd: RawFd, shadows: Option<ShadowManager<C>>) -> Self {
        HciSocket {
            fd,
            mode: if shadows.is_some() {
                BindMode::Raw
            } else {
                BindMode::User
            },
            dev_id: shadows.as_ref().map_or(0, |shadows| shadows.dev_id()),
            address: BdAddr::ANY,
            address_type: 0,
            config: Config::default(),
            shadows,
        }
    }

    /// Gets the raw file descriptor for the socket
    pub fn as_raw_fd(&self) -> RawFd {
        self.fd
    }

    pub fn mode(&self) -> BindMode {
        self.mode
    }

    pub fn dev_id(&self) -> u16 {
        self.dev_id
    }

    /// Local device address and normalized address type
    pub fn local_address(&self) -> (BdAddr, u8) {
        (self.address, self.address_type)
    }

    /// The shadow-connection manager, present in raw mode only
    pub fn shadows(&self) -> Option<&ShadowManager<C>> {
        self.shadows.as_ref()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.fd < 0 {
            return Err(HciError::NotBound);
        }
        Ok(())
    }

    fn bind(&self, dev_id: u16, channel: u16) -> Result<()> {
        self.ensure_open()?;
        let addr = SockaddrHci {
            hci_family: libc::AF_BLUETOOTH as libc::sa_family_t,
            hci_dev: dev_id,
            hci_channel: channel,
        };

        let result = unsafe {
            libc::bind(
                self.fd,
                &addr as *const _ as *const libc::sockaddr,
                std::mem::size_of::<SockaddrHci>() as libc::socklen_t,
            )
        };

        if result < 0 {
            return Err(HciError::BindError(io::Error::last_os_error()));
        }
        Ok(())
    }

    fn dev_id_for(&self, dev_id: Option<u16>, want_up: bool) -> u16 {
        match dev_id {
            Some(dev_id) => dev_id,
            None => match device::device_list(self.fd) {
                Ok(devices) => device::select_device(&devices, want_up),
                Err(e) => {
                    debug!("Device list unavailable, using hci0: {}", e);
                    0
                }
            },
        }
    }

    /// Binds the user channel of a device that is down
    pub fn bind_user(&mut self, dev_id: Option<u16>) -> Result<u16> {
        let dev_id = self.dev_id_for(dev_id, false);
        self.bind(dev_id, HCI_CHANNEL_USER)?;
        self.dev_id = dev_id;
        self.mode = BindMode::User;
        self.shadows = None;

        info!("Bound hci{} user channel", dev_id);
        Ok(dev_id)
    }

    /// Binds the management control channel
    pub fn bind_control(&mut self) -> Result<()> {
        self.bind(HCI_DEV_NONE, HCI_CHANNEL_CONTROL)?;
        self.mode = BindMode::Control;
        self.shadows = None;

        info!("Bound control channel");
        Ok(())
    }

    /// Whether the bound device is up; false when it cannot be queried
    pub fn is_dev_up(&self) -> bool {
        device::device_info(self.fd, self.dev_id)
            .map(|info| info.flags.contains(DeviceFlags::UP))
            .unwrap_or(false)
    }

    pub fn device_list(&self) -> Result<Vec<DeviceEntry>> {
        device::device_list(self.fd)
    }

    /// Installs a raw `struct hci_filter`
    pub fn set_filter(&self, filter: &[u8]) -> Result<()> {
        self.ensure_open()?;
        let result = unsafe {
            libc::setsockopt(
                self.fd,
                SOL_HCI,
                HCI_FILTER,
                filter.as_ptr() as *const libc::c_void,
                filter.len() as libc::socklen_t,
            )
        };

        if result < 0 {
            return Err(HciError::FilterError(io::Error::last_os_error()));
        }
        Ok(())
    }

    /// Wait until the socket is readable.
    ///
    /// Returns `false` on timeout or interruption.
    pub fn wait_readable(&self, timeout: Option<Duration>) -> Result<bool> {
        self.ensure_open()?;
        // Set up the fd_set for select()
        let mut read_fds: libc::fd_set = unsafe { std::mem::zeroed() };
        unsafe {
            libc::FD_ZERO(&mut read_fds);
            libc::FD_SET(self.fd, &mut read_fds);
        }

        let mut timeout_val = timeout.map(|timeout| libc::timeval {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_usec: timeout.subsec_micros() as libc::suseconds_t,
        });
        let timeout_ptr = match timeout_val.as_mut() {
            Some(timeout_val) => timeout_val as *mut libc::timeval,
            None => std::ptr::null_mut(),
        };

        let result = unsafe {
            libc::select(
                self.fd + 1,
                &mut read_fds,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                timeout_ptr,
            )
        };

        if result < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(HciError::PollError(err));
        }

        Ok(result > 0)
    }

    /// Read one packet. Returns `Ok(0)` when nothing is available.
    pub fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        self.ensure_open()?;
        let length = loop {
            let bytes_read = unsafe {
                libc::read(
                    self.fd,
                    buffer.as_mut_ptr() as *mut libc::c_void,
                    buffer.len(),
                )
            };
            if bytes_read >= 0 {
                break bytes_read as usize;
            }

            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => continue,
                io::ErrorKind::WouldBlock => return Ok(0),
                _ => return Err(HciError::ReceiveError(err)),
            }
        };

        if length > 0 {
            self.observe_inbound(&buffer[..length]);
        }
        Ok(length)
    }

    /// Read until the socket would block, handing every packet or error to
    /// `handler`. Returns the number of packets delivered.
    pub fn drain<F>(&mut self, mut handler: F) -> usize
    where
        F: FnMut(SocketEvent<'_>),
    {
        let mut buffer = [0u8; HCI_MAX_FRAME_SIZE];
        let mut delivered = 0;

        loop {
            match self.read(&mut buffer) {
                Ok(0) => break,
                Ok(length) => {
                    handler(SocketEvent::Data(&buffer[..length]));
                    delivered += 1;
                }
                Err(e) => {
                    handler(SocketEvent::Error(e));
                    break;
                }
            }
        }

        delivered
    }

    /// One service tick: wait up to `timeout`, drain whatever arrived, then
    /// reap expired shadows. Returns the number of packets delivered.
    pub fn service<F>(&mut self, timeout: Duration, handler: F) -> Result<usize>
    where
        F: FnMut(SocketEvent<'_>),
    {
        let delivered = if self.wait_readable(Some(timeout))? {
            self.drain(handler)
        } else {
            0
        };

        let reaped = self.cleanup();
        if reaped > 0 {
            debug!("Reaped {} expired shadow connections", reaped);
        }
        Ok(delivered)
    }

    /// Writes one packet to the controller.
    ///
    /// In raw mode an LE create connection may be replaced by a shadow
    /// connect; the packet is then silently not written.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_open()?;
        if self.outbound_disposition(data).is_suppressed() {
            return Ok(());
        }

        let result = unsafe {
            libc::write(self.fd, data.as_ptr() as *const libc::c_void, data.len())
        };
        if result < 0 {
            return Err(HciError::SendError(io::Error::last_os_error()));
        }
        Ok(())
    }

    fn observe_inbound(&mut self, data: &[u8]) {
        if let Some(shadows) = self.shadows.as_mut() {
            shadows.process(data, Direction::Inbound);
        }
    }

    /// What to do with a packet about to be written; only raw mode suppresses
    fn outbound_disposition(&mut self, data: &[u8]) -> Disposition {
        match self.shadows.as_mut() {
            Some(shadows) => shadows.process(data, Direction::Outbound),
            None => Disposition::Forward,
        }
    }

    /// Expire stale speculative shadow connections
    pub fn cleanup(&mut self) -> usize {
        match self.shadows.as_mut() {
            Some(shadows) => shadows.reap(Instant::now()),
            None => 0,
        }
    }

    /// Close every shadow socket, then the HCI socket itself
    pub fn close(&mut self) {
        if let Some(mut shadows) = self.shadows.take() {
            shadows.clear();
        }
        if self.fd >= 0 {
            unsafe {
                libc::close(self.fd);
            }
            self.fd = -1;
        }
        self.mode = BindMode::Unbound;
    }
}

impl<C: L2capConnector> AsRawFd for HciSocket<C> {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl<C: L2capConnector> Drop for HciSocket<C> {
    fn drop(&mut self) {
        self.close();
    }
}
