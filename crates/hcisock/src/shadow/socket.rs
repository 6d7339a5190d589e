//! Shadow L2CAP sockets
//!
//! A shadow socket is a companion L2CAP connection on the ATT fixed channel
//! opened for a peer the caller is connecting to over a raw HCI socket. The
//! kernel only keeps its LE connection state while such a socket exists.

use crate::gap::BdAddr;
use crate::hci::constants::BTPROTO_L2CAP;
use log::debug;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::rc::Weak;
use std::time::Instant;

/// Fixed channel of the Attribute Protocol
pub const ATT_CID: u16 = 0x0004;

/// Non-owning address index of confirmed shadows
pub(crate) type ConnectedIndex<L> = BTreeMap<BdAddr, Weak<RefCell<ShadowSocket<L>>>>;

/// One side of an LE L2CAP connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L2capEndpoint {
    pub addr: BdAddr,
    /// Kernel `bdaddr_type` (`BDADDR_LE_PUBLIC` / `BDADDR_LE_RANDOM`)
    pub addr_type: u8,
}

impl L2capEndpoint {
    pub fn new(addr: BdAddr, addr_type: u8) -> Self {
        Self { addr, addr_type }
    }
}

/// Opens the OS-level link behind a shadow socket
pub trait L2capConnector {
    /// Open link; dropping it closes the connection
    type Link;

    fn connect(&mut self, local: &L2capEndpoint, peer: &L2capEndpoint) -> io::Result<Self::Link>;
}

// Define the sockaddr_l2 structure
#[repr(C)]
struct SockaddrL2 {
    l2_family: libc::sa_family_t,
    l2_psm: u16,
    l2_bdaddr: [u8; 6],
    l2_cid: u16,
    l2_bdaddr_type: u8,
}

impl SockaddrL2 {
    fn att(endpoint: &L2capEndpoint) -> Self {
        Self {
            l2_family: libc::AF_BLUETOOTH as libc::sa_family_t,
            l2_psm: 0,
            l2_bdaddr: endpoint.addr.bytes,
            l2_cid: ATT_CID.to_le(),
            l2_bdaddr_type: endpoint.addr_type,
        }
    }
}

/// An open kernel L2CAP socket
#[derive(Debug)]
pub struct L2capLink {
    fd: RawFd,
}

impl AsRawFd for L2capLink {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for L2capLink {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

/// Connector backed by real `BTPROTO_L2CAP` sockets
#[derive(Debug, Default, Clone, Copy)]
pub struct KernelL2cap;

impl L2capConnector for KernelL2cap {
    type Link = L2capLink;

    fn connect(&mut self, local: &L2capEndpoint, peer: &L2capEndpoint) -> io::Result<L2capLink> {
        let fd = unsafe {
            libc::socket(
                libc::AF_BLUETOOTH,
                libc::SOCK_SEQPACKET | libc::SOCK_CLOEXEC,
                BTPROTO_L2CAP,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let link = L2capLink { fd };

        let src = SockaddrL2::att(local);
        let result = unsafe {
            libc::bind(
                link.fd,
                &src as *const _ as *const libc::sockaddr,
                std::mem::size_of::<SockaddrL2>() as libc::socklen_t,
            )
        };
        if result < 0 {
            return Err(io::Error::last_os_error());
        }

        // The kernel flushes pending state before connect returns
        let dst = SockaddrL2::att(peer);
        loop {
            let result = unsafe {
                libc::connect(
                    link.fd,
                    &dst as *const _ as *const libc::sockaddr,
                    std::mem::size_of::<SockaddrL2>() as libc::socklen_t,
                )
            };
            if result == 0 {
                return Ok(link);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
}

/// Companion connection to one peer
///
/// `expires` is `None` once the connection is confirmed by a controller
/// handle; such a shadow never expires on its own. A speculative shadow
/// carries the instant after which the reaper may discard it.
pub struct ShadowSocket<L> {
    link: Option<L>,
    expires: Option<Instant>,
    local: L2capEndpoint,
    peer: L2capEndpoint,
    index: Weak<RefCell<ConnectedIndex<L>>>,
}

impl<L> ShadowSocket<L> {
    pub(crate) fn new(
        local: L2capEndpoint,
        peer: L2capEndpoint,
        expires: Option<Instant>,
        index: Weak<RefCell<ConnectedIndex<L>>>,
    ) -> Self {
        Self {
            link: None,
            expires,
            local,
            peer,
            index,
        }
    }

    /// Opens the link, replacing any link already open.
    ///
    /// On failure the socket is left closed.
    pub fn connect<C>(&mut self, connector: &mut C) -> io::Result<()>
    where
        C: L2capConnector<Link = L>,
    {
        self.link = None;
        let link = connector.connect(&self.local, &self.peer)?;
        self.link = Some(link);
        Ok(())
    }

    /// Closes the link if open
    pub fn disconnect(&mut self) {
        self.link = None;
    }

    /// Closes and reopens the link
    pub fn reconnect<C>(&mut self, connector: &mut C) -> io::Result<()>
    where
        C: L2capConnector<Link = L>,
    {
        self.disconnect();
        self.connect(connector)
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    pub fn expires(&self) -> Option<Instant> {
        self.expires
    }

    pub fn set_expires(&mut self, expires: Option<Instant>) {
        self.expires = expires;
    }

    pub fn is_confirmed(&self) -> bool {
        self.expires.is_none()
    }

    pub fn peer(&self) -> &L2capEndpoint {
        &self.peer
    }
}

impl<L> Drop for ShadowSocket<L> {
    fn drop(&mut self) {
        self.disconnect();

        if !self.is_confirmed() {
            return;
        }

        // Only a dead entry can be ours: a live one belongs to a newer shadow.
        if let Some(index) = self.index.upgrade() {
            match index.try_borrow_mut() {
                Ok(mut index) => {
                    if index
                        .get(&self.peer.addr)
                        .is_some_and(|entry| entry.strong_count() == 0)
                    {
                        index.remove(&self.peer.addr);
                    }
                }
                Err(_) => debug!(
                    "Connected index busy while dropping shadow for {}",
                    self.peer.addr
                ),
            }
        }
    }
}
