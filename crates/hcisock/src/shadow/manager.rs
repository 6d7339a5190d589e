//! Shadow-connection manager
//!
//! Watches the packets crossing a raw HCI socket and keeps one shadow L2CAP
//! socket per LE connection so the kernel does not drop its connection
//! state. Three tables are maintained:
//!
//! - `connecting`: peer address -> speculative shadow (owning, expires)
//! - `handles`: `handle % 256` -> confirmed shadow (owning)
//! - `connected`: peer address -> confirmed shadow (non-owning)
//!
//! A confirmed shadow lives as long as some handle refers to it; when the
//! last handle goes, its drop removes the `connected` entry. An address is
//! never in `connecting` and `connected` at the same time.

use super::socket::{ConnectedIndex, KernelL2cap, L2capConnector, L2capEndpoint, ShadowSocket};
use crate::config::Config;
use crate::conn_params::ConnectionParameterOverride;
use crate::gap::{AddressType, BdAddr};
use crate::hci::packet::{classify, ConnectionParameters, HciPacketKind};
use log::{debug, trace, warn};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

type SharedShadow<L> = Rc<RefCell<ShadowSocket<L>>>;

/// Which way a packet is travelling through the HCI socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Read from the controller
    Inbound,
    /// About to be written to the controller
    Outbound,
}

/// What the socket should do with a processed packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Deliver or write the packet unchanged
    Forward,
    /// Drop the outbound packet; a shadow connect replaced it
    Suppress,
}

impl Disposition {
    pub fn is_suppressed(self) -> bool {
        self == Disposition::Suppress
    }
}

/// Bookkeeping state of one peer address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowState {
    Absent,
    Connecting { expires: Instant },
    Connected,
}

/// Snapshot of the shadow behind a connection handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowInfo {
    pub peer: L2capEndpoint,
    pub expires: Option<Instant>,
    pub is_connected: bool,
}

fn handle_slot(handle: u16) -> u8 {
    (handle % 256) as u8
}

pub struct ShadowManager<C: L2capConnector = KernelL2cap> {
    connector: C,
    dev_id: u16,
    local: L2capEndpoint,
    connect_timeout: Duration,
    overrides: ConnectionParameterOverride,
    connected: Rc<RefCell<ConnectedIndex<C::Link>>>,
    connecting: BTreeMap<BdAddr, SharedShadow<C::Link>>,
    handles: HashMap<u8, SharedShadow<C::Link>>,
}

impl ShadowManager<KernelL2cap> {
    /// Create a manager that opens real kernel L2CAP sockets
    pub fn new(dev_id: u16, local: L2capEndpoint, config: &Config) -> Self {
        Self::with_connector(KernelL2cap, dev_id, local, config)
    }
}

impl<C: L2capConnector> ShadowManager<C> {
    pub fn with_connector(
        connector: C,
        dev_id: u16,
        local: L2capEndpoint,
        config: &Config,
    ) -> Self {
        Self {
            connector,
            dev_id,
            local,
            connect_timeout: config.connect_timeout(),
            overrides: ConnectionParameterOverride::new(config.debugfs_root.clone()),
            connected: Rc::new(RefCell::new(BTreeMap::new())),
            connecting: BTreeMap::new(),
            handles: HashMap::new(),
        }
    }

    pub fn dev_id(&self) -> u16 {
        self.dev_id
    }

    pub fn local(&self) -> &L2capEndpoint {
        &self.local
    }

    /// Classify one packet and update the shadow tables
    pub fn process(&mut self, data: &[u8], direction: Direction) -> Disposition {
        self.process_at(data, direction, Instant::now())
    }

    /// Like [`process`](Self::process), with an explicit monotonic time
    pub fn process_at(&mut self, data: &[u8], direction: Direction, now: Instant) -> Disposition {
        let kind = classify(data);
        if kind != HciPacketKind::NotRecognized {
            trace!("{:?} {:?}: {}", direction, kind, hex::encode(data));
        }

        match (direction, kind) {
            (
                Direction::Inbound,
                HciPacketKind::LeConnectionComplete {
                    handle,
                    peer,
                    peer_addr_type,
                }
                | HciPacketKind::LeEnhancedConnectionComplete {
                    handle,
                    peer,
                    peer_addr_type,
                },
            ) => {
                self.on_connection_complete(handle, peer, peer_addr_type);
                Disposition::Forward
            }
            (Direction::Inbound, HciPacketKind::DisconnectionComplete { handle }) => {
                self.on_disconnection_complete(handle);
                Disposition::Forward
            }
            (
                Direction::Outbound,
                HciPacketKind::LeCreateConnectionCommand {
                    peer,
                    peer_addr_type,
                    params,
                }
                | HciPacketKind::LeCreateEnhancedConnectionCommand {
                    peer,
                    peer_addr_type,
                    params,
                },
            ) => self.on_create_connection(peer, peer_addr_type, &params, now),
            _ => Disposition::Forward,
        }
    }

    /// Drop every speculative shadow whose expiry is at or before `now`.
    ///
    /// Returns the number of shadows removed.
    pub fn reap(&mut self, now: Instant) -> usize {
        let before = self.connecting.len();
        self.connecting.retain(|peer, shadow| {
            let expired = shadow.borrow().expires().is_some_and(|expires| expires <= now);
            if expired {
                debug!("Speculative shadow for {} expired", peer);
            }
            !expired
        });
        before - self.connecting.len()
    }

    /// Close every shadow socket and forget all connections
    pub fn clear(&mut self) {
        let connecting = std::mem::take(&mut self.connecting);
        let handles = std::mem::take(&mut self.handles);
        if !connecting.is_empty() || !handles.is_empty() {
            debug!(
                "Closing {} speculative and {} confirmed shadows",
                connecting.len(),
                handles.len()
            );
        }
        drop(connecting);
        drop(handles);
        self.connected.borrow_mut().clear();
    }

    pub fn state(&self, peer: &BdAddr) -> ShadowState {
        if let Some(expires) = self.connecting.get(peer).and_then(|s| s.borrow().expires()) {
            ShadowState::Connecting { expires }
        } else if self.is_connected(peer) {
            ShadowState::Connected
        } else {
            ShadowState::Absent
        }
    }

    pub fn is_connecting(&self, peer: &BdAddr) -> bool {
        self.connecting.contains_key(peer)
    }

    pub fn is_connected(&self, peer: &BdAddr) -> bool {
        self.connected
            .borrow()
            .get(peer)
            .is_some_and(|entry| entry.strong_count() > 0)
    }

    pub fn handle_info(&self, handle: u16) -> Option<ShadowInfo> {
        self.handles.get(&handle_slot(handle)).map(|shadow| {
            let shadow = shadow.borrow();
            ShadowInfo {
                peer: *shadow.peer(),
                expires: shadow.expires(),
                is_connected: shadow.is_connected(),
            }
        })
    }

    pub fn peer_for_handle(&self, handle: u16) -> Option<BdAddr> {
        self.handle_info(handle).map(|info| info.peer.addr)
    }

    pub fn connecting_count(&self) -> usize {
        self.connecting.len()
    }

    pub fn connected_count(&self) -> usize {
        self.connected.borrow().len()
    }

    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    fn peer_endpoint(peer: BdAddr, peer_addr_type: u8) -> L2capEndpoint {
        L2capEndpoint::new(peer, AddressType::from(peer_addr_type).le_bdaddr_type())
    }

    fn new_shadow(
        &self,
        peer: BdAddr,
        peer_addr_type: u8,
        expires: Option<Instant>,
    ) -> ShadowSocket<C::Link> {
        ShadowSocket::new(
            self.local,
            Self::peer_endpoint(peer, peer_addr_type),
            expires,
            Rc::downgrade(&self.connected),
        )
    }

    /// Live confirmed shadow for `peer`; prunes a dead entry
    fn live_connected(&mut self, peer: &BdAddr) -> Option<SharedShadow<C::Link>> {
        let mut connected = self.connected.borrow_mut();
        match connected.get(peer).map(Weak::upgrade) {
            Some(Some(shadow)) => Some(shadow),
            Some(None) => {
                connected.remove(peer);
                None
            }
            None => None,
        }
    }

    fn on_connection_complete(&mut self, handle: u16, peer: BdAddr, peer_addr_type: u8) {
        let shadow = if let Some(shadow) = self.live_connected(&peer) {
            shadow
        } else if let Some(shadow) = self.connecting.remove(&peer) {
            // Our own connect completed: the handle now anchors it
            shadow.borrow_mut().set_expires(None);
            debug!("Shadow for {} confirmed with handle {:#06x}", peer, handle);
            shadow
        } else {
            let mut socket = self.new_shadow(peer, peer_addr_type, None);
            if let Err(e) = socket.connect(&mut self.connector) {
                debug!(
                    "Shadow connect to {} for handle {:#06x} failed: {}",
                    peer, handle, e
                );
                return;
            }
            debug!(
                "Opened shadow for unexpected connection {} handle {:#06x}",
                peer, handle
            );
            Rc::new(RefCell::new(socket))
        };

        let is_connected = shadow.borrow().is_connected();
        if !is_connected {
            debug!(
                "Shadow for {} is closed, ignoring handle {:#06x}",
                peer, handle
            );
            return;
        }

        self.connected.borrow_mut().insert(peer, Rc::downgrade(&shadow));
        let stale = self.handles.insert(handle_slot(handle), shadow);
        drop(stale);
    }

    fn on_disconnection_complete(&mut self, handle: u16) {
        match self.handles.remove(&handle_slot(handle)) {
            Some(shadow) => {
                let peer = shadow.borrow().peer().addr;
                debug!("Handle {:#06x} to {} disconnected", handle, peer);
                drop(shadow);
            }
            None => trace!("Disconnection of untracked handle {:#06x}", handle),
        }
    }

    fn on_create_connection(
        &mut self,
        peer: BdAddr,
        peer_addr_type: u8,
        params: &ConnectionParameters,
        now: Instant,
    ) -> Disposition {
        self.overrides.apply(self.dev_id, params);
        let expires = now + self.connect_timeout;

        if let Some(shadow) = self.live_connected(&peer) {
            // Stays confirmed: the existing handle still anchors it
            let result = shadow.borrow_mut().reconnect(&mut self.connector);
            return match result {
                Ok(()) => {
                    debug!("Refreshed confirmed shadow for {}", peer);
                    Disposition::Suppress
                }
                Err(e) => {
                    warn!("Refreshing shadow for {} failed: {}", peer, e);
                    Disposition::Forward
                }
            };
        }

        if let Some(shadow) = self.connecting.get(&peer).cloned() {
            let result = {
                let mut shadow = shadow.borrow_mut();
                shadow.set_expires(Some(expires));
                shadow.reconnect(&mut self.connector)
            };
            return match result {
                Ok(()) => {
                    debug!("Refreshed speculative shadow for {}", peer);
                    Disposition::Suppress
                }
                Err(e) => {
                    warn!("Refreshing shadow for {} failed: {}", peer, e);
                    self.connecting.remove(&peer);
                    Disposition::Forward
                }
            };
        }

        let mut socket = self.new_shadow(peer, peer_addr_type, Some(expires));
        match socket.connect(&mut self.connector) {
            Ok(()) => {
                debug!("Opened speculative shadow for {}", peer);
                self.connecting.insert(peer, Rc::new(RefCell::new(socket)));
                Disposition::Suppress
            }
            Err(e) => {
                debug!(
                    "Shadow connect to {} failed, forwarding command: {}",
                    peer, e
                );
                Disposition::Forward
            }
        }
    }
}

impl<C: L2capConnector> Drop for ShadowManager<C> {
    fn drop(&mut self) {
        self.clear();
    }
}
