//! HCI device enumeration
//!
//! Thin wrappers over the `HCIGETDEVLIST` and `HCIGETDEVINFO` ioctls.

use crate::error::HciError;
use crate::gap::BdAddr;
use crate::hci::constants::*;
use bitflags::bitflags;
use std::os::unix::io::RawFd;

bitflags! {
    /// Device state flags from `hci_dev_info.flags`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DeviceFlags: u32 {
        const UP = 1 << HCI_UP;
        const INIT = 1 << HCI_INIT;
        const RUNNING = 1 << HCI_RUNNING;
        const PSCAN = 1 << HCI_PSCAN;
        const ISCAN = 1 << HCI_ISCAN;
        const AUTH = 1 << HCI_AUTH;
        const ENCRYPT = 1 << HCI_ENCRYPT;
        const INQUIRY = 1 << HCI_INQUIRY;
        const RAW = 1 << HCI_RAW;
    }
}

/// One entry of the kernel's HCI device list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceEntry {
    pub dev_id: u16,
    pub flags: DeviceFlags,
}

impl DeviceEntry {
    pub fn is_up(&self) -> bool {
        self.flags.contains(DeviceFlags::UP)
    }
}

/// Identity of a local HCI device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub address: BdAddr,
    /// Raw `type` byte from the kernel
    pub dev_type: u8,
    pub flags: DeviceFlags,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
struct HciDevReq {
    dev_id: u16,
    dev_opt: u32,
}

#[repr(C)]
struct HciDevListReq {
    dev_num: u16,
    dev_req: [HciDevReq; HCI_MAX_DEV],
}

#[repr(C)]
#[derive(Default)]
struct HciDevStats {
    err_rx: u32,
    err_tx: u32,
    cmd_tx: u32,
    evt_rx: u32,
    acl_tx: u32,
    acl_rx: u32,
    sco_tx: u32,
    sco_rx: u32,
    byte_rx: u32,
    byte_tx: u32,
}

#[repr(C)]
#[derive(Default)]
struct HciDevInfo {
    dev_id: u16,
    name: [u8; 8],
    bdaddr: [u8; 6],
    flags: u32,
    dev_type: u8,
    features: [u8; 8],
    pkt_type: u32,
    link_policy: u32,
    link_mode: u32,
    acl_mtu: u16,
    acl_pkts: u16,
    sco_mtu: u16,
    sco_pkts: u16,
    stat: HciDevStats,
}

/// List the HCI devices known to the kernel
pub fn device_list(fd: RawFd) -> Result<Vec<DeviceEntry>, HciError> {
    let mut request = HciDevListReq {
        dev_num: HCI_MAX_DEV as u16,
        dev_req: [HciDevReq::default(); HCI_MAX_DEV],
    };

    let result = unsafe { libc::ioctl(fd, HCIGETDEVLIST as _, &mut request as *mut HciDevListReq) };
    if result < 0 {
        return Err(HciError::IoctlError(std::io::Error::last_os_error()));
    }

    let count = (request.dev_num as usize).min(HCI_MAX_DEV);
    Ok(request.dev_req[..count]
        .iter()
        .map(|req| DeviceEntry {
            dev_id: req.dev_id,
            flags: DeviceFlags::from_bits_retain(req.dev_opt),
        })
        .collect())
}

/// Read the address, type and flags of one device
pub fn device_info(fd: RawFd, dev_id: u16) -> Result<DeviceInfo, HciError> {
    let mut info = HciDevInfo {
        dev_id,
        ..HciDevInfo::default()
    };

    let result = unsafe { libc::ioctl(fd, HCIGETDEVINFO as _, &mut info as *mut HciDevInfo) };
    if result < 0 {
        return Err(HciError::IoctlError(std::io::Error::last_os_error()));
    }

    Ok(DeviceInfo {
        address: BdAddr::new(info.bdaddr),
        dev_type: info.dev_type,
        flags: DeviceFlags::from_bits_retain(info.flags),
    })
}

/// Pick the first device whose up state matches `want_up`, or device 0
pub fn select_device(devices: &[DeviceEntry], want_up: bool) -> u16 {
    devices
        .iter()
        .find(|device| device.is_up() == want_up)
        .map(|device| device.dev_id)
        .unwrap_or(0)
}
