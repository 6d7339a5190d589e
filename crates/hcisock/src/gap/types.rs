use crate::gap::constants::*;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    Public,
    Random,
    PublicIdentity,
    RandomIdentity,
}

impl AddressType {
    /// Kernel `bdaddr_type` for an LE socket address targeting this peer
    pub fn le_bdaddr_type(self) -> u8 {
        match self {
            AddressType::Public | AddressType::PublicIdentity => BDADDR_LE_PUBLIC,
            AddressType::Random | AddressType::RandomIdentity => BDADDR_LE_RANDOM,
        }
    }
}

impl From<u8> for AddressType {
    fn from(value: u8) -> Self {
        match value {
            PUBLIC_DEVICE_ADDRESS => AddressType::Public,
            RANDOM_DEVICE_ADDRESS => AddressType::Random,
            PUBLIC_IDENTITY_ADDRESS => AddressType::PublicIdentity,
            RANDOM_IDENTITY_ADDRESS => AddressType::RandomIdentity,
            _ => AddressType::Public,
        }
    }
}

/// Normalizes the local address type read from the kernel.
///
/// The result is used as the kernel `bdaddr_type` of the local L2CAP
/// endpoint. Some controllers report type 3 for the local device; it is
/// bound as `BDADDR_LE_PUBLIC`.
pub fn normalize_local_address_type(value: u8) -> u8 {
    if value == LOCAL_ADDRESS_TYPE_ANOMALY {
        BDADDR_LE_PUBLIC
    } else {
        value
    }
}

/// Bluetooth device address, stored in wire (little-endian) byte order.
///
/// Ordering is plain lexicographic over the stored bytes so it can key
/// ordered maps.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BdAddr {
    pub bytes: [u8; 6],
}

impl BdAddr {
    pub const ANY: BdAddr = BdAddr { bytes: [0; 6] };

    pub fn new(bytes: [u8; 6]) -> Self {
        Self { bytes }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.bytes[5],
            self.bytes[4],
            self.bytes[3],
            self.bytes[2],
            self.bytes[1],
            self.bytes[0]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_bdaddr_display_is_msb_first() {
        let addr = BdAddr::new([0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);
        assert_eq!(addr.to_string(), "01:02:03:04:05:06");
    }

    #[test]
    fn test_bdaddr_ordering_is_total() {
        // Mixed byte relations at different positions must still order consistently.
        let a = BdAddr::new([0x01, 0x09, 0x00, 0x00, 0x00, 0x00]);
        let b = BdAddr::new([0x02, 0x01, 0x00, 0x00, 0x00, 0x00]);
        assert!(a < b);
        assert!(!(b < a));

        let mut map = BTreeMap::new();
        map.insert(a, "a");
        map.insert(b, "b");
        assert_eq!(map.get(&a), Some(&"a"));
        assert_eq!(map.get(&b), Some(&"b"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_address_type_mapping() {
        assert_eq!(AddressType::from(0).le_bdaddr_type(), BDADDR_LE_PUBLIC);
        assert_eq!(AddressType::from(1).le_bdaddr_type(), BDADDR_LE_RANDOM);
        assert_eq!(AddressType::from(2).le_bdaddr_type(), BDADDR_LE_PUBLIC);
        assert_eq!(AddressType::from(3).le_bdaddr_type(), BDADDR_LE_RANDOM);

        assert_eq!(normalize_local_address_type(3), BDADDR_LE_PUBLIC);
        assert_eq!(normalize_local_address_type(0), 0);
        assert_eq!(normalize_local_address_type(1), 1);
    }
}
