// HCI address types, as carried in LE connection events and commands
pub const PUBLIC_DEVICE_ADDRESS: u8 = 0x00;
pub const RANDOM_DEVICE_ADDRESS: u8 = 0x01;
pub const PUBLIC_IDENTITY_ADDRESS: u8 = 0x02;
pub const RANDOM_IDENTITY_ADDRESS: u8 = 0x03;

// Kernel socket address types (bdaddr_type in sockaddr_l2)
pub const BDADDR_BREDR: u8 = 0x00;
pub const BDADDR_LE_PUBLIC: u8 = 0x01;
pub const BDADDR_LE_RANDOM: u8 = 0x02;

// Device type reported by some controllers in hci_dev_info; bound as BDADDR_LE_PUBLIC
pub const LOCAL_ADDRESS_TYPE_ANOMALY: u8 = 0x03;
