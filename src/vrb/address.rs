//! Link-layer addressing for forwarding entries.

use super::VrbError;

/// Maximum link-layer address length (IEEE 802.15.4 extended address).
pub const MAX_ADDRESS_LEN: usize = 8;

/// A link-layer address of 1 to [`MAX_ADDRESS_LEN`] bytes.
///
/// IEEE 802.15.4 uses 2-byte short and 8-byte extended addresses; other
/// link layers (BLE, Ethernet-like test links) fit in between. The length
/// is part of the address: `00:01` and `00:01:00:00` are different.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkAddress {
    bytes: [u8; MAX_ADDRESS_LEN],
    len: u8,
}

impl LinkAddress {
    /// Create an address from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`VrbError::InvalidAddress`] if `bytes` is empty or longer
    /// than [`MAX_ADDRESS_LEN`].
    pub fn new(bytes: &[u8]) -> Result<Self, VrbError> {
        if bytes.is_empty() || bytes.len() > MAX_ADDRESS_LEN {
            return Err(VrbError::InvalidAddress(bytes.len()));
        }
        let mut buf = [0u8; MAX_ADDRESS_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            bytes: buf,
            len: bytes.len() as u8,
        })
    }

    /// 2-byte IEEE 802.15.4 short address.
    pub const fn short(addr: [u8; 2]) -> Self {
        Self {
            bytes: [addr[0], addr[1], 0, 0, 0, 0, 0, 0],
            len: 2,
        }
    }

    /// 8-byte IEEE 802.15.4 extended address.
    pub const fn extended(addr: [u8; 8]) -> Self {
        Self {
            bytes: addr,
            len: 8,
        }
    }

    /// The significant bytes of the address.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Address length in bytes (never 0).
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.len as usize
    }
}

impl std::fmt::Display for LinkAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, b) in self.as_bytes().iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for LinkAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LinkAddress({})", self)
    }
}

impl TryFrom<&[u8]> for LinkAddress {
    type Error = VrbError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::new(bytes)
    }
}

/// Opaque handle of a network interface.
///
/// Only ever compared for equality; the numeric value is whatever the
/// network stack uses to identify its interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceId(pub u16);

impl std::fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "if{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_address() {
        assert_eq!(LinkAddress::new(&[]), Err(VrbError::InvalidAddress(0)));
    }

    #[test]
    fn test_rejects_oversized_address() {
        assert_eq!(
            LinkAddress::new(&[0u8; 9]),
            Err(VrbError::InvalidAddress(9))
        );
    }

    #[test]
    fn test_length_is_significant() {
        let a = LinkAddress::new(&[0, 1]).unwrap();
        let b = LinkAddress::new(&[0, 1, 0, 0]).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, LinkAddress::short([0, 1]));
    }

    #[test]
    fn test_display() {
        let addr = LinkAddress::new(&[0xde, 0xad, 0x01]).unwrap();
        assert_eq!(format!("{}", addr), "de:ad:01");
        assert_eq!(format!("{}", InterfaceId(7)), "if7");
    }
}
