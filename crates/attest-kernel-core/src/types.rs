//! Strong identifier types for the kernel.
//!
//! All identifiers are 32-byte newtypes so a subject id can never be passed
//! where a module id or a principal is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $debug:literal, $domain:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// The all-zero id (sentinel, never a valid registration).
            pub const ZERO: Self = Self([0u8; 32]);

            /// Create from raw bytes.
            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Derive an id from a human-readable label.
            pub fn derive(label: &str) -> Self {
                let mut hasher = blake3::Hasher::new();
                hasher.update($domain);
                hasher.update(label.as_bytes());
                Self(*hasher.finalize().as_bytes())
            }

            /// Get the raw bytes.
            pub const fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; 32]
            }

            /// Convert to hex string.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from hex string.
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let bytes = hex::decode(s)?;
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| hex::FromHexError::InvalidStringLength)?;
                Ok(Self(arr))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($debug, "({})"), &self.to_hex()[..16])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", &self.to_hex()[..16])
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = std::array::TryFromSliceError;

            fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
                let arr: [u8; 32] = slice.try_into()?;
                Ok(Self(arr))
            }
        }
    };
}

define_id!(
    /// An identity on the execution substrate.
    ///
    /// Used both for principals (callers, owners, executors, governance
    /// actors) and for module references (where a provider or resolver's code
    /// lives). A principal's address is its Ed25519 public key.
    Address,
    "Address",
    b"attest-address-v0:"
);

define_id!(
    /// Identifier of a registered subject (document or record).
    SubjectId,
    "SubjectId",
    b"attest-subject-v0:"
);

define_id!(
    /// Identifier of a module registration in an integrity registry.
    ///
    /// Distinct from the module's [`Address`]: the id names the registration,
    /// the address names the code it points at.
    ModuleId,
    "ModuleId",
    b"attest-module-v0:"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_is_domain_separated() {
        let label = "compliance";
        assert_ne!(ModuleId::derive(label).0, SubjectId::derive(label).0);
        assert_ne!(ModuleId::derive(label).0, Address::derive(label).0);
        assert_eq!(ModuleId::derive(label), ModuleId::derive(label));
    }

    #[test]
    fn test_hex_roundtrip_and_display() {
        let id = SubjectId::from_bytes([0xab; 32]);
        assert_eq!(SubjectId::from_hex(&id.to_hex()).unwrap(), id);
        assert_eq!(format!("{}", id), "abababababababab");
        assert!(format!("{:?}", id).starts_with("SubjectId("));
    }

    #[test]
    fn test_zero_sentinel() {
        assert!(Address::ZERO.is_zero());
        assert!(!Address::derive("alice").is_zero());
        assert!(ModuleId::from_hex("abcd").is_err());
    }
}
