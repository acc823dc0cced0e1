//! The capability namespace.
//!
//! A capability is one bit of a 128-bit mask. Bit assignments are permanent:
//! once published, a bit never changes meaning, so masks stored by providers
//! or issued in attestations stay valid across releases.
//!
//! | bits    | namespace  |
//! |---------|------------|
//! | 0-7     | core (bit 7 is the admin override) |
//! | 8-15    | financial  |
//! | 16-23   | document   |
//! | 24-31   | governance |
//! | 32-127  | reserved   |
//!
//! The admin bit satisfies every check, including checks for reserved bits
//! that have no meaning yet, so an admin grant issued today also covers
//! capabilities published later.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Number of bits in the standard (published) namespace ranges.
pub const STANDARD_BITS: u32 = 32;

/// Bit index of the admin override.
pub const ADMIN_BIT: u32 = 7;

/// A capability bitmask.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Capabilities(pub u128);

impl Capabilities {
    /// The empty mask.
    pub const NONE: Self = Self(0);

    // Core
    pub const VIEW: Self = Self::bit(0);
    pub const CLAIM: Self = Self::bit(1);
    pub const TRANSFER: Self = Self::bit(2);
    pub const UPDATE: Self = Self::bit(3);
    pub const DELEGATE: Self = Self::bit(4);
    pub const REVOKE: Self = Self::bit(5);
    pub const ADMIN: Self = Self::bit(ADMIN_BIT);

    // Financial
    pub const REQUEST_PAYMENT: Self = Self::bit(8);
    pub const APPROVE_PAYMENT: Self = Self::bit(9);
    pub const EXECUTE_PAYMENT: Self = Self::bit(10);
    pub const CANCEL_PAYMENT: Self = Self::bit(11);
    pub const WITHDRAW: Self = Self::bit(12);

    // Document
    pub const SIGN: Self = Self::bit(16);
    pub const WITNESS: Self = Self::bit(17);
    pub const NOTARIZE: Self = Self::bit(18);
    pub const VERIFY: Self = Self::bit(19);
    pub const AMEND: Self = Self::bit(20);

    // Governance
    pub const PROPOSE: Self = Self::bit(24);
    pub const VOTE: Self = Self::bit(25);
    pub const EXECUTE: Self = Self::bit(26);
    pub const VETO: Self = Self::bit(27);

    // Role templates. Conveniences only; nothing enforces that a principal
    // holds exactly one of these.
    pub const VIEWER: Self = Self::VIEW;
    pub const PARTICIPANT: Self = Self(
        Self::VIEWER.0 | Self::CLAIM.0 | Self::TRANSFER.0 | Self::REQUEST_PAYMENT.0,
    );
    pub const MANAGER: Self = Self(
        Self::PARTICIPANT.0
            | Self::UPDATE.0
            | Self::DELEGATE.0
            | Self::REVOKE.0
            | Self::APPROVE_PAYMENT.0
            | Self::CANCEL_PAYMENT.0
            | Self::SIGN.0
            | Self::AMEND.0,
    );
    pub const ADMINISTRATOR: Self = Self::ADMIN;

    /// The mask with only bit `index` set.
    ///
    /// Panics if `index >= 128`, in every build profile. In const context
    /// that is a compile error.
    pub const fn bit(index: u32) -> Self {
        assert!(index < u128::BITS, "capability bit index out of range");
        Self(1u128 << index)
    }

    /// Create from a raw mask.
    pub const fn from_bits(bits: u128) -> Self {
        Self(bits)
    }

    /// Get the raw mask.
    pub const fn bits(self) -> u128 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw containment: every bit of `other` is set in `self`.
    ///
    /// Unlike [`has_capability`], this ignores the admin override.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Number of set bits.
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Names of the published capabilities set in this mask.
    pub fn names(self) -> Vec<&'static str> {
        NAMED
            .iter()
            .filter(|(_, cap)| self.contains(*cap))
            .map(|(name, _)| *name)
            .collect()
    }

    /// Look up a published capability by name.
    pub fn from_name(name: &str) -> Option<Self> {
        NAMED
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, cap)| *cap)
    }
}

const NAMED: &[(&str, Capabilities)] = &[
    ("VIEW", Capabilities::VIEW),
    ("CLAIM", Capabilities::CLAIM),
    ("TRANSFER", Capabilities::TRANSFER),
    ("UPDATE", Capabilities::UPDATE),
    ("DELEGATE", Capabilities::DELEGATE),
    ("REVOKE", Capabilities::REVOKE),
    ("ADMIN", Capabilities::ADMIN),
    ("REQUEST_PAYMENT", Capabilities::REQUEST_PAYMENT),
    ("APPROVE_PAYMENT", Capabilities::APPROVE_PAYMENT),
    ("EXECUTE_PAYMENT", Capabilities::EXECUTE_PAYMENT),
    ("CANCEL_PAYMENT", Capabilities::CANCEL_PAYMENT),
    ("WITHDRAW", Capabilities::WITHDRAW),
    ("SIGN", Capabilities::SIGN),
    ("WITNESS", Capabilities::WITNESS),
    ("NOTARIZE", Capabilities::NOTARIZE),
    ("VERIFY", Capabilities::VERIFY),
    ("AMEND", Capabilities::AMEND),
    ("PROPOSE", Capabilities::PROPOSE),
    ("VOTE", Capabilities::VOTE),
    ("EXECUTE", Capabilities::EXECUTE),
    ("VETO", Capabilities::VETO),
];

impl BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for Capabilities {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Capabilities {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capabilities({})", self)
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        let named = NAMED.iter().fold(0u128, |acc, (_, cap)| acc | cap.0);
        let mut parts: Vec<String> = self.names().into_iter().map(String::from).collect();
        let mut unnamed = self.0 & !named;
        while unnamed != 0 {
            let index = unnamed.trailing_zeros();
            parts.push(format!("bit{}", index));
            unnamed &= unnamed - 1;
        }
        f.write_str(&parts.join("|"))
    }
}

impl FromIterator<Capabilities> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capabilities>>(iter: I) -> Self {
        compose(iter)
    }
}

/// Whether `granted` satisfies `required`.
///
/// True if `granted` carries the admin bit, otherwise true iff every bit of
/// `required` is present in `granted`.
pub const fn has_capability(granted: Capabilities, required: Capabilities) -> bool {
    is_admin(granted) || granted.contains(required)
}

/// OR-fold a list of capabilities into a single mask.
pub fn compose<I: IntoIterator<Item = Capabilities>>(capabilities: I) -> Capabilities {
    capabilities
        .into_iter()
        .fold(Capabilities::NONE, Capabilities::union)
}

/// Set the bits of `capability` in `current`.
pub const fn add(current: Capabilities, capability: Capabilities) -> Capabilities {
    Capabilities(current.0 | capability.0)
}

/// Clear the bits of `capability` from `current`.
pub const fn remove(current: Capabilities, capability: Capabilities) -> Capabilities {
    Capabilities(current.0 & !capability.0)
}

pub const fn is_admin(mask: Capabilities) -> bool {
    mask.0 & Capabilities::ADMIN.0 != 0
}

/// Exactly one bit set, and that bit lies in the published ranges (0-31).
pub const fn is_single_bit(mask: Capabilities) -> bool {
    mask.0.is_power_of_two() && mask.0.trailing_zeros() < STANDARD_BITS
}

/// More than one bit set.
pub const fn is_composite(mask: Capabilities) -> bool {
    mask.0.count_ones() > 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn mask() -> impl Strategy<Value = Capabilities> {
        any::<u128>().prop_map(Capabilities)
    }

    proptest! {
        #[test]
        fn test_admin_satisfies_anything(granted in mask(), required in mask()) {
            prop_assert!(has_capability(granted | Capabilities::ADMIN, required));
        }

        #[test]
        fn test_compose_matches_or(a in mask(), b in mask(), c in mask()) {
            prop_assert_eq!(compose([a, b, c]), a | b | c);
            prop_assert_eq!(compose([c, a, b]), compose([a, b, c]));
            prop_assert_eq!(compose([a, a]), a);
        }

        #[test]
        fn test_add_then_remove(current in mask(), index in 0u32..128) {
            let bit = Capabilities::bit(index);
            prop_assert!(add(current, bit).contains(bit));
            prop_assert!(!remove(current, bit).contains(bit));
            prop_assert_eq!(remove(add(current, bit), bit), remove(current, bit));
        }

        #[test]
        fn test_non_admin_requires_every_bit(granted in mask(), required in mask()) {
            let granted = remove(granted, Capabilities::ADMIN);
            prop_assert_eq!(has_capability(granted, required), granted.contains(required));
        }
    }

    #[test]
    fn test_highest_bit() {
        assert_eq!(Capabilities::bit(127).bits(), 1u128 << 127);
    }

    #[test]
    #[should_panic(expected = "capability bit index out of range")]
    fn test_bit_out_of_range_panics() {
        let index = std::hint::black_box(128);
        let _ = Capabilities::bit(index);
    }

    #[test]
    fn test_role_templates() {
        assert!(has_capability(Capabilities::PARTICIPANT, Capabilities::CLAIM));
        assert!(has_capability(Capabilities::PARTICIPANT, Capabilities::VIEWER));
        assert!(!has_capability(Capabilities::PARTICIPANT, Capabilities::UPDATE));
        assert!(has_capability(Capabilities::MANAGER, Capabilities::PARTICIPANT));
        assert!(is_admin(Capabilities::ADMINISTRATOR));
    }

    #[test]
    fn test_admin_covers_reserved_bits() {
        assert!(has_capability(Capabilities::ADMIN, Capabilities::bit(100)));
    }

    #[test]
    fn test_single_and_composite() {
        assert!(is_single_bit(Capabilities::CLAIM));
        assert!(is_single_bit(Capabilities::ADMIN));
        assert!(!is_single_bit(Capabilities::NONE));
        assert!(!is_single_bit(Capabilities::bit(40)));
        assert!(!is_single_bit(Capabilities::PARTICIPANT));

        assert!(is_composite(Capabilities::PARTICIPANT));
        assert!(!is_composite(Capabilities::VIEW));
        assert!(!is_composite(Capabilities::NONE));
    }

    #[test]
    fn test_display_and_names() {
        assert_eq!(Capabilities::NONE.to_string(), "NONE");
        assert_eq!((Capabilities::VIEW | Capabilities::CLAIM).to_string(), "VIEW|CLAIM");
        assert_eq!((Capabilities::SIGN | Capabilities::bit(40)).to_string(), "SIGN|bit40");
        assert_eq!(Capabilities::from_name("claim"), Some(Capabilities::CLAIM));
        assert_eq!(Capabilities::from_name("nope"), None);
    }
}
