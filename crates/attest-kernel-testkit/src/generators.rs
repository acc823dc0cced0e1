//! Proptest generators for property-based testing.

use proptest::prelude::*;

use attest_kernel_core::capability::STANDARD_BITS;
use attest_kernel_core::{Address, Blake3Hash, Capabilities, Keypair, ModuleId, SubjectId};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a non-zero address.
pub fn address() -> impl Strategy<Value = Address> {
    any::<[u8; 32]>()
        .prop_filter("zero address", |b| b.iter().any(|&x| x != 0))
        .prop_map(Address::from_bytes)
}

/// Generate a random SubjectId.
pub fn subject_id() -> impl Strategy<Value = SubjectId> {
    any::<[u8; 32]>().prop_map(SubjectId::from_bytes)
}

/// Generate a random ModuleId.
pub fn module_id() -> impl Strategy<Value = ModuleId> {
    any::<[u8; 32]>().prop_map(ModuleId::from_bytes)
}

/// Generate a random Blake3Hash.
pub fn blake3_hash() -> impl Strategy<Value = Blake3Hash> {
    any::<[u8; 32]>().prop_map(Blake3Hash)
}

/// Generate a single standard capability bit.
pub fn capability_bit() -> impl Strategy<Value = Capabilities> {
    (0..STANDARD_BITS).prop_map(Capabilities::bit)
}

/// Generate any mask over the full width, reserved bits included.
pub fn capabilities() -> impl Strategy<Value = Capabilities> {
    any::<u128>().prop_map(Capabilities::from_bits)
}

/// Generate a mask that never carries the admin bit.
pub fn non_admin_capabilities() -> impl Strategy<Value = Capabilities> {
    capabilities().prop_map(|c| attest_kernel_core::capability::remove(c, Capabilities::ADMIN))
}

/// Generate a justification that survives trimming.
pub fn justification() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9 ]{0,63}".prop_map(String::from)
}

/// Generate a module label.
pub fn label() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,23}".prop_map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_kernel_core::capability::{has_capability, is_single_bit};

    proptest! {
        #[test]
        fn generated_bits_are_single(bit in capability_bit()) {
            prop_assert!(is_single_bit(bit));
        }

        #[test]
        fn non_admin_masks_only_grant_subsets(granted in non_admin_capabilities(), required in capabilities()) {
            prop_assume!(!required.is_empty());
            prop_assert_eq!(has_capability(granted, required), granted.contains(required));
        }

        #[test]
        fn addresses_are_never_zero(a in address()) {
            prop_assert!(!a.is_zero());
        }
    }
}
