//! # Attest Kernel Testkit
//!
//! Testing utilities for the Attest Kernel.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: A kernel on a manual clock with in-memory module hosts
//! - **Mocks**: Providers, resolvers and executors that record calls and fail on demand
//! - **Generators**: Proptest strategies for identities and capability masks
//!
//! The `tests/` directory holds the end-to-end scenarios.
//!
//! ## Test Fixtures
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use attest_kernel_testkit::fixtures::TestFixture;
//! use attest_kernel_testkit::mocks::RecordingResolver;
//! use attest_kernel::core::Address;
//!
//! let fixture = TestFixture::new();
//! let resolver = fixture
//!     .install_resolver("notify", Arc::new(RecordingResolver::new()))
//!     .unwrap();
//! let subject = fixture
//!     .register_with_primary(Address::derive("alice"), "doc", resolver)
//!     .unwrap();
//! assert!(fixture.kernel.exists(&subject));
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use attest_kernel_testkit::generators::{capabilities, capability_bit};
//!
//! proptest! {
//!     #[test]
//!     fn bit_is_contained(mask in capabilities(), bit in capability_bit()) {
//!         prop_assert!(mask.union(bit).contains(bit));
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use fixtures::{fresh_subject_id, new_subject, principals, Hosts, TestFixture};
pub use mocks::{ExecutorModule, FixedProvider, HookCall, ReentrantResolver, RecordingResolver};
