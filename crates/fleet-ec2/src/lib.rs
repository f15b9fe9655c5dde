//! fleet-ec2 — the cloud provider surface for the elastic agent fleet.
//!
//! The pool never talks to AWS directly; everything goes through the
//! [`Ec2Api`] trait so the provisioning and reconciliation logic can be
//! exercised against the in-memory [`FakeEc2`] in tests.
//!
//! Durable fleet state lives entirely in instance tags: the `tags` module
//! owns the encoding written at provisioning time and the decoding used to
//! rebuild local state after a process restart.

pub mod api;
pub mod error;
pub mod fake;
pub mod tags;

pub use api::{
    CloudInstance, DescribeFilter, Ec2Api, InstanceStateName, RunInstancesSpec, Tag,
};
pub use error::{Ec2Error, Ec2Result};
pub use fake::FakeEc2;
