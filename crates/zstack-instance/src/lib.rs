//! VM instance client and data models for ZStack.
//!
//! Queries, inspects, starts and stops virtual machine instances through an
//! authenticated [`zstack_core::Session`].

#![deny(missing_docs)]

pub mod client;
pub mod models;

pub use client::{InstanceClient, VM_INSTANCES_PATH};
pub use models::{
    InstanceAction, InstanceResponse, QueryInstanceResponse, VmInstanceInventory, VmNic, Volume,
};

/// Convenient result alias that reuses the shared ZStack error type.
pub type Result<T> = zstack_core::Result<T>;
