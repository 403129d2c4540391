//! HTTP wire types.

pub mod v1;
