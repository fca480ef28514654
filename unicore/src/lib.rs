//! Data model and build-time packaging for Unilib artifacts.
//!
//! An artifact bundles compiled native code, the portable IR it was generated
//! from, and an export manifest describing every exported function together
//! with its CPU-feature variants. This crate owns the pure data side: feature
//! sets, signatures, manifests, the packager, and the persisted container
//! codec. The runtime half (detection, loading, dispatch, specialization)
//! lives in `uniload`.

pub mod artifact;
pub mod container;
pub mod error;
pub mod features;
pub mod magic;
pub mod manifest;
pub mod signature;
