//! sdbi-client - HTTP client for the SDBI portal endpoints.
//!
//! Provides [`PortalClient`], a typed client for the portal's tracking,
//! dataset, and Google Forms endpoints. It implements the `FormSource` and
//! `TrackingBackend` traits from `sdbi-core`, so it plugs directly into the
//! exit-intent engine and the usage tracker.

mod client;

pub use client::{PackageResult, PortalClient, TrackRoute, TrackingSummary};
