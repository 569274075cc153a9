//! # Hoist Core Library
//!
//! This crate contains the core logic of the `hoist` command bootstrapper. `hoist` maps a command
//! name to a package published on an npm-compatible registry, keeps that package in a local
//! store at the right version, and runs the package's entry point.
//!
//! Packages live in a flattened store (`<store>/.store/<name>@<version>/node_modules/<name>`) so
//! several versions of the same package can sit side by side. During development a local
//! override path can replace the store; the entry point then runs in an isolated child process
//! that receives a sanitized JSON copy of the command arguments.
//!
//! ## Modules Overview
//! - [`registry`] – Querying the registry and picking versions by semver precedence
//! - [`package`] – Package descriptors and the store-backed [`PackageCache`]
//! - [`installer`] – The install seam and the tarball installer
//! - [`manifest`] – Locating a package's entry point from its manifest
//! - [`invocation`] – Command arguments and their sanitized, serializable form
//! - [`commands`] – The command-name to package table (`commands.toml`)
//! - [`dispatch`] – Running a command end to end
//! - [`config`] – Configuration built once from flags and the environment
//! - [`global`] – User home, CLI home and the store layout
//! - [`util`] – Name validation and path helpers

pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod global;
pub mod installer;
pub mod invocation;
pub mod manifest;
pub mod package;
pub mod registry;
pub mod util;

pub use error::{Error, Result};
pub use package::{PackageCache, PackageDescriptor, RequestedVersion};
pub use dispatch::{Dispatcher, Launcher, Outcome};
pub use registry::{RegistryClient, VersionSource};
