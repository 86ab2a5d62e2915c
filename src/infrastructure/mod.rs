//! Infrastructure Import Module
//!
//! Turns live infrastructure into IaC configuration and state. A provider
//! (e.g., the inventory provider) exposes services; every service runs the
//! same lifecycle:
//!
//! 1. `init_resources` enumerates resources
//! 2. raw `--filter` expressions are parsed into filters
//! 3. an initial cleanup drops filtered-out resources
//! 4. resources are refreshed when `--connect` is set
//! 5. a post-refresh cleanup applies the filters again
//! 6. ignore keys are looked up once per distinct resource type
//! 7. the service's post conversion hook runs
//!
//! The surviving resources are written per service and region.
//!
//! # Usage
//!
//! ```bash
//! # Import two regions from an inventory export
//! iacgen import inventory --inventory ./inventory.yaml --regions us-east-1,eu-west-1
//!
//! # Only instances i-1 and i-2, leaving out read-only attributes
//! iacgen import inventory --regions us-east-1 -f aws_instance=i-1:i-2 \
//!     --schema-file ./aws-schema.json
//! ```

pub mod attribute;
pub mod error;
pub mod filter;
pub mod ignore_keys;
pub mod lifecycle;
pub mod options;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod resource;
pub mod service;
pub mod workflow;
pub mod writer;
