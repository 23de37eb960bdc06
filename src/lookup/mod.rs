//! IP lookup activities.
//!
//! # Data Flow
//! ```text
//! GetIp                        → ip_url (plain-text IP)
//! GetLocationInfo(ip)          → geo_url/<ip> (IpInfo JSON) → "City, Region, Country"
//! GetInternetServiceProvider(ip) → geo_url/<ip> (IpInfo JSON) → isp
//! ```
//!
//! # Design Decisions
//! - Network, status and decode failures are transient
//! - A rejected query or an unusable IP input is fatal
//! - Upstream calls are bounded by the attempt's start-to-close deadline

pub mod activities;
pub mod client;
pub mod types;

pub use activities::{GetInternetServiceProvider, GetIp, GetLocationInfo, Lookup};
pub use client::{HttpGetter, HttpResponse, LookupError, ReqwestGetter};
pub use types::IpInfo;
