//! The three lookup activities of the address workflow.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::activity::{Activity, ActivityContext, ActivityError};
use crate::config::LookupConfig;
use crate::lookup::client::{HttpGetter, HttpResponse, LookupError};
use crate::lookup::types::IpInfo;
use crate::resilience::timeouts::with_deadline;

/// Upstream endpoints plus the transport used to reach them.
#[derive(Clone)]
pub struct Lookup {
    getter: Arc<dyn HttpGetter>,
    ip_url: String,
    geo_url: String,
}

impl Lookup {
    pub fn new(getter: Arc<dyn HttpGetter>, config: &LookupConfig) -> Self {
        Self {
            getter,
            ip_url: config.ip_url.clone(),
            geo_url: config.geo_url.clone(),
        }
    }

    /// Geolocation URL for `ip`.
    pub fn geo_url_for(&self, ip: &str) -> String {
        format!("{}/{}", self.geo_url.trim_end_matches('/'), ip)
    }

    async fn fetch(&self, ctx: &ActivityContext, url: &str) -> Result<HttpResponse, LookupError> {
        let response = with_deadline(ctx.remaining(), self.getter.get(url)).await??;
        if !response.is_success() {
            return Err(LookupError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok(response)
    }

    /// Caller's public IP as reported by the IP echo service.
    pub async fn public_ip(&self, ctx: &ActivityContext) -> Result<IpAddr, LookupError> {
        let response = self.fetch(ctx, &self.ip_url).await?;
        let text = response.body.trim();
        text.parse::<IpAddr>().map_err(|_| LookupError::Decode {
            url: self.ip_url.clone(),
            reason: format!("expected an IP address, got {text:?}"),
        })
    }

    /// Geolocation record for `ip`. A "fail" status is a permanent rejection.
    pub async fn ip_info(&self, ctx: &ActivityContext, ip: &str) -> Result<IpInfo, LookupError> {
        let ip = parse_ip(ip)?;
        let url = self.geo_url_for(&ip.to_string());
        let response = self.fetch(ctx, &url).await?;

        let info: IpInfo = serde_json::from_str(&response.body).map_err(|e| LookupError::Decode {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        if info.is_failure() {
            return Err(LookupError::Rejected {
                query: ip.to_string(),
                message: info.message.unwrap_or_else(|| "unknown reason".to_string()),
            });
        }
        Ok(info)
    }
}

impl std::fmt::Debug for Lookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lookup")
            .field("ip_url", &self.ip_url)
            .field("geo_url", &self.geo_url)
            .finish_non_exhaustive()
    }
}

fn parse_ip(raw: &str) -> Result<IpAddr, LookupError> {
    let trimmed = raw.trim();
    trimmed
        .parse::<IpAddr>()
        .map_err(|_| LookupError::InvalidIp(trimmed.to_string()))
}

/// Resolves the caller's public IP.
#[derive(Debug, Clone)]
pub struct GetIp {
    lookup: Lookup,
}

impl GetIp {
    pub const NAME: &'static str = "activity.get_ip";

    pub fn new(lookup: Lookup) -> Self {
        Self { lookup }
    }
}

#[async_trait]
impl Activity for GetIp {
    type Input = ();
    type Output = String;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn stage(&self) -> &'static str {
        "GetIP"
    }

    async fn execute(&self, ctx: &ActivityContext, _input: &()) -> Result<String, ActivityError> {
        tracing::info!(attempt = ctx.attempt(), "Getting IP address");
        let ip = self.lookup.public_ip(ctx).await?;
        tracing::info!(ip = %ip, "Got IP address");
        Ok(ip.to_string())
    }
}

/// Turns an IP into "City, Region, Country".
#[derive(Debug, Clone)]
pub struct GetLocationInfo {
    lookup: Lookup,
}

impl GetLocationInfo {
    pub const NAME: &'static str = "activity.get_location_info";

    pub fn new(lookup: Lookup) -> Self {
        Self { lookup }
    }
}

#[async_trait]
impl Activity for GetLocationInfo {
    type Input = String;
    type Output = String;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn stage(&self) -> &'static str {
        "GetLocationInfo"
    }

    async fn execute(&self, ctx: &ActivityContext, ip: &String) -> Result<String, ActivityError> {
        let info = self.lookup.ip_info(ctx, ip).await?;
        let location = info.location();
        tracing::info!(ip = %ip, location = %location, "Got location");
        Ok(location)
    }
}

/// Turns an IP into the name of its ISP.
#[derive(Debug, Clone)]
pub struct GetInternetServiceProvider {
    lookup: Lookup,
}

impl GetInternetServiceProvider {
    pub const NAME: &'static str = "activity.get_isp";

    pub fn new(lookup: Lookup) -> Self {
        Self { lookup }
    }
}

#[async_trait]
impl Activity for GetInternetServiceProvider {
    type Input = String;
    type Output = String;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn stage(&self) -> &'static str {
        "GetInternetServiceProvider"
    }

    async fn execute(&self, ctx: &ActivityContext, ip: &String) -> Result<String, ActivityError> {
        let info = self.lookup.ip_info(ctx, ip).await?;
        tracing::info!(ip = %ip, isp = %info.isp, "Got internet service provider");
        Ok(info.isp)
    }
}
