use serde::{Deserialize, Serialize};

/// Geolocation record returned by ip-api.com.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IpInfo {
    /// "success" or "fail".
    pub status: String,
    /// Failure reason when `status` is "fail".
    pub message: Option<String>,
    pub city: String,
    pub region_name: String,
    pub country: String,
    pub country_code: String,
    pub isp: String,
    pub org: String,
    #[serde(rename = "as")]
    pub as_name: String,
    pub query: String,
    pub timezone: String,
    pub zip: String,
    pub lat: f64,
    pub lon: f64,
}

impl IpInfo {
    pub fn is_failure(&self) -> bool {
        self.status.eq_ignore_ascii_case("fail")
    }

    /// "City, Region, Country".
    pub fn location(&self) -> String {
        format!("{}, {}, {}", self.city, self.region_name, self.country)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_success() {
        let body = r#"{
            "status": "success",
            "country": "United States",
            "countryCode": "US",
            "regionName": "Virginia",
            "city": "Ashburn",
            "zip": "20149",
            "lat": 39.03,
            "lon": -77.5,
            "timezone": "America/New_York",
            "isp": "Amazon.com, Inc.",
            "org": "AWS EC2",
            "as": "AS14618 Amazon.com, Inc.",
            "query": "3.80.0.1"
        }"#;
        let info: IpInfo = serde_json::from_str(body).unwrap();

        assert!(!info.is_failure());
        assert_eq!(info.location(), "Ashburn, Virginia, United States");
        assert_eq!(info.isp, "Amazon.com, Inc.");
        assert_eq!(info.as_name, "AS14618 Amazon.com, Inc.");
    }

    #[test]
    fn test_deserialize_failure() {
        let body = r#"{"status":"fail","message":"private range","query":"10.0.0.1"}"#;
        let info: IpInfo = serde_json::from_str(body).unwrap();

        assert!(info.is_failure());
        assert_eq!(info.message.as_deref(), Some("private range"));
        assert_eq!(info.city, "");
    }
}
