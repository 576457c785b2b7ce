use crate::error::MonitorError;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use std::net::IpAddr;
use tokio::net::lookup_host;

/// Resolves `host` to a single address. IP literals are returned as-is;
/// for names, IPv4 results are preferred over IPv6.
pub async fn resolve_host(host: &str) -> Result<IpAddr, MonitorError> {
    if let Ok(addr) = host.parse::<IpAddr>() {
        return Ok(addr);
    }

    let unresolvable = |reason: String| MonitorError::Unresolvable {
        host: host.to_string(),
        reason,
    };

    // lookup_host wants a port, any will do
    let addrs = lookup_host(format!("{}:0", host))
        .await
        .map_err(|e| unresolvable(e.to_string()))?;

    let mut resolved: Vec<IpAddr> = addrs.map(|socket_addr| socket_addr.ip()).collect();
    resolved.sort_by_key(|addr| addr.is_ipv6());

    resolved
        .first()
        .copied()
        .ok_or_else(|| unresolvable("no address found".into()))
}

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// `HH:MM:SS`, hours keep growing past 24. Sub-second parts are rounded.
pub fn format_duration(delta: TimeDelta) -> String {
    let millis = delta.num_milliseconds().max(0);
    let total = (millis + 500) / 1000;
    format!("{:02}:{:02}:{:02}", total / 3600, total % 3600 / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(TimeDelta::seconds(15)), "00:00:15");
        assert_eq!(format_duration(TimeDelta::seconds(3725)), "01:02:05");
        assert_eq!(format_duration(TimeDelta::hours(30)), "30:00:00");
        assert_eq!(format_duration(TimeDelta::milliseconds(1499)), "00:00:01");
        assert_eq!(format_duration(TimeDelta::milliseconds(1500)), "00:00:02");
        assert_eq!(format_duration(TimeDelta::seconds(-4)), "00:00:00");
    }

    #[test]
    fn test_format_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(format_timestamp(&at), "2024-01-01T10:00:00Z");
    }

    #[tokio::test]
    async fn test_resolve_literal() {
        let addr = resolve_host("8.8.8.8").await.unwrap();
        assert_eq!(addr, "8.8.8.8".parse::<IpAddr>().unwrap());
        let addr = resolve_host("::1").await.unwrap();
        assert!(addr.is_ipv6());
    }

    #[tokio::test]
    async fn test_resolve_invalid_name() {
        let err = resolve_host("no such host.invalid").await.unwrap_err();
        assert!(matches!(err, MonitorError::Unresolvable { .. }));
    }
}
