use dotenvy::dotenv;
use ipnet::IpNet;
use std::env;
use std::net::IpAddr;
use std::str::FromStr;

const LIVE_API_URL: &str = "https://api.novacpayment.com";
const SANDBOX_API_URL: &str = "https://sandbox.novacpayment.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Test,
    Live,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "test" => Ok(Mode::Test),
            "live" => Ok(Mode::Live),
            other => anyhow::bail!("NOVAC_MODE must be 'test' or 'live', got '{}'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub enum AllowedIps {
    Any,
    Cidrs(Vec<IpNet>),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    /// Externally reachable base URL of this service, used to build the
    /// return-callback URL handed to Novac.
    pub public_base_url: String,
    pub mode: Mode,
    /// Novac API base URL; defaults from `mode` unless overridden.
    pub novac_api_url: String,
    pub novac_public_key: Option<String>,
    pub novac_secret_key: Option<String>,
    /// Optional HMAC secret for webhook signatures. Unset means webhooks
    /// are accepted unsigned (IP allow-list still applies).
    pub novac_webhook_secret: Option<String>,
    pub allowed_webhook_ips: AllowedIps,
    pub trusted_proxy_depth: usize,
    /// Donor-facing pages the return gateway redirects to.
    pub success_page_url: String,
    pub failure_page_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let mode: Mode = env::var("NOVAC_MODE")
            .unwrap_or_else(|_| "test".to_string())
            .parse()?;

        let novac_api_url = env::var("NOVAC_API_URL").unwrap_or_else(|_| {
            match mode {
                Mode::Live => LIVE_API_URL,
                Mode::Test => SANDBOX_API_URL,
            }
            .to_string()
        });

        let allowed_webhook_ips = parse_allowed_ips(
            &env::var("NOVAC_ALLOWED_WEBHOOK_IPS").unwrap_or_else(|_| "*".to_string()),
        )?;

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            mode,
            novac_api_url,
            novac_public_key: non_empty(env::var("NOVAC_PUBLIC_KEY").ok()),
            novac_secret_key: non_empty(env::var("NOVAC_SECRET_KEY").ok()),
            novac_webhook_secret: non_empty(env::var("NOVAC_WEBHOOK_SECRET").ok()),
            allowed_webhook_ips,
            trusted_proxy_depth: env::var("TRUSTED_PROXY_DEPTH")
                .unwrap_or_else(|_| "0".to_string())
                .parse()?,
            success_page_url: env::var("DONATION_SUCCESS_URL")
                .unwrap_or_else(|_| "/donation-confirmation".to_string()),
            failure_page_url: env::var("DONATION_FAILURE_URL")
                .unwrap_or_else(|_| "/donation-failed".to_string()),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Accepts `*`, or a comma-separated mix of CIDRs and bare addresses
/// (Novac publishes a single webhook source address, not a range).
pub fn parse_allowed_ips(raw: &str) -> anyhow::Result<AllowedIps> {
    let value = raw.trim();
    if value == "*" {
        return Ok(AllowedIps::Any);
    }

    let cidrs = value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(parse_allowed_entry)
        .collect::<anyhow::Result<Vec<_>>>()?;

    if cidrs.is_empty() {
        anyhow::bail!(
            "NOVAC_ALLOWED_WEBHOOK_IPS must be '*' or a comma-separated list of IPs/CIDRs"
        );
    }

    Ok(AllowedIps::Cidrs(cidrs))
}

fn parse_allowed_entry(entry: &str) -> anyhow::Result<IpNet> {
    if let Ok(net) = entry.parse::<IpNet>() {
        return Ok(net);
    }

    let ip: IpAddr = entry
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid IP or CIDR in allow-list: '{}'", entry))?;
    Ok(IpNet::from(ip))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_wildcard_allows_any() {
        assert!(matches!(parse_allowed_ips("*").unwrap(), AllowedIps::Any));
    }

    #[test]
    fn parse_bare_ip_becomes_host_cidr() {
        let allowed = parse_allowed_ips("18.233.137.110").unwrap();
        match allowed {
            AllowedIps::Cidrs(cidrs) => {
                assert_eq!(cidrs.len(), 1);
                assert!(cidrs[0].contains(&"18.233.137.110".parse::<IpAddr>().unwrap()));
                assert!(!cidrs[0].contains(&"18.233.137.111".parse::<IpAddr>().unwrap()));
            }
            AllowedIps::Any => panic!("expected CIDR list"),
        }
    }

    #[test]
    fn parse_mixed_list() {
        let allowed = parse_allowed_ips("203.0.113.0/24, 18.233.137.110").unwrap();
        match allowed {
            AllowedIps::Cidrs(cidrs) => assert_eq!(cidrs.len(), 2),
            AllowedIps::Any => panic!("expected CIDR list"),
        }
    }

    #[test]
    fn parse_garbage_is_rejected() {
        assert!(parse_allowed_ips("not-an-ip").is_err());
        assert!(parse_allowed_ips("").is_err());
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("TEST".parse::<Mode>().unwrap(), Mode::Test);
        assert_eq!("live".parse::<Mode>().unwrap(), Mode::Live);
        assert!("staging".parse::<Mode>().is_err());
    }
}
