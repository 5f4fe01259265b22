//! Mail exchanger lookup for the relay role

use hickory_resolver::Resolver;
use log::debug;

use crate::delivery::DeliveryError;

pub trait MxResolver: Send + Sync {
    /// Host name of the most preferred exchanger for `domain`
    fn exchanger(&self, domain: &str) -> Result<String, DeliveryError>;
}

/// System-configured DNS resolver
pub struct DnsResolver {
    resolver: Resolver,
}

impl DnsResolver {
    pub fn from_system_conf() -> Result<Self, DeliveryError> {
        Ok(Self {
            resolver: Resolver::from_system_conf()?,
        })
    }
}

impl MxResolver for DnsResolver {
    fn exchanger(&self, domain: &str) -> Result<String, DeliveryError> {
        let lookup = self.resolver.mx_lookup(domain)?;
        let host = lookup
            .iter()
            .min_by_key(|mx| mx.preference())
            .map(|mx| mx.exchange().to_utf8())
            .map(|name| name.trim_end_matches('.').to_owned())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| DeliveryError::NoExchanger(domain.to_owned()))?;

        debug!("mx for {domain} is {host}");
        Ok(host)
    }
}

/// Part after the last `@`, or `None` without one
pub fn domain_of(address: &str) -> Option<&str> {
    address
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|domain| !domain.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of("user@example.com"), Some("example.com"));
        assert_eq!(domain_of("\"a@b\"@example.org"), Some("example.org"));
        assert_eq!(domain_of("nobody"), None);
        assert_eq!(domain_of("trailing@"), None);
    }
}
