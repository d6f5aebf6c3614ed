//! Domain-hint verification.
//!
//! A submitter proves control of a domain by publishing a TXT record whose
//! value is the hex-encoded hash of their public key. The front-end treats
//! the verifier as a black box behind [`DnsVerifier`]; the production
//! implementation resolves TXT records through a DNS-over-HTTPS endpoint.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;

use crate::crypto::{key_hash, PublicKey32};
use crate::infra::{LogError, Result};

/// TXT record type code.
const TYPE_TXT: u16 = 16;

/// Longest acceptable domain hint, the DNS name length limit.
const MAX_DOMAIN_HINT_LEN: usize = 253;

/// Validates that a domain hint vouches for a submitter key.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DnsVerifier: Send + Sync {
    /// Succeeds when a TXT record under `domain_hint` resolves to the hash
    /// of `public_key`.
    async fn verify(&self, domain_hint: &str, public_key: &PublicKey32) -> Result<()>;
}

/// DNS-over-HTTPS verifier, speaking the JSON resolver API.
pub struct DohVerifier {
    http: reqwest::Client,
    resolver_url: String,
}

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status")]
    status: u32,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    record_type: u16,
    data: String,
}

impl DohVerifier {
    /// Verifier querying the JSON resolver at `resolver_url`, e.g.
    /// `https://cloudflare-dns.com/dns-query`.
    pub fn new(resolver_url: &str, timeout: std::time::Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            resolver_url: resolver_url.to_string(),
        })
    }

    fn matches(answers: &[DohAnswer], want: &str) -> bool {
        answers
            .iter()
            .filter(|a| a.record_type == TYPE_TXT)
            .map(|a| a.data.trim().trim_matches('"'))
            .any(|data| data.eq_ignore_ascii_case(want))
    }
}

#[async_trait]
impl DnsVerifier for DohVerifier {
    async fn verify(&self, domain_hint: &str, public_key: &PublicKey32) -> Result<()> {
        validate_domain_hint(domain_hint)?;

        let response = self
            .http
            .get(&self.resolver_url)
            .query(&[("name", domain_hint), ("type", "TXT")])
            .header("accept", "application/dns-json")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LogError::Internal(format!(
                "dns resolver answered {status}"
            )));
        }
        let answer: DohResponse = response.json().await?;
        if answer.status != 0 {
            return Err(LogError::Internal(format!(
                "dns lookup for {domain_hint} failed with rcode {}",
                answer.status
            )));
        }

        let want = hex::encode(key_hash(public_key));
        if Self::matches(&answer.answer, &want) {
            Ok(())
        } else {
            Err(LogError::Internal(format!(
                "no TXT record under {domain_hint} matches the submitter key"
            )))
        }
    }
}

fn validate_domain_hint(domain_hint: &str) -> Result<()> {
    if domain_hint.is_empty() || domain_hint.len() > MAX_DOMAIN_HINT_LEN {
        return Err(LogError::Internal("invalid domain hint".to_string()));
    }
    Ok(())
}
