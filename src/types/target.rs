//! IP block enumeration.
//!
//! Expands CIDR blocks into the host addresses that get probed:
//! - Network and broadcast addresses are skipped for IPv4 prefixes below /31
//! - /31 and /32 (and /127, /128) are returned verbatim
//! - Oversized blocks are rejected before anything is allocated

use ipnetwork::IpNetwork;
use std::net::IpAddr;

/// Error type for target parsing and validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("invalid CIDR notation: {0}")]
    InvalidCidr(String),
    #[error("CIDR range too large: {0} addresses (max: {1})")]
    CidrTooLarge(u128, u128),
    #[error("no IP blocks given")]
    EmptyBlockList,
    #[error("invalid ASN '{0}' (expected e.g. AS13335)")]
    InvalidAsn(String),
    #[error("invalid domain name: {0}")]
    InvalidDomain(String),
}

/// Maximum number of addresses a single block may expand to (a /12 for IPv4).
pub const MAX_BLOCK_HOSTS: u128 = 1 << 20;

/// Parse a CIDR string into a network.
///
/// A bare address is accepted as a single-host block.
pub fn parse_block(block: &str) -> Result<IpNetwork, TargetError> {
    let block = block.trim();
    let network: IpNetwork = block
        .parse()
        .map_err(|_| TargetError::InvalidCidr(block.to_string()))?;

    let size = block_size(&network);
    if size > MAX_BLOCK_HOSTS {
        return Err(TargetError::CidrTooLarge(size, MAX_BLOCK_HOSTS));
    }

    Ok(network)
}

/// Number of addresses covered by a network, including network/broadcast.
pub fn block_size(network: &IpNetwork) -> u128 {
    match network {
        IpNetwork::V4(net) => u128::from(net.size()),
        IpNetwork::V6(net) => {
            let prefix = u32::from(net.prefix());
            if prefix >= 128 {
                1
            } else if prefix == 0 {
                u128::MAX
            } else {
                1u128 << (128 - prefix)
            }
        }
    }
}

/// Expand a CIDR block into its usable host addresses, in ascending order.
///
/// `192.168.1.0/30` yields `192.168.1.1` and `192.168.1.2`; `8.8.8.8/32`
/// yields `8.8.8.8`.
pub fn cidr_hosts(block: &str) -> Result<Vec<IpAddr>, TargetError> {
    let network = parse_block(block)?;

    let hosts = network
        .iter()
        .filter(|ip| match (network, ip) {
            (IpNetwork::V4(net), IpAddr::V4(addr)) if net.prefix() < 31 => {
                *addr != net.network() && *addr != net.broadcast()
            }
            _ => true,
        })
        .collect();

    Ok(hosts)
}

/// Split a comma-separated block list, trimming blanks and validating each block.
pub fn parse_block_list(list: &str) -> Result<Vec<String>, TargetError> {
    let mut blocks = Vec::new();

    for block in list.split(',') {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }
        parse_block(block)?;
        blocks.push(block.to_string());
    }

    if blocks.is_empty() {
        return Err(TargetError::EmptyBlockList);
    }

    Ok(blocks)
}

/// Expand every block into a single ordered target list.
///
/// Fails on the first malformed block, before any target is produced.
pub fn expand_blocks(blocks: &[String]) -> Result<Vec<String>, TargetError> {
    let mut targets = Vec::new();
    for block in blocks {
        targets.extend(cidr_hosts(block)?.into_iter().map(|ip| ip.to_string()));
    }
    Ok(targets)
}
