//! Scan inputs: IP blocks, ASNs and domains.
//!
//! Everything here is validated before a scan starts; a failure aborts the
//! scan rather than degrading a single probe.

mod target;
mod validate;

pub use target::{
    block_size, cidr_hosts, expand_blocks, parse_block, parse_block_list, TargetError,
    MAX_BLOCK_HOSTS,
};
pub use validate::{
    clamp_timeout, clamp_workers, normalize_domain, sanitize_filename, validate_domain, Asn,
    MAX_TIMEOUT_MS, MAX_WORKERS, MIN_TIMEOUT_MS, MIN_WORKERS,
};
