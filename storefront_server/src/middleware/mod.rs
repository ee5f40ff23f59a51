mod hmac;
mod whitelist;

pub use hmac::{HmacMiddlewareFactory, HmacMiddlewareService};
pub use whitelist::{IpWhitelistFactory, IpWhitelistService};
