use reqwest::Url;

use crate::GatewayApiError;

/// Joins path segments onto the base URL. Each segment is percent-encoded.
pub fn endpoint(base_url: &str, segments: &[&str]) -> Result<Url, GatewayApiError> {
    let mut url = Url::parse(base_url).map_err(|e| GatewayApiError::Initialization(format!("{base_url}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| GatewayApiError::Initialization(format!("{base_url} cannot be used as a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builds_paths() {
        let url = endpoint("https://api.example.com", &["transaction", "verify", "ref-1"]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/transaction/verify/ref-1");
        let url = endpoint("https://api.example.com/v2/", &["transaction", "initialize"]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v2/transaction/initialize");
    }

    #[test]
    fn references_are_encoded() {
        let url = endpoint("https://api.example.com", &["transaction", "verify", "../admin?x=1"]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/transaction/verify/..%2Fadmin%3Fx=1");
    }
}
