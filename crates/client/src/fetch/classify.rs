//! Response tainting.
//!
//! Decides which [`ResponseType`] a response gets from the requesting
//! origin, the request mode and the URL the response finally came from.

use docscan_core::origin::is_same_origin;
use docscan_core::{RequestMode, ResponseType};
use url::Url;

use crate::network::FetchError;

/// Classify a response.
///
/// - same-origin responses are `basic`
/// - top-level navigations are never filtered
/// - cross-origin `no-cors` responses are `opaque`
/// - cross-origin `cors` responses must carry a matching
///   `Access-Control-Allow-Origin` header
/// - `same-origin` requests may not end up anywhere else
pub fn classify(
    origin: &Url, mode: RequestMode, final_url: &Url, allow_origin: Option<&str>,
) -> Result<ResponseType, FetchError> {
    if is_same_origin(origin, final_url) {
        return Ok(ResponseType::Basic);
    }

    match mode {
        RequestMode::Navigate => Ok(ResponseType::Basic),
        RequestMode::NoCors => Ok(ResponseType::Opaque),
        RequestMode::SameOrigin => Err(FetchError::Cors(format!("same-origin request ended at {final_url}"))),
        RequestMode::Cors => {
            let expected = origin.origin().ascii_serialization();
            match allow_origin.map(str::trim) {
                Some("*") => Ok(ResponseType::Cors),
                Some(value) if value == expected => Ok(ResponseType::Cors),
                Some(value) => Err(FetchError::Cors(format!("{final_url} allows {value}, not {expected}"))),
                None => Err(FetchError::Cors(format!("{final_url} sent no Access-Control-Allow-Origin"))),
            }
        }
    }
}
