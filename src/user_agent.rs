//! User-Agent string sent with every HTTP request.

/// Project URL included in the User-Agent.
const PROJECT_UA_URL: &str = "https://github.com/fierce/fwfetch";

/// Default User-Agent for firmware fetches.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("fwfetch/{version} (firmware-fetcher; +{PROJECT_UA_URL})")
}
