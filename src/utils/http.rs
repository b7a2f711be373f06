use std::time::Duration;

use reqwest::Client;

/// Builds the client used for every Bot API call.
///
/// Each `Bot` owns its client so its connection pool lives on the runtime
/// that created it.
pub fn build_http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder().timeout(timeout).build()
}
