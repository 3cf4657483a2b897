use proctor_core::{Beacon, BeaconPayload};

use std::time::Duration;

use tracing::{debug, error, warn};

/// Fire-and-forget violation delivery that outlives the async runtime.
///
/// Each payload is posted from its own thread with a blocking client, so a
/// runtime shutting down on page teardown cannot cancel it.
pub struct HttpBeacon {
    violation_url: String,
    timeout: Duration,
}

impl HttpBeacon {
    /// Beacon posting to the violation endpoint of `token`.
    pub fn new(origin: &str, token: &str, timeout: Duration) -> Self {
        Self {
            violation_url: format!("{}/api/test/{}/violation", origin.trim_end_matches('/'), token),
            timeout,
        }
    }
}

impl Beacon for HttpBeacon {
    fn send(&self, payload: BeaconPayload) -> bool {
        let url = self.violation_url.clone();
        let timeout = self.timeout;
        let spawned = std::thread::Builder::new()
            .name(String::from("beacon"))
            .spawn(move || {
                let client = match reqwest::blocking::Client::builder().timeout(timeout).build() {
                    Ok(client) => client,
                    Err(e) => {
                        error!(error = %e, "Beacon client unavailable");
                        return;
                    }
                };
                match client.post(&url).json(&payload).send() {
                    Ok(response) => debug!(status = %response.status(), "Beacon delivered"),
                    Err(e) => warn!(error = %e, "Beacon not delivered"),
                }
            });
        match spawned {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, "Beacon thread not spawned");
                false
            }
        }
    }
}
