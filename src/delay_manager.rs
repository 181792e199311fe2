use std::thread;
use std::time::Duration;

use log::info;
use rand::Rng;

/// Random wait between tracking page fetches. The carrier site throttles
/// rapid-fire queries, so spacing them out keeps the scrape passes usable.
/// A (0, 0) range disables the wait, which the tests rely on.
pub fn random_page_delay(min_secs: u64, max_secs: u64) {
    if max_secs == 0 {
        return;
    }
    let delay_secs = rand::thread_rng().gen_range(min_secs..=max_secs);
    info!("Waiting for {} seconds before the next page...", delay_secs);
    thread::sleep(Duration::from_secs(delay_secs));
}
