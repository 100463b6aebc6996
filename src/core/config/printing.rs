use crate::core::config::data::Config;

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        match &self.api_base_url {
            Some(url) => println!("  api-base-url: {url}"),
            None => println!("  api-base-url: (unset)"),
        }
        println!("  request-timeout: {}s", self.request_timeout().as_secs());
        println!(
            "  token-check-interval: {}s",
            self.token_check_interval().as_secs()
        );
        println!("  storage: {}", self.storage_backend().as_str());
    }
}
