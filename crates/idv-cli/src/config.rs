//! # Config Subcommand
//!
//! Prints the configuration resolved from the environment. Credentials are
//! never printed; only whether they are set.

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;

use idv_client::IdvConfig;

/// Arguments for the `idv config` subcommand.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Print the configuration as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute the config subcommand.
pub fn run_config(args: &ConfigArgs, config: &IdvConfig) -> Result<u8> {
    if args.json {
        let rendered = serde_json::to_string_pretty(&redacted(config))
            .context("failed to serialize configuration")?;
        println!("{rendered}");
    } else {
        println!("{config:#?}");
    }
    Ok(0)
}

/// JSON view of `config` with credentials replaced by presence flags.
pub fn redacted(config: &IdvConfig) -> serde_json::Value {
    json!({
        "base_url": config.base_url.as_str(),
        "api_token": "[REDACTED]",
        "api_key_set": config.api_key.is_some(),
        "api_key_header": config.api_key_header,
        "variant": config.variant.name(),
        "timeout_secs": config.timeout_secs,
        "max_attempts": config.max_attempts,
        "retry_delay_ms": config.retry_delay.as_millis() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use idv_client::ProtocolVariant;

    #[test]
    fn redacted_view_hides_credentials() {
        let config =
            IdvConfig::local_mock("http://127.0.0.1:9000/verifications", ProtocolVariant::two_phase())
                .unwrap();
        let view = redacted(&config);
        let rendered = view.to_string();

        assert_eq!(view["variant"], "two-phase");
        assert_eq!(view["api_key_set"], true);
        assert_eq!(view["retry_delay_ms"], 10);
        assert!(!rendered.contains("test-token"));
        assert!(!rendered.contains("test-key"));
    }

    #[test]
    fn debug_view_hides_credentials() {
        let config = IdvConfig::local_mock("http://127.0.0.1:9000", ProtocolVariant::polling()).unwrap();
        let rendered = format!("{config:#?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("test-token"));
    }
}
