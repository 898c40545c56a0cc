use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use zeroize::Zeroizing;

use crate::authoring::PublishReceipt;
use crate::cli::GlobalArgs;
use crate::codec;
use crate::config::{CONFIG_FILE_NAME, Config};
use crate::domain::{GuardianId, SplitConfig, Threshold};
use crate::keys::{KeyManager, SecretKey};
use crate::model::Question;
use crate::store::Store;
use crate::vault::Vault;

/// Loads the config and applies command-line overrides
///
/// Without `--config`, `paperlock.toml` in the working directory is used when present.
///
/// # Errors
/// Returns an error if the config file cannot be read or is invalid
pub fn resolve_config(global: &GlobalArgs) -> Result<Config> {
    let implicit = Path::new(CONFIG_FILE_NAME);
    let path = match &global.config {
        Some(path) => Some(path.as_path()),
        None if implicit.exists() => Some(implicit),
        None => None,
    };
    let mut config = Config::load(path).with_context(|| match path {
        Some(path) => format!("Failed to load config from {}", path.display()),
        None => "Invalid default config".to_string(),
    })?;

    if let Some(state) = &global.state {
        config.state_path = state.clone();
    }
    if let Some(outbox) = &global.outbox {
        config.outbox_dir = outbox.clone();
    }
    if let Some(level) = &global.log_level {
        config.log_level = level.clone();
    }
    Ok(config)
}

/// Reads a JSON array of questions
///
/// # Errors
/// Returns an error if the file cannot be read or parsed
pub fn load_questions(path: &Path) -> Result<Vec<Question>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read questions from {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse questions in {}", path.display()))
}

/// Encrypts the questions in `path` and sends the key shares out
///
/// # Errors
/// Returns an error if the file is unusable or publishing is refused
pub fn publish_questions<S: Store>(
    vault: &Vault<S>,
    author: &str,
    path: &Path,
    guardians: &[GuardianId],
) -> Result<PublishReceipt> {
    let questions = load_questions(path)?;
    vault
        .authoring()
        .publish(author, &questions, guardians)
        .context("Failed to publish questions")
}

/// Splits a key into hex shares
///
/// # Errors
/// Returns an error if share creation fails
pub fn split_key(key: &SecretKey, config: SplitConfig) -> Result<Vec<Zeroizing<String>>> {
    let shares = KeyManager::new(config)
        .split_key(key)
        .context("Failed to split key")?;
    Ok(shares.iter().map(codec::encode_share).collect())
}

/// Splits a hex key into hex shares
///
/// # Errors
/// Returns an error if the key is not 32 bytes of hex or share creation fails
pub fn split_key_hex(key_hex: &str, config: SplitConfig) -> Result<Vec<Zeroizing<String>>> {
    let key = codec::decode_key(key_hex).context("Failed to parse key")?;
    split_key(&key, config)
}

/// Rebuilds a hex key from hex shares
///
/// # Errors
/// Returns an error if a share cannot be parsed or there are too few of them
pub fn combine_shares(share_strings: &[String], threshold: Threshold) -> Result<Zeroizing<String>> {
    if share_strings.is_empty() {
        bail!("No shares provided");
    }

    let shares = share_strings
        .iter()
        .enumerate()
        .map(|(idx, share)| {
            codec::decode_share(share)
                .with_context(|| format!("Failed to parse share #{}", idx + 1))
        })
        .collect::<Result<Vec<_>>>()?;

    // Share count plays no part in recovery.
    let config = SplitConfig::from_raw(*threshold, *threshold).context("Invalid threshold")?;
    let key = KeyManager::new(config)
        .reconstruct_key(&shares)
        .context("Failed to recover key")?;
    Ok(codec::encode_key(&key))
}
