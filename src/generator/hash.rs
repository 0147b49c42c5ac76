use sha2::{Digest, Sha256};

use super::ConfigSpec;

/// Content hash of a configuration, ignoring its current version.
pub fn config_version(config: &ConfigSpec) -> Result<String, serde_json::Error> {
    let unversioned = ConfigSpec { version: String::new(), ..config.clone() };
    let bytes = serde_json::to_vec(&unversioned)?;
    Ok(hex::encode(Sha256::digest(bytes)))
}
