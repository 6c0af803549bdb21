/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::path::Path;

use anyhow::{Context, anyhow};
use yaml_rust::YamlLoader;

use ferroftp_client::FtpClientConfig;

pub(crate) fn load(path: &Path) -> anyhow::Result<FtpClientConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let docs = YamlLoader::load_from_str(&content)
        .map_err(|e| anyhow!("invalid yaml file {}: {e}", path.display()))?;
    match docs.first() {
        Some(doc) => FtpClientConfig::parse_yaml(doc)
            .context(format!("invalid config in file {}", path.display())),
        None => Ok(FtpClientConfig::default()),
    }
}
