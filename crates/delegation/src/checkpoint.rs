//! Flat checkpoint file of token ids pending revocation.
//!
//! One decimal id per line with a trailing newline. The operator may edit the
//! file between the scan and the revocation; blank lines are ignored on read.

use crate::error::{Error, Result};
use bulk_revoke_core::TokenId;
use std::fs;
use std::path::Path;

pub fn write(path: &Path, token_ids: &[TokenId]) -> Result<()> {
    let mut contents = String::with_capacity(token_ids.len() * 8);
    for id in token_ids {
        contents.push_str(&id.to_string());
        contents.push('\n');
    }
    fs::write(path, contents).map_err(|source| Error::CheckpointIo {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read(path: &Path) -> Result<Vec<TokenId>> {
    let contents = fs::read_to_string(path).map_err(|source| Error::CheckpointIo {
        path: path.to_path_buf(),
        source,
    })?;
    parse(path, &contents)
}

/// Prefer the file's (possibly edited) contents; fall back to `scanned` when
/// no checkpoint exists.
pub fn resolve(path: &Path, scanned: Vec<TokenId>) -> Result<Vec<TokenId>> {
    if path.exists() {
        read(path)
    } else {
        Ok(scanned)
    }
}

fn parse(path: &Path, contents: &str) -> Result<Vec<TokenId>> {
    contents
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(line, value)| {
            parse_decimal(value).ok_or_else(|| Error::CheckpointParse {
                path: path.to_path_buf(),
                line,
                value: value.to_string(),
            })
        })
        .collect()
}

fn parse_decimal(value: &str) -> Option<TokenId> {
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    TokenId::from_str_radix(value, 10).ok()
}
