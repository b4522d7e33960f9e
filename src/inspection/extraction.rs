// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Price and expiry-date extraction from OCR text

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Expiry date: `DD/MM/YYYY`, `DD-MM-YYYY` or a short `NN/NN` form
pub const EXPIRY_DATE_PATTERN: &str = r"(\d{2}[/-]\d{2}[/-]\d{4}|\d{2}[/-]\d{2})";

/// Expiry date with an added `MM/YYYY` form tried before the short form
pub const EXPIRY_DATE_PATTERN_V2: &str = r"(\d{2}[/-]\d{2}[/-]\d{4}|\d{2}[/-]\d{4}|\d{2}[/-]\d{2})";

/// Maximum retail price following an `MRP` marker
pub const MRP_PATTERN: &str = r"MRP[^\d]*(\d+\.\d{2})";

/// Which pattern set to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternVersion {
    /// Patterns as shipped with the original price/expiry service
    #[default]
    V1,
    /// Recognizes month/year expiry dates such as `12-2025`
    V2,
}

impl PatternVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternVersion::V1 => "v1",
            PatternVersion::V2 => "v2",
        }
    }

    pub fn expiry_pattern(&self) -> &'static str {
        match self {
            PatternVersion::V1 => EXPIRY_DATE_PATTERN,
            PatternVersion::V2 => EXPIRY_DATE_PATTERN_V2,
        }
    }
}

impl fmt::Display for PatternVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatternVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v1" | "1" => Ok(PatternVersion::V1),
            "v2" | "2" => Ok(PatternVersion::V2),
            other => Err(format!("Unknown pattern version: {}", other)),
        }
    }
}

/// Structured result of scanning OCR text
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceExpiryDetails {
    pub expiry_dates: Vec<String>,
    pub mrp_values: Vec<String>,
    pub raw_text: String,
}

/// Compiled pattern set
#[derive(Debug, Clone)]
pub struct PriceExpiryExtractor {
    version: PatternVersion,
    expiry: Regex,
    mrp: Regex,
}

impl PriceExpiryExtractor {
    pub fn new(version: PatternVersion) -> Result<Self, regex::Error> {
        Ok(Self {
            version,
            expiry: Regex::new(version.expiry_pattern())?,
            mrp: Regex::new(MRP_PATTERN)?,
        })
    }

    pub fn version(&self) -> PatternVersion {
        self.version
    }

    /// All non-overlapping matches, left to right, as captured by group 1
    pub fn extract(&self, text: &str) -> PriceExpiryDetails {
        PriceExpiryDetails {
            expiry_dates: captures(&self.expiry, text),
            mrp_values: captures(&self.mrp, text),
            raw_text: text.to_string(),
        }
    }
}

fn captures(re: &Regex, text: &str) -> Vec<String> {
    re.captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}
