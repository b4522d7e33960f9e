// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Inspection and stage-diagnostic endpoints

pub mod handler;
pub mod upload;

pub use handler::{
    inspect_handler, inspect_kind_handler, preprocess_stage_handler, REGION_COUNT_HEADER,
};
pub use upload::{read_upload, UPLOAD_FIELD};
