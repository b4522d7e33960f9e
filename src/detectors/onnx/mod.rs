// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX Runtime backed detectors

pub mod classifier;
pub mod session;
pub mod yolo;

pub use classifier::FreshnessClassifier;
pub use session::OnnxSession;
pub use yolo::{YoloDetector, YoloParams};
