//! Dataset assembly from canonical waveforms

pub mod assembler;
pub mod features;

pub use assembler::{DatasetAssembler, DatasetError};
pub use features::{FeatureExtractor, FeatureRecord, FeatureTable, FeatureValue, HeaderExtractor, HeaderField};
