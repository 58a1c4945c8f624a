//! Sub-image handoff
//!
//! Rasterized lenslet sub-images are handed off to an [ImageStore] as [SubImage] frames
//! keyed by their label.
//! The frames carry the metadata needed to put them back into the full detector frame.

use std::{
    collections::BTreeMap,
    io::{Read, Write},
};

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sub-image (de)serialization failed")]
    Pickle(#[from] serde_pickle::Error),
    #[error("no sub-image labeled {0}")]
    Missing(String),
}

/// Lenslet sub-image with its full frame metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubImage {
    pub label: String,
    /// Lenslet index
    pub lenslet: usize,
    /// Full frame position of the sub-image corner [px]
    pub corner: [i64; 2],
    /// Fingerprint of the instrument configuration
    pub config_hash: String,
    /// Name of the source spectrum
    pub spectrum: String,
    pub data: DMatrix<f64>,
}
impl SubImage {
    /// Label of the sub-pixel sub-image of lenslet `index`
    pub fn label_for(index: usize) -> String {
        format!("Subimage-{index:04}")
    }
    /// Label of the detector pixel sub-image of lenslet `index`
    pub fn binned_label_for(index: usize) -> String {
        format!("Subimage-{index:04}-binned")
    }
    /// Sub-image shape
    pub fn shape(&self) -> (usize, usize) {
        self.data.shape()
    }
    /// Sub-image rounded to 16 bit detector counts
    ///
    /// Values outside the `i16` range saturate
    pub fn quantized(&self) -> DMatrix<i16> {
        self.data
            .map(|v| v.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16)
    }
}

/// Interface to the external image stack
pub trait ImageStore {
    /// Writes a sub-image, replacing any sub-image with the same label
    fn write(&mut self, frame: &SubImage) -> Result<(), StoreError>;
    /// Reads the sub-image with the given label
    fn read(&self, label: &str) -> Result<SubImage, StoreError>;
    /// Labels of the stored sub-images
    fn labels(&self) -> Vec<String>;
}

/// In-memory store of pickled sub-images
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PickleStore {
    frames: BTreeMap<String, Vec<u8>>,
}
impl PickleStore {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn len(&self) -> usize {
        self.frames.len()
    }
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
    /// Pickles the whole store into `writer`
    pub fn to_writer<W: Write>(&self, writer: &mut W) -> Result<(), StoreError> {
        serde_pickle::to_writer(writer, &self.frames, Default::default())?;
        Ok(())
    }
    /// Loads a store pickled with [PickleStore::to_writer]
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, StoreError> {
        let frames = serde_pickle::from_reader(reader, Default::default())?;
        Ok(Self { frames })
    }
}
impl ImageStore for PickleStore {
    fn write(&mut self, frame: &SubImage) -> Result<(), StoreError> {
        let bytes = serde_pickle::to_vec(frame, Default::default())?;
        log::debug!("{}: {} bytes", frame.label, bytes.len());
        self.frames.insert(frame.label.clone(), bytes);
        Ok(())
    }
    fn read(&self, label: &str) -> Result<SubImage, StoreError> {
        let bytes = self
            .frames
            .get(label)
            .ok_or_else(|| StoreError::Missing(label.to_string()))?;
        Ok(serde_pickle::from_slice(bytes, Default::default())?)
    }
    fn labels(&self) -> Vec<String> {
        self.frames.keys().cloned().collect()
    }
}
