//! Layer catalog: product → upstream layer mapping.
//!
//! Maps a `(satellite, product)` pair to an ordered list of candidate
//! upstream imagery layers. The orchestrator tries candidates in
//! catalog order, falling through to the next on failure, so the
//! order here *is* the fallback order and is identical across runs.
//!
//! The catalog is data-driven: [`LayerCatalog::builtin`] carries the
//! standard NASA Worldview product table, and deployments can extend
//! or replace it via [`LayerCatalog::register`] or a JSON file loaded
//! with [`LayerCatalog::from_json`].

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::request::Satellite;

/// Default WMS endpoint serving the built-in layers.
const WORLDVIEW_WMS_ENDPOINT: &str = "https://worldview.earthdata.nasa.gov/geoserver/wms";

/// Shared true-color fallback chain, most recent instrument first.
///
/// Any registered product falls back to these after its primary layer,
/// so a single instrument outage never exhausts a request on its own.
const TRUE_COLOR_FALLBACKS: [&str; 3] = [
    "VIIRS_SNPP_CorrectedReflectance_TrueColor",
    "MODIS_Aqua_CorrectedReflectance_TrueColor",
    "MODIS_Terra_CorrectedReflectance_TrueColor",
];

/// One candidate upstream imagery source.
///
/// Immutable and defined entirely by the catalog; never persisted to
/// the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerCandidate {
    /// Upstream layer identifier (e.g. a GIBS/Worldview layer name).
    pub layer_id: String,
    /// WMS endpoint the layer is served from.
    pub endpoint: String,
}

impl LayerCandidate {
    /// Create a candidate served from the default Worldview endpoint.
    pub fn worldview(layer_id: impl Into<String>) -> Self {
        Self {
            layer_id: layer_id.into(),
            endpoint: WORLDVIEW_WMS_ENDPOINT.to_string(),
        }
    }
}

/// The `(satellite, product)` pair is not registered in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported product '{product}' for satellite {satellite}")]
pub struct UnsupportedProductError {
    /// Satellite name as requested.
    pub satellite: String,
    /// Product identifier as requested.
    pub product: String,
}

/// Errors from loading a catalog definition file.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Failed to read the catalog file.
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog file is not valid JSON.
    #[error("failed to parse catalog file: {0}")]
    Parse(#[from] serde_json::Error),

    /// Catalog entry names a satellite the service does not know.
    #[error("catalog entry for product '{product}' names unknown satellite '{satellite}'")]
    UnknownSatellite { satellite: String, product: String },
}

/// On-disk catalog definition format.
#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    entries: Vec<CatalogFileEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CatalogFileEntry {
    satellite: String,
    product: String,
    layers: Vec<LayerCandidate>,
}

/// Static mapping from `(satellite, product)` to ordered candidates.
///
/// Pure lookup with no interior mutability, so `&LayerCatalog` is safe
/// to share across tasks without synchronisation.
#[derive(Debug, Clone, Default)]
pub struct LayerCatalog {
    entries: HashMap<(Satellite, String), Vec<LayerCandidate>>,
}

impl LayerCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog carrying the standard Worldview product table.
    ///
    /// Each product maps to its primary corrected-reflectance layer
    /// followed by the shared true-color fallback chain (minus the
    /// primary itself).
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register(
            Satellite::Modis,
            "MOD09GA",
            with_fallbacks("MODIS_Terra_CorrectedReflectance_TrueColor"),
        );
        catalog.register(
            Satellite::Modis,
            "MYD09GA",
            with_fallbacks("MODIS_Aqua_CorrectedReflectance_TrueColor"),
        );
        catalog.register(
            Satellite::Viirs,
            "VNP09",
            with_fallbacks("VIIRS_SNPP_CorrectedReflectance_TrueColor"),
        );
        catalog.register(
            Satellite::Goes,
            "ABI",
            with_fallbacks("GOES16_ABI_DisplayTrueColor"),
        );
        catalog
    }

    /// Load a catalog from a JSON definition file.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the file cannot be read, is not
    /// valid JSON, or names an unknown satellite.
    pub fn from_json(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        let file: CatalogFile = serde_json::from_str(&raw)?;

        let mut catalog = Self::new();
        for entry in file.entries {
            let satellite: Satellite =
                entry
                    .satellite
                    .parse()
                    .map_err(|_| CatalogError::UnknownSatellite {
                        satellite: entry.satellite.clone(),
                        product: entry.product.clone(),
                    })?;
            catalog.register(satellite, entry.product, entry.layers);
        }
        Ok(catalog)
    }

    /// Register candidates for a product, replacing any existing list.
    ///
    /// Product identifiers are normalised to upper case.
    pub fn register(
        &mut self,
        satellite: Satellite,
        product: impl Into<String>,
        candidates: Vec<LayerCandidate>,
    ) {
        let product = product.into().to_ascii_uppercase();
        self.entries.insert((satellite, product), candidates);
    }

    /// Ordered candidate layers for a `(satellite, product)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedProductError`] when the pair is not
    /// registered.
    pub fn candidates(
        &self,
        satellite: Satellite,
        product: &str,
    ) -> Result<&[LayerCandidate], UnsupportedProductError> {
        let product = product.to_ascii_uppercase();
        self.entries
            .get(&(satellite, product.clone()))
            .map(|v| v.as_slice())
            .ok_or(UnsupportedProductError {
                satellite: satellite.as_str().to_string(),
                product,
            })
    }

    /// Number of registered `(satellite, product)` pairs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no products are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Primary layer followed by the shared fallbacks, deduplicated.
fn with_fallbacks(primary: &str) -> Vec<LayerCandidate> {
    let mut layers = vec![LayerCandidate::worldview(primary)];
    for fallback in TRUE_COLOR_FALLBACKS {
        if fallback != primary {
            layers.push(LayerCandidate::worldview(fallback));
        }
    }
    layers
}
