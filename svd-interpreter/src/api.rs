//! Entry points for loading device descriptions

use std::path;

use log::info;

use crate::{error::Error, frontend, model::Device, util};

impl Device {
    /// Load and parse the SVD file at `path`
    ///
    /// Files with an `.lzma` or `.xz` extension are decompressed first.
    pub fn load(path: &path::Path) -> Result<Self, Error> {
        let svd_xml = util::read_svd_source(path)?;
        let device = frontend::svd::parse_svd(&svd_xml).map_err(|e| match e {
            Error::SvdParse(positional) => {
                Error::SvdParseFile(positional.with_fname(path.display().to_string()))
            }
            e => e,
        })?;
        info!("Loaded device {} from {}", device.name, path.display());
        Ok(device)
    }

    /// Parse an SVD document held in memory
    pub fn parse(svd_xml: &str) -> Result<Self, Error> {
        frontend::svd::parse_svd(svd_xml)
    }
}
