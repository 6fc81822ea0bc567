//! Satellite platforms served by the pipeline.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CommonError;

/// Platform that acquired a swath. Each one owns a partition tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Satellite {
    /// EOS Terra (MODIS, `MOD` prefix)
    Terra,
    /// EOS Aqua (MODIS, `MYD` prefix)
    Aqua,
    /// Meteosat-10 (SEVIRI, `MET10` prefix)
    Msg,
}

impl Satellite {
    pub const ALL: [Satellite; 3] = [Satellite::Terra, Satellite::Aqua, Satellite::Msg];

    /// Directory name used under the file and image roots.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Terra => "terra",
            Self::Aqua => "aqua",
            Self::Msg => "msg",
        }
    }

    /// Three-letter MODIS platform prefix, if this is a MODIS platform.
    pub fn modis_prefix(&self) -> Option<&'static str> {
        match self {
            Self::Terra => Some("MOD"),
            Self::Aqua => Some("MYD"),
            Self::Msg => None,
        }
    }

    pub fn from_modis_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "MOD" => Some(Self::Terra),
            "MYD" => Some(Self::Aqua),
            _ => None,
        }
    }
}

impl std::fmt::Display for Satellite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Satellite {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "terra" => Ok(Self::Terra),
            "aqua" => Ok(Self::Aqua),
            "msg" | "met10" | "meteosat-10" => Ok(Self::Msg),
            _ => Err(CommonError::UnknownSatellite(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_roundtrip() {
        for sat in [Satellite::Terra, Satellite::Aqua] {
            let prefix = sat.modis_prefix().unwrap();
            assert_eq!(Satellite::from_modis_prefix(prefix), Some(sat));
        }
        assert_eq!(Satellite::Msg.modis_prefix(), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!("Terra".parse::<Satellite>().unwrap(), Satellite::Terra);
        assert_eq!("MET10".parse::<Satellite>().unwrap(), Satellite::Msg);
        assert!("noaa20".parse::<Satellite>().is_err());
    }
}
