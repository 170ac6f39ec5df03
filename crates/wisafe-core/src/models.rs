//! Static table of known WiSafe2 alarm models

use crate::DeviceCategory;

/// Display metadata for one model code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInfo {
    /// Four hex-character model code reported by the bridge
    pub code: &'static str,
    pub name: &'static str,
    pub category: DeviceCategory,
    pub description: &'static str,
}

pub static DEVICE_MODELS: &[ModelInfo] = &[
    ModelInfo {
        code: "1103",
        name: "WST-630",
        category: DeviceCategory::Combined,
        description: "Smoke/Strobe Unit",
    },
    ModelInfo {
        code: "0301",
        name: "W2-CO-10X",
        category: DeviceCategory::Co,
        description: "Carbon Monoxide Alarm",
    },
    ModelInfo {
        code: "0401",
        name: "FP2620W2",
        category: DeviceCategory::Smoke,
        description: "Smoke Alarm",
    },
    ModelInfo {
        code: "0501",
        name: "FP1720W2",
        category: DeviceCategory::Heat,
        description: "Heat Alarm",
    },
    ModelInfo {
        code: "0601",
        name: "W2-SVP-630",
        category: DeviceCategory::Strobe,
        description: "Strobe Unit",
    },
];

/// Look up a model code; matching is exact
pub fn lookup_model(code: &str) -> Option<&'static ModelInfo> {
    DEVICE_MODELS.iter().find(|m| m.code == code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_models() {
        let wst = lookup_model("1103").unwrap();
        assert_eq!(wst.name, "WST-630");
        assert_eq!(wst.category, DeviceCategory::Combined);

        assert_eq!(lookup_model("0301").unwrap().category, DeviceCategory::Co);
        assert_eq!(lookup_model("0501").unwrap().name, "FP1720W2");
    }

    #[test]
    fn test_lookup_unknown_code() {
        assert!(lookup_model("FFFF").is_none());
        assert!(lookup_model("").is_none());
    }

    #[test]
    fn test_codes_are_four_hex_chars() {
        for model in DEVICE_MODELS {
            assert_eq!(model.code.len(), 4);
            assert!(model.code.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }
}
