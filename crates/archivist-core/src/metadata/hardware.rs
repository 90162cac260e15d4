use serde::{Deserialize, Serialize};

/// One device signature. A rule matches when the camera make contains any of
/// `makes` and, if `models` is non-empty, the model contains any of `models`.
/// Comparison is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareRule {
    pub class: String,
    #[serde(default)]
    pub makes: Vec<String>,
    #[serde(default)]
    pub models: Vec<String>,
}

impl HardwareRule {
    fn new(class: &str, makes: &[&str], models: &[&str]) -> Self {
        Self {
            class: class.to_string(),
            makes: makes.iter().map(|s| s.to_string()).collect(),
            models: models.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn matches(&self, make: &str, model: &str) -> bool {
        let contains_any = |haystack: &str, needles: &[String]| {
            needles
                .iter()
                .any(|n| haystack.contains(&n.to_ascii_lowercase()))
        };
        let make_ok = self.makes.is_empty() || contains_any(make, &self.makes);
        let model_ok = self.models.is_empty() || contains_any(model, &self.models);
        make_ok && model_ok && !(self.makes.is_empty() && self.models.is_empty())
    }
}

/// Rules shipped with the default configuration. First match wins, so the
/// narrower phone/drone signatures come before the generic camera makers.
pub fn default_rules() -> Vec<HardwareRule> {
    vec![
        HardwareRule::new("drone", &["dji"], &[]),
        HardwareRule::new("action-cam", &["gopro"], &[]),
        HardwareRule::new("phone", &["apple"], &["iphone"]),
        HardwareRule::new("phone", &["samsung"], &["sm-", "galaxy"]),
        HardwareRule::new("phone", &["google"], &["pixel"]),
        HardwareRule::new("phone", &["oneplus", "xiaomi", "huawei", "motorola"], &[]),
        HardwareRule::new("scanner", &["epson", "plustek", "canoscan"], &[]),
        HardwareRule::new(
            "camera",
            &[
                "canon",
                "nikon",
                "sony",
                "fujifilm",
                "olympus",
                "om digital",
                "panasonic",
                "pentax",
                "ricoh",
                "leica",
                "hasselblad",
                "sigma",
            ],
            &[],
        ),
    ]
}

#[derive(Debug, Clone, Default)]
pub struct HardwareTable {
    rules: Vec<HardwareRule>,
}

impl HardwareTable {
    pub fn new(rules: Vec<HardwareRule>) -> Self {
        Self { rules }
    }

    /// Classify a device from its make/model strings.
    pub fn classify(&self, make: Option<&str>, model: Option<&str>) -> Option<String> {
        if make.is_none() && model.is_none() {
            return None;
        }
        let make = make.unwrap_or_default().trim().to_ascii_lowercase();
        let model = model.unwrap_or_default().trim().to_ascii_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&make, &model))
            .map(|rule| rule.class.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> HardwareTable {
        HardwareTable::new(default_rules())
    }

    #[test]
    fn test_phone_before_camera() {
        let t = table();
        assert_eq!(
            t.classify(Some("Apple"), Some("iPhone 13 Pro")),
            Some("phone".to_string())
        );
        assert_eq!(
            t.classify(Some("SAMSUNG"), Some("SM-G991B")),
            Some("phone".to_string())
        );
    }

    #[test]
    fn test_camera_makers() {
        let t = table();
        assert_eq!(
            t.classify(Some("NIKON CORPORATION"), Some("NIKON D750")),
            Some("camera".to_string())
        );
        assert_eq!(t.classify(Some("DJI"), Some("FC3170")), Some("drone".to_string()));
    }

    #[test]
    fn test_unknown_and_missing() {
        let t = table();
        assert_eq!(t.classify(Some("Acme"), Some("Widget")), None);
        assert_eq!(t.classify(None, None), None);
        // Apple without an iPhone model (e.g. a Mac screenshot) is not a phone
        assert_eq!(t.classify(Some("Apple"), Some("MacBook Pro")), None);
    }

    #[test]
    fn test_custom_rules_from_config() {
        let rules: Vec<HardwareRule> = serde_json::from_str(
            r#"[{"class": "film", "makes": ["noritsu"]}, {"class": "any", "models": ["x100"]}]"#,
        )
        .unwrap();
        let t = HardwareTable::new(rules);
        assert_eq!(t.classify(Some("NORITSU KOKI"), None), Some("film".to_string()));
        assert_eq!(t.classify(None, Some("X100V")), Some("any".to_string()));
    }
}
