use serde::{Deserialize, Serialize};

/// Immutable configuration injected into the assembler and validator.
///
/// Keeping the schema identifiers and country allowlist here (instead of
/// constants at the use sites) lets alternate profiles and tests swap them
/// without recompilation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacturaeConfig {
    /// Facturae schema version written to the file header (e.g. "3.2.2").
    pub schema_version: String,
    /// Facturae namespace URI matching the schema version.
    pub namespace: String,
    /// ISO 4217 invoice currency (e.g. "EUR").
    pub currency: String,
    /// ISO 639-1 document language (e.g. "es").
    pub language: String,
    /// Default series prefix for allocated invoice numbers.
    pub series_prefix: String,
    /// ISO 3166-1 alpha-3 country codes accepted for party addresses.
    pub country_allowlist: Vec<String>,
}

impl Default for FacturaeConfig {
    fn default() -> Self {
        Self {
            schema_version: "3.2.2".into(),
            namespace: "http://www.facturae.gob.es/formato/Versiones/Facturaev3_2_2.xml".into(),
            currency: "EUR".into(),
            language: "es".into(),
            series_prefix: "FAC".into(),
            country_allowlist: vec![
                "ESP".into(),
                "PRT".into(),
                "FRA".into(),
                "DEU".into(),
                "ITA".into(),
                "AND".into(),
                "GBR".into(),
                "USA".into(),
            ],
        }
    }
}

impl FacturaeConfig {
    pub fn is_allowed_country(&self, code: &str) -> bool {
        self.country_allowlist.iter().any(|c| c == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_targets_spain() {
        let config = FacturaeConfig::default();
        assert_eq!(config.schema_version, "3.2.2");
        assert_eq!(config.currency, "EUR");
        assert!(config.is_allowed_country("ESP"));
        assert!(!config.is_allowed_country("XXX"));
    }

    #[test]
    fn allowlist_is_swappable() {
        let config = FacturaeConfig {
            country_allowlist: vec!["MEX".into()],
            ..FacturaeConfig::default()
        };
        assert!(config.is_allowed_country("MEX"));
        assert!(!config.is_allowed_country("ESP"));
    }
}
