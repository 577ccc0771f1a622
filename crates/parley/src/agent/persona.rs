//! Personas and system-prompt resolution.
//!
//! A persona is a named behavioral profile: the system prompt the model is
//! primed with, plus permission labels (capabilities, allowed tool names)
//! and a context-length hint. The catalog also carries the defaults block
//! (fallback persona, session timeout) and validation thresholds that the
//! pipeline reads.
//!
//! Resolution is total: an unrecognized user type resolves to the catalog's
//! fallback persona rather than failing. Resolution is pure — same input,
//! same output, no side effects.
//!
//! Catalogs are external data. The built-in catalog covers `customer`,
//! `support_agent`, and `manager`; richer sets load from YAML:
//!
//! ```yaml
//! personas:
//!   customer:
//!     display_name: Customer
//!     capabilities: [general_questions, order_status]
//!     allowed_tools: [faq_search]
//!     prompt: "You are a helpful AI assistant for customers."
//!     context_length: 4096
//! defaults:
//!   fallback_persona: customer
//!   session_timeout_secs: 86400
//! validation:
//!   max_input_chars: 5000
//! ```

use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

// ── Persona ────────────────────────────────────────────────────────

/// A named behavioral profile.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Persona {
    /// Catalog key. Filled from the map key when loading a file.
    #[serde(default)]
    pub name: String,
    /// Human-readable label.
    #[serde(default)]
    pub display_name: String,
    /// Capability labels. Informational — nothing here enforces them.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Tool names this persona is permitted. Labels only, no enforcement.
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    /// System prompt establishing tone, scope, and depth.
    pub prompt: String,
    /// Context-length hint in tokens.
    #[serde(default = "default_context_length")]
    pub context_length: u32,
}

fn default_context_length() -> u32 {
    4096
}

/// Last-resort persona if a catalog somehow has no usable entries. Keeps
/// resolution total without a panic path.
static GENERIC_PERSONA: LazyLock<Persona> = LazyLock::new(|| Persona {
    name: "assistant".into(),
    display_name: "Assistant".into(),
    capabilities: Vec::new(),
    allowed_tools: Vec::new(),
    prompt: "You are a helpful AI assistant. Be clear, accurate, and concise.".into(),
    context_length: default_context_length(),
});

// ── Catalog blocks ─────────────────────────────────────────────────

/// Defaults block of a catalog.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct CatalogDefaults {
    /// Persona used when a user type is not recognized.
    pub fallback_persona: String,
    /// Threshold hint for persona auto-detection layers built on top.
    pub confidence_threshold: f64,
    /// Idle time after which a session is eligible for the expiry sweep.
    pub session_timeout_secs: u64,
    /// Advisory cap on turns per session.
    pub max_turns: u32,
}

impl Default for CatalogDefaults {
    fn default() -> Self {
        Self {
            fallback_persona: "customer".into(),
            confidence_threshold: 0.7,
            session_timeout_secs: 86_400,
            max_turns: 50,
        }
    }
}

/// Validation thresholds of a catalog.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ValidationLimits {
    /// Maximum accepted user-message length, in characters. Longer input is
    /// rejected, never truncated.
    pub max_input_chars: usize,
    /// Advisory cap on reply length.
    pub max_output_chars: usize,
    /// Advisory requests-per-minute figure for outer surfaces.
    pub rate_limit_per_minute: u32,
    /// Maximum accepted session-id length, in characters.
    pub max_session_id_chars: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_input_chars: 5_000,
            max_output_chars: 8_000,
            rate_limit_per_minute: 100,
            max_session_id_chars: 128,
        }
    }
}

// ── PersonaCatalog ─────────────────────────────────────────────────

/// The set of known personas plus defaults and validation thresholds.
#[derive(Clone, Debug)]
pub struct PersonaCatalog {
    personas: HashMap<String, Persona>,
    pub defaults: CatalogDefaults,
    pub limits: ValidationLimits,
}

/// On-disk shape of a catalog file.
#[derive(Deserialize)]
struct CatalogFile {
    personas: HashMap<String, Persona>,
    #[serde(default)]
    defaults: CatalogDefaults,
    #[serde(default, rename = "validation")]
    limits: ValidationLimits,
}

impl Default for PersonaCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PersonaCatalog {
    /// The built-in three-persona catalog.
    pub fn builtin() -> Self {
        let mut personas = HashMap::new();
        for persona in [
            Persona {
                name: "customer".into(),
                display_name: "Customer".into(),
                capabilities: vec![
                    "general_questions".into(),
                    "order_status".into(),
                    "product_info".into(),
                ],
                allowed_tools: vec!["faq_search".into(), "order_lookup".into()],
                prompt: "You are a helpful AI assistant for customers. Be friendly, \
                         clear, and helpful in solving their needs."
                    .into(),
                context_length: 4096,
            },
            Persona {
                name: "support_agent".into(),
                display_name: "Support Agent".into(),
                capabilities: vec![
                    "ticket_triage".into(),
                    "troubleshooting".into(),
                    "escalation".into(),
                ],
                allowed_tools: vec![
                    "ticket_search".into(),
                    "kb_search".into(),
                    "customer_lookup".into(),
                ],
                prompt: "You are an AI assistant for support agents. Provide detailed, \
                         accurate information to help resolve customer issues."
                    .into(),
                context_length: 8192,
            },
            Persona {
                name: "manager".into(),
                display_name: "Manager".into(),
                capabilities: vec!["reporting".into(), "analytics".into(), "team_overview".into()],
                allowed_tools: vec!["metrics_dashboard".into(), "report_generator".into()],
                prompt: "You are an AI assistant for managers. Provide strategic insights \
                         and data-driven recommendations."
                    .into(),
                context_length: 8192,
            },
        ] {
            personas.insert(persona.name.clone(), persona);
        }

        Self {
            personas,
            defaults: CatalogDefaults::default(),
            limits: ValidationLimits::default(),
        }
    }

    /// Load a catalog from a YAML file.
    ///
    /// Fails on unreadable or unparseable files, an empty persona set, or a
    /// declared fallback persona that the file does not define — catching
    /// the latter at load time is what keeps [`resolve`](Self::resolve)
    /// total afterwards.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_yaml_str(&text, &path.display().to_string())?;
        debug!(
            "loaded persona catalog from {} ({} personas)",
            path.display(),
            catalog.len()
        );
        Ok(catalog)
    }

    /// Parse a catalog from YAML text. `origin` labels parse errors.
    pub fn from_yaml_str(text: &str, origin: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            serde_yaml::from_str(text).map_err(|source| CatalogError::Parse {
                path: origin.to_string(),
                source,
            })?;

        if file.personas.is_empty() {
            return Err(CatalogError::Empty);
        }
        if !file.personas.contains_key(&file.defaults.fallback_persona) {
            return Err(CatalogError::MissingFallback(
                file.defaults.fallback_persona.clone(),
            ));
        }

        let personas = file
            .personas
            .into_iter()
            .map(|(name, mut persona)| {
                persona.name = name.clone();
                if persona.display_name.is_empty() {
                    persona.display_name = name.clone();
                }
                (name, persona)
            })
            .collect();

        Ok(Self {
            personas,
            defaults: file.defaults,
            limits: file.limits,
        })
    }

    // ── Resolution ─────────────────────────────────────────────────

    /// Resolve a user-type label to its persona. Total: unknown labels get
    /// the fallback persona. Pure: no state, no side effects.
    pub fn resolve(&self, user_type: &str) -> &Persona {
        self.personas
            .get(user_type.trim())
            .or_else(|| self.personas.get(&self.defaults.fallback_persona))
            .or_else(|| self.personas.values().next())
            .unwrap_or(&GENERIC_PERSONA)
    }

    /// System prompt for a user type (resolved through the fallback rules).
    pub fn system_prompt(&self, user_type: &str) -> &str {
        &self.resolve(user_type).prompt
    }

    /// Whether a label names a persona directly (no fallback applied).
    pub fn is_known(&self, user_type: &str) -> bool {
        self.personas.contains_key(user_type.trim())
    }

    pub fn get(&self, name: &str) -> Option<&Persona> {
        self.personas.get(name)
    }

    /// Persona names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.personas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_personas_resolve() {
        let catalog = PersonaCatalog::builtin();
        assert!(
            catalog
                .system_prompt("customer")
                .contains("helpful AI assistant for customers")
        );
        assert!(
            catalog
                .system_prompt("support_agent")
                .contains("AI assistant for support agents")
        );
        assert!(
            catalog
                .system_prompt("manager")
                .contains("AI assistant for managers")
        );
    }

    #[test]
    fn unknown_user_type_falls_back() {
        let catalog = PersonaCatalog::builtin();
        let persona = catalog.resolve("space_pirate");
        assert_eq!(persona.name, "customer");
        assert!(!catalog.is_known("space_pirate"));
    }

    #[test]
    fn resolution_is_pure() {
        let catalog = PersonaCatalog::builtin();
        assert_eq!(
            catalog.system_prompt("manager"),
            catalog.system_prompt("manager")
        );
        assert_eq!(
            catalog.system_prompt("whatever"),
            catalog.system_prompt("whatever")
        );
    }

    #[test]
    fn labels_are_trimmed() {
        let catalog = PersonaCatalog::builtin();
        assert_eq!(catalog.resolve("  manager ").name, "manager");
    }

    #[test]
    fn yaml_catalog_roundtrip() {
        let yaml = r#"
personas:
  researcher:
    display_name: Researcher
    capabilities: [literature_search]
    allowed_tools: [web_search, citation_lookup]
    prompt: "You are a research assistant. Cite sources."
    context_length: 16384
  customer:
    prompt: "You are a storefront assistant."
defaults:
  fallback_persona: customer
  session_timeout_secs: 3600
validation:
  max_input_chars: 2000
"#;
        let catalog = PersonaCatalog::from_yaml_str(yaml, "inline").unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.names(), vec!["customer", "researcher"]);

        let researcher = catalog.get("researcher").unwrap();
        assert_eq!(researcher.name, "researcher");
        assert_eq!(researcher.context_length, 16384);
        assert_eq!(researcher.allowed_tools.len(), 2);

        // Missing display_name falls back to the key; missing context_length
        // gets the default.
        let customer = catalog.get("customer").unwrap();
        assert_eq!(customer.display_name, "customer");
        assert_eq!(customer.context_length, 4096);

        assert_eq!(catalog.defaults.session_timeout_secs, 3600);
        assert_eq!(catalog.limits.max_input_chars, 2000);
        // Unspecified limits keep their defaults.
        assert_eq!(catalog.limits.max_output_chars, 8000);
    }

    #[test]
    fn yaml_missing_fallback_is_rejected() {
        let yaml = r#"
personas:
  researcher:
    prompt: "You are a research assistant."
defaults:
  fallback_persona: customer
"#;
        let err = PersonaCatalog::from_yaml_str(yaml, "inline").unwrap_err();
        assert!(matches!(err, CatalogError::MissingFallback(name) if name == "customer"));
    }

    #[test]
    fn yaml_empty_personas_rejected() {
        let err = PersonaCatalog::from_yaml_str("personas: {}", "inline").unwrap_err();
        assert!(matches!(err, CatalogError::Empty));
    }

    #[test]
    fn yaml_file_loading() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "personas:\n  customer:\n    prompt: \"Storefront assistant.\""
        )
        .unwrap();

        let catalog = PersonaCatalog::from_yaml_file(file.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.system_prompt("anyone"), "Storefront assistant.");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = PersonaCatalog::from_yaml_file("/nonexistent/personas.yaml").unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }
}
