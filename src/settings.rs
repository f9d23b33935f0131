//! Settings management
//!
//! Typed schema for the persisted settings blob plus a manager that
//! layers loads, saves, and partial updates over a host-supplied
//! [`SettingsStore`]. Loading merges stored fields over defaults, so a
//! blob written by an older version keeps working after new fields are
//! added.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::providers::{claude, gemini, openai};
use crate::types::{FormatKind, ServiceKind};

/// Token budget applied when the stored settings carry none.
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

/// One stored credential per provider. Unset keys stay empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub openai: String,
    pub gemini: String,
    pub claude: String,
}

impl ApiKeys {
    pub fn get(&self, kind: ServiceKind) -> &str {
        match kind {
            ServiceKind::OpenAi => &self.openai,
            ServiceKind::Gemini => &self.gemini,
            ServiceKind::Claude => &self.claude,
        }
    }

    pub fn set(&mut self, kind: ServiceKind, key: String) {
        match kind {
            ServiceKind::OpenAi => self.openai = key,
            ServiceKind::Gemini => self.gemini = key,
            ServiceKind::Claude => self.claude = key,
        }
    }
}

/// Per-provider model selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectedModels {
    pub openai: String,
    pub gemini: String,
    pub claude: String,
}

impl Default for SelectedModels {
    fn default() -> Self {
        Self {
            openai: openai::models::GPT_3_5_TURBO.to_string(),
            gemini: gemini::models::GEMINI_2_0_FLASH_LITE.to_string(),
            claude: claude::models::CLAUDE_3_5_SONNET.to_string(),
        }
    }
}

impl SelectedModels {
    pub fn get(&self, kind: ServiceKind) -> &str {
        match kind {
            ServiceKind::OpenAi => &self.openai,
            ServiceKind::Gemini => &self.gemini,
            ServiceKind::Claude => &self.claude,
        }
    }

    pub fn set(&mut self, kind: ServiceKind, model: String) {
        match kind {
            ServiceKind::OpenAi => self.openai = model,
            ServiceKind::Gemini => self.gemini = model,
            ServiceKind::Claude => self.claude = model,
        }
    }
}

/// Per-format prompt overrides. Empty means "use the built-in default".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomPrompts {
    pub notes: String,
    pub prose: String,
    pub todo: String,
    pub custom: String,
}

impl CustomPrompts {
    pub fn get(&self, format: FormatKind) -> &str {
        match format {
            FormatKind::Notes => &self.notes,
            FormatKind::Prose => &self.prose,
            FormatKind::Todo => &self.todo,
            FormatKind::Custom => &self.custom,
        }
    }

    pub fn set(&mut self, format: FormatKind, prompt: String) {
        match format {
            FormatKind::Notes => self.notes = prompt,
            FormatKind::Prose => self.prose = prompt,
            FormatKind::Todo => self.todo = prompt,
            FormatKind::Custom => self.custom = prompt,
        }
    }
}

/// Everything the host persists for this crate.
///
/// Every field carries a serde default, which gives the merge-on-load
/// behavior: fields absent from the stored blob deserialize to their
/// default instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormatterSettings {
    pub selected_service: ServiceKind,
    pub api_keys: ApiKeys,
    pub selected_models: SelectedModels,
    pub custom_prompts: CustomPrompts,
    pub max_tokens: u32,
}

impl Default for FormatterSettings {
    fn default() -> Self {
        Self {
            selected_service: ServiceKind::OpenAi,
            api_keys: ApiKeys::default(),
            selected_models: SelectedModels::default(),
            custom_prompts: CustomPrompts::default(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Persistence boundary supplied by the host application.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Returns the stored blob, or `None` when nothing was saved yet.
    async fn load(&self) -> Result<Option<serde_json::Value>, Error>;

    /// Persists the blob, replacing any previous one.
    async fn save(&self, value: serde_json::Value) -> Result<(), Error>;
}

/// In-memory settings state with load/save plumbing on top of a
/// [`SettingsStore`].
pub struct SettingsManager {
    store: Box<dyn SettingsStore>,
    settings: FormatterSettings,
}

impl SettingsManager {
    /// Starts from defaults; call [`load`](Self::load) to pick up
    /// previously persisted state.
    pub fn new(store: Box<dyn SettingsStore>) -> Self {
        Self {
            store,
            settings: FormatterSettings::default(),
        }
    }

    pub async fn load(&mut self) -> Result<(), Error> {
        if let Some(value) = self.store.load().await? {
            self.settings = serde_json::from_value(value).map_err(|err| {
                Error::Configuration(format!("Failed to parse stored settings: {err}"))
            })?;
        }
        Ok(())
    }

    pub async fn save(&self) -> Result<(), Error> {
        let value = serde_json::to_value(&self.settings).map_err(|err| {
            Error::Configuration(format!("Failed to serialize settings: {err}"))
        })?;
        self.store.save(value).await
    }

    pub fn settings(&self) -> &FormatterSettings {
        &self.settings
    }

    /// Applies a partial update: top-level fields present in `patch`
    /// replace the current ones, everything else is kept. Does not
    /// persist; call [`save`](Self::save) afterwards.
    pub fn update(&mut self, patch: serde_json::Value) -> Result<(), Error> {
        let Some(overlay) = patch.as_object() else {
            return Err(Error::Configuration(
                "Settings update must be a JSON object".to_string(),
            ));
        };
        let mut merged = serde_json::to_value(&self.settings).map_err(|err| {
            Error::Configuration(format!("Failed to serialize settings: {err}"))
        })?;
        if let Some(current) = merged.as_object_mut() {
            for (key, value) in overlay {
                current.insert(key.clone(), value.clone());
            }
        }
        self.settings = serde_json::from_value(merged).map_err(|err| {
            Error::Configuration(format!("Failed to parse stored settings: {err}"))
        })?;
        Ok(())
    }

    pub fn api_key(&self, kind: ServiceKind) -> &str {
        self.settings.api_keys.get(kind)
    }

    pub fn set_api_key(&mut self, kind: ServiceKind, key: String) {
        self.settings.api_keys.set(kind, key);
    }

    pub fn selected_model(&self, kind: ServiceKind) -> &str {
        self.settings.selected_models.get(kind)
    }

    pub fn set_selected_model(&mut self, kind: ServiceKind, model: String) {
        self.settings.selected_models.set(kind, model);
    }

    pub fn custom_prompt(&self, format: FormatKind) -> &str {
        self.settings.custom_prompts.get(format)
    }

    pub fn set_custom_prompt(&mut self, format: FormatKind, prompt: String) {
        self.settings.custom_prompts.set(format, prompt);
    }

    /// Whether a credential is stored for the selected provider.
    pub fn is_configured(&self) -> bool {
        !self.api_key(self.settings.selected_service).is_empty()
    }

    /// Model selection for the currently selected provider.
    pub fn current_model(&self) -> &str {
        self.selected_model(self.settings.selected_service)
    }

    pub fn set_current_model(&mut self, model: String) {
        self.set_selected_model(self.settings.selected_service, model);
    }
}
