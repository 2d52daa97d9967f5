//! User provider: session and device hints. Never echoes user content.

use super::{priority, ContextProvider};
use crate::error::ProviderError;
use crate::types::{ContextBuildOptions, ContextFragment, ContextType, FragmentKind};
use async_trait::async_trait;

const ID_PREFIX_CHARS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceClass {
    pub fn from_width(width: u32) -> Self {
        match width {
            0..=767 => DeviceClass::Mobile,
            768..=1023 => DeviceClass::Tablet,
            _ => DeviceClass::Desktop,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Mobile => "Mobile",
            DeviceClass::Tablet => "Tablet",
            DeviceClass::Desktop => "Desktop",
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UserProvider;

impl UserProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContextProvider for UserProvider {
    fn name(&self) -> &str {
        "user"
    }

    fn priority(&self) -> i32 {
        priority::USER
    }

    fn should_include(&self, _context_type: &ContextType) -> bool {
        true
    }

    async fn get_context(
        &self,
        options: &ContextBuildOptions,
    ) -> Result<Option<ContextFragment>, ProviderError> {
        let Some(user_id) = options.user() else {
            return Ok(None);
        };

        let prefix: String = user_id.chars().take(ID_PREFIX_CHARS).collect();
        let mut lines = vec![format!("- User: {}...", prefix)];

        if let Some(metadata) = options.metadata() {
            if let Some(ms) = metadata.session_duration {
                lines.push(format!("- Session duration: {} min", ms / 60_000));
            }
            if let Some(viewport) = metadata.viewport {
                lines.push(format!(
                    "- Device: {} ({}x{})",
                    DeviceClass::from_width(viewport.width).as_str(),
                    viewport.width,
                    viewport.height
                ));
            }
            if let Some(platform) = &metadata.platform {
                match (platform.browser.as_deref(), platform.os.as_deref()) {
                    (Some(browser), Some(os)) => lines.push(format!("- Browser: {} on {}", browser, os)),
                    (Some(browser), None) => lines.push(format!("- Browser: {}", browser)),
                    (None, Some(os)) => lines.push(format!("- OS: {}", os)),
                    (None, None) => {}
                }
            }
            if let Some(timezone) = metadata.timezone() {
                lines.push(format!("- Timezone: {}", timezone));
            }
            if let Some(language) = metadata.language() {
                lines.push(format!("- Language: {}", language));
            }
        }

        let content = format!("## USER CONTEXT\n{}", lines.join("\n"));
        Ok(Some(ContextFragment::new(FragmentKind::User, content, self.priority())))
    }
}
