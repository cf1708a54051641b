use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page;

use crate::config::FingerprintSection;

use super::error::{BrowserError, BrowserResult};

const WEBDRIVER_MASK: &str = r#"
(() => {
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
})();
"#;

const PLUGIN_MASK: &str = r#"
(() => {
    const fakePlugins = [
        { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer' },
        { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai' },
        { name: 'Native Client', filename: 'internal-nacl-plugin' },
    ];
    Object.defineProperty(navigator, 'plugins', { get: () => fakePlugins });
    if (!window.chrome) {
        window.chrome = { runtime: {} };
    }
})();
"#;

/// Scripts injected ahead of any page script so storefront bot checks see a
/// regular browser.
#[derive(Debug, Clone)]
pub struct FingerprintMasker {
    config: FingerprintSection,
}

impl FingerprintMasker {
    pub fn new(config: FingerprintSection) -> Self {
        Self { config }
    }

    pub fn scripts(&self) -> Vec<String> {
        let mut scripts = Vec::new();
        if self.config.mask_webdriver {
            scripts.push(WEBDRIVER_MASK.to_string());
        }
        if self.config.mask_plugins {
            scripts.push(PLUGIN_MASK.to_string());
        }
        if self.config.enable_webgl_mask {
            scripts.push(self.webgl_script());
        }
        scripts
    }

    pub async fn apply(&self, page: &Page) -> BrowserResult<()> {
        for script in self.scripts() {
            page.evaluate_on_new_document(
                AddScriptToEvaluateOnNewDocumentParams::builder()
                    .source(script)
                    .build()
                    .map_err(BrowserError::Configuration)?,
            )
            .await?;
        }
        Ok(())
    }

    fn webgl_script(&self) -> String {
        let vendor = self
            .config
            .webgl_vendor
            .clone()
            .unwrap_or_else(|| "Intel Inc.".to_string());
        let renderer = self
            .config
            .webgl_renderer
            .clone()
            .unwrap_or_else(|| "Intel Iris OpenGL Engine".to_string());
        format!(
            r#"
            (() => {{
                const spoofParam = (proto) => {{
                    if (!proto || !proto.getParameter) {{
                        return;
                    }}
                    const original = proto.getParameter;
                    proto.getParameter = function(param) {{
                        if (param === 37445) {{
                            return '{vendor}';
                        }}
                        if (param === 37446) {{
                            return '{renderer}';
                        }}
                        return original.apply(this, arguments);
                    }};
                }};
                spoofParam(WebGLRenderingContext?.prototype);
                spoofParam(WebGL2RenderingContext?.prototype);
            }})();
            "#
        )
    }
}
