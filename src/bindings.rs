//! Browser surface: a thin `wasm-bindgen` wrapper around [`StudySession`].
//!
//! Intents go in and events come out as plain JS objects, in the same
//! tagged shape as their serde form:
//!
//! ```javascript
//! const app = new FlashcardApp({ seed: 7 });
//! const bytes = await readFile(input.files[0]);
//! render(app.load(input.files[0].name, bytes));
//! render(app.dispatch({ type: "startStudy", startRow: 2, endRow: 40, shuffle: true }));
//! ```

use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use crate::session::{Intent, SessionConfig, StudySession};

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {e}")))
}

/// Read a picked file into bytes for [`FlashcardApp::load`].
///
/// # Errors
/// Returns the rejection of `Blob.arrayBuffer()`.
#[wasm_bindgen(js_name = "readFile")]
pub async fn read_file(file: web_sys::File) -> Result<js_sys::Uint8Array, JsValue> {
    let buffer = JsFuture::from(file.array_buffer()).await?;
    Ok(js_sys::Uint8Array::new(&buffer))
}

/// One study session, owned by the page.
#[wasm_bindgen]
pub struct FlashcardApp {
    session: StudySession,
}

#[wasm_bindgen]
impl FlashcardApp {
    /// `config` is `undefined` or `{ seed?: number }`.
    ///
    /// # Errors
    /// Returns an error if `config` has the wrong shape.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<FlashcardApp, JsValue> {
        console_error_panic_hook::set_once();
        let config: SessionConfig = if config.is_undefined() || config.is_null() {
            SessionConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsValue::from_str(&format!("Invalid config: {e}")))?
        };
        Ok(Self {
            session: StudySession::new(config),
        })
    }

    /// Decode a workbook. Returns the resulting events; a bad file yields a
    /// single `loadFailed` event rather than an exception.
    ///
    /// # Errors
    /// Returns an error only if the events cannot be serialised.
    #[wasm_bindgen]
    pub fn load(&mut self, name: &str, data: &[u8]) -> Result<JsValue, JsValue> {
        to_js(&self.session.load(name, data))
    }

    /// # Errors
    /// Returns an error if `intent` is not a known intent object.
    #[wasm_bindgen]
    pub fn dispatch(&mut self, intent: JsValue) -> Result<JsValue, JsValue> {
        let intent: Intent = serde_wasm_bindgen::from_value(intent)
            .map_err(|e| JsValue::from_str(&format!("Invalid intent: {e}")))?;
        to_js(&self.session.dispatch(intent))
    }

    /// Forward a `KeyboardEvent.key`. Returns an empty array for keys that
    /// are not shortcuts, so the caller knows not to `preventDefault`.
    ///
    /// # Errors
    /// Returns an error only if the events cannot be serialised.
    #[wasm_bindgen(js_name = "handleKey")]
    pub fn handle_key(&mut self, key: &str) -> Result<JsValue, JsValue> {
        to_js(&self.session.handle_key(key))
    }

    /// # Errors
    /// Returns an error only if the stats cannot be serialised.
    #[wasm_bindgen]
    pub fn stats(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.stats())
    }

    /// # Errors
    /// Returns an error only if the card cannot be serialised.
    #[wasm_bindgen(js_name = "currentCard")]
    pub fn current_card(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.current_card())
    }

    /// # Errors
    /// Returns an error only if the phase cannot be serialised.
    #[wasm_bindgen]
    pub fn phase(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.phase())
    }

    #[wasm_bindgen(getter, js_name = "showingAnswer")]
    pub fn showing_answer(&self) -> bool {
        self.session.showing_answer()
    }
}
