//! Bridge to the page's `LZString` global.
//!
//! The script may load after the module starts, so availability is probed on
//! every call rather than cached.

use js_sys::{Function, Reflect};
use wasm_bindgen::{JsCast, JsValue};
use wc_storage::{CompressionError, Compressor};

#[derive(Debug, Clone, Copy, Default)]
pub struct LzStringCompressor;

fn library() -> Option<JsValue> {
    Reflect::get(&js_sys::global(), &JsValue::from_str("LZString"))
        .ok()
        .filter(JsValue::is_object)
}

fn call(method: &str, input: &str) -> Result<String, CompressionError> {
    let lz = library().ok_or(CompressionError::Unavailable)?;
    let function: Function = Reflect::get(&lz, &JsValue::from_str(method))
        .ok()
        .and_then(|value| value.dyn_into().ok())
        .ok_or_else(|| CompressionError::Codec(format!("LZString.{method} is missing")))?;

    function
        .call1(&lz, &JsValue::from_str(input))
        .map_err(|err| CompressionError::Codec(format!("LZString.{method} threw: {err:?}")))?
        .as_string()
        .ok_or_else(|| CompressionError::Codec(format!("LZString.{method} returned no string")))
}

impl Compressor for LzStringCompressor {
    fn is_available(&self) -> bool {
        library().is_some()
    }

    fn compress(&self, text: &str) -> Result<String, CompressionError> {
        call("compressToUTF16", text)
    }

    fn decompress(&self, packed: &str) -> Result<String, CompressionError> {
        call("decompressFromUTF16", packed)
    }
}
