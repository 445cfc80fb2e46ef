use fskwave_core::{
    AudioBlock, DecodeMode, Demodulator, FrameReceiver, ModemConfig, Modulator, LEGACY_FREQ_ZERO,
};
use wasm_bindgen::prelude::*;

fn to_js(err: fskwave_core::ModemError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn float_to_pcm(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)
        .collect()
}

fn config_for(legacy: bool) -> ModemConfig {
    let mut config = ModemConfig::default();
    if legacy {
        config.freq_zero = LEGACY_FREQ_ZERO;
    }
    config
}

#[wasm_bindgen]
pub struct WasmEncoder {
    inner: Modulator,
}

#[wasm_bindgen]
impl WasmEncoder {
    /// `legacy` selects the historical 20 kHz bit-0 tone
    #[wasm_bindgen(constructor)]
    pub fn new(legacy: bool) -> Result<WasmEncoder, JsValue> {
        Modulator::new(config_for(legacy))
            .map(|inner| WasmEncoder { inner })
            .map_err(to_js)
    }

    #[wasm_bindgen(getter, js_name = sampleRate)]
    pub fn sample_rate(&self) -> u32 {
        self.inner.config().sample_rate
    }

    /// Encode a payload to 16-bit PCM (Int16Array)
    pub fn encode(&self, data: &[u8]) -> Vec<i16> {
        self.inner.encode_samples(data)
    }

    /// Encode a payload to Web Audio samples in [-1, 1] (Float32Array)
    #[wasm_bindgen(js_name = encodeFloat)]
    pub fn encode_float(&self, data: &[u8]) -> Vec<f32> {
        self.inner
            .encode_samples(data)
            .into_iter()
            .map(|s| s as f32 / i16::MAX as f32)
            .collect()
    }
}

#[wasm_bindgen]
pub struct WasmDecoder {
    inner: Demodulator,
}

#[wasm_bindgen]
impl WasmDecoder {
    /// `strict` reports missing markers as errors instead of returning partial data
    #[wasm_bindgen(constructor)]
    pub fn new(legacy: bool, strict: bool) -> Result<WasmDecoder, JsValue> {
        let mode = if strict {
            DecodeMode::Strict
        } else {
            DecodeMode::Lenient
        };
        Demodulator::new(config_for(legacy))
            .map(|demodulator| WasmDecoder {
                inner: demodulator.with_mode(mode),
            })
            .map_err(to_js)
    }

    /// Decode a complete 16-bit PCM recording
    pub fn decode(&mut self, samples: &[i16]) -> Result<Vec<u8>, JsValue> {
        self.inner.decode_samples(samples).map_err(to_js)
    }

    /// Decode a complete Web Audio recording
    #[wasm_bindgen(js_name = decodeFloat)]
    pub fn decode_float(&mut self, samples: &[f32]) -> Result<Vec<u8>, JsValue> {
        self.inner
            .decode_samples(&float_to_pcm(samples))
            .map_err(to_js)
    }
}

/// Incremental decoder for microphone chunks of any length.
///
/// Samples are buffered into symbol-length blocks and fed through the frame state
/// machine as they complete. There is no symbol timing recovery: the stream must
/// start on a block boundary of the transmission.
#[wasm_bindgen]
pub struct WasmReceiver {
    demodulator: Demodulator,
    receiver: FrameReceiver,
    pending: Vec<i16>,
}

#[wasm_bindgen]
impl WasmReceiver {
    #[wasm_bindgen(constructor)]
    pub fn new(legacy: bool) -> Result<WasmReceiver, JsValue> {
        let demodulator = Demodulator::new(config_for(legacy)).map_err(to_js)?;
        let receiver = demodulator.receiver();
        Ok(WasmReceiver {
            demodulator,
            receiver,
            pending: Vec::new(),
        })
    }

    /// Feed Web Audio samples; returns true once a complete frame has been received
    ///
    /// Once complete, further samples are discarded until `reset`.
    pub fn push(&mut self, samples: &[f32]) -> bool {
        if self.receiver.is_complete() {
            return true;
        }
        self.pending.extend(float_to_pcm(samples));
        let block_len = self.demodulator.config().samples_per_symbol();

        let mut consumed = 0;
        while self.pending.len() - consumed >= block_len && !self.receiver.is_complete() {
            let block = AudioBlock::new(self.pending[consumed..consumed + block_len].to_vec());
            consumed += block_len;

            let frequency = self.demodulator.classify(&block);
            self.receiver.push(frequency);
        }
        if self.receiver.is_complete() {
            self.pending.clear();
            return true;
        }
        self.pending.drain(..consumed);
        false
    }

    #[wasm_bindgen(getter)]
    pub fn synchronized(&self) -> bool {
        self.receiver.is_synchronized()
    }

    /// Bytes decoded so far (complete bytes only)
    pub fn bytes(&self) -> Vec<u8> {
        self.receiver.bytes()
    }

    /// Drop all state and search for the next frame
    pub fn reset(&mut self) {
        self.receiver.reset();
        self.pending.clear();
    }
}
