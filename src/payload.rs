//! Payload converters chosen per subscription at registration time.
//!
//! A converter turns raw publish bytes into the application's payload type.
//! The registry stores converters type-erased as [`ConverterHandle`], so
//! subscriptions with different payload types share one table.

use crate::error::{Result, SubscriptionError};
use crate::types::PayloadType;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Converts between raw message bytes and a typed payload.
pub trait PayloadConverter: Send + Sync + 'static {
    /// Application-level payload type.
    type Payload: Send + 'static;

    fn convert_from_bytes(&self, bytes: &[u8]) -> Result<Self::Payload>;

    fn convert_to_bytes(&self, payload: &Self::Payload) -> Result<Vec<u8>>;
}

type DecodeFn = dyn Fn(&[u8]) -> Result<Box<dyn Any + Send>> + Send + Sync;

/// Type-erased decoder plus the descriptor of the type it produces.
#[derive(Clone)]
pub struct ConverterHandle {
    payload_type: PayloadType,
    decode: Arc<DecodeFn>,
}

impl ConverterHandle {
    /// Erase a concrete converter.
    pub fn new<C: PayloadConverter>(converter: C) -> Self {
        let decode = move |bytes: &[u8]| -> Result<Box<dyn Any + Send>> {
            let payload = converter.convert_from_bytes(bytes)?;
            Ok(Box::new(payload))
        };
        Self {
            payload_type: PayloadType::of::<C::Payload>(),
            decode: Arc::new(decode),
        }
    }

    pub fn payload_type(&self) -> PayloadType {
        self.payload_type
    }

    /// Decode without knowing the payload type statically.
    pub fn decode_any(&self, bytes: &[u8]) -> Result<Box<dyn Any + Send>> {
        (self.decode)(bytes)
    }

    /// Decode into `T`, which must match the registered payload type.
    pub fn decode<T: 'static>(&self, bytes: &[u8]) -> Result<T> {
        if !self.payload_type.is::<T>() {
            return Err(self.mismatch::<T>());
        }
        let boxed = self.decode_any(bytes)?;
        boxed
            .downcast::<T>()
            .map(|b| *b)
            .map_err(|_| self.mismatch::<T>())
    }

    fn mismatch<T: 'static>(&self) -> SubscriptionError {
        SubscriptionError::PayloadTypeMismatch {
            expected: self.payload_type.name(),
            requested: std::any::type_name::<T>(),
        }
    }
}

impl fmt::Debug for ConverterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterHandle")
            .field("payload_type", &self.payload_type.name())
            .finish()
    }
}

/// 7-bit ASCII text payloads.
#[derive(Clone, Copy, Debug, Default)]
pub struct AsciiPayloadConverter;

impl PayloadConverter for AsciiPayloadConverter {
    type Payload = String;

    fn convert_from_bytes(&self, bytes: &[u8]) -> Result<String> {
        if let Some(pos) = bytes.iter().position(|b| !b.is_ascii()) {
            return Err(SubscriptionError::Conversion(format!(
                "non-ASCII byte 0x{:02x} at offset {}",
                bytes[pos], pos
            )));
        }
        // All bytes are ASCII, hence valid UTF-8.
        Ok(bytes.iter().map(|&b| b as char).collect())
    }

    fn convert_to_bytes(&self, payload: &String) -> Result<Vec<u8>> {
        if !payload.is_ascii() {
            return Err(SubscriptionError::Conversion(
                "payload contains non-ASCII characters".to_string(),
            ));
        }
        Ok(payload.as_bytes().to_vec())
    }
}

/// UTF-8 text payloads.
#[derive(Clone, Copy, Debug, Default)]
pub struct Utf8PayloadConverter;

impl PayloadConverter for Utf8PayloadConverter {
    type Payload = String;

    fn convert_from_bytes(&self, bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec()).map_err(|e| SubscriptionError::Conversion(e.to_string()))
    }

    fn convert_to_bytes(&self, payload: &String) -> Result<Vec<u8>> {
        Ok(payload.as_bytes().to_vec())
    }
}

/// Raw bytes, untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassThroughPayloadConverter;

impl PayloadConverter for PassThroughPayloadConverter {
    type Payload = Vec<u8>;

    fn convert_from_bytes(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }

    fn convert_to_bytes(&self, payload: &Vec<u8>) -> Result<Vec<u8>> {
        Ok(payload.clone())
    }
}

/// JSON payloads deserialized into `T`.
pub struct JsonPayloadConverter<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonPayloadConverter<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonPayloadConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonPayloadConverter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsonPayloadConverter<{}>", std::any::type_name::<T>())
    }
}

impl<T> PayloadConverter for JsonPayloadConverter<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    type Payload = T;

    fn convert_from_bytes(&self, bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn convert_to_bytes(&self, payload: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(payload)?)
    }
}
