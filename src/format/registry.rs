//! The format registry: format id -> reader/writer pair plus hook tables.

use std::sync::Arc;

use bytes::BytesMut;

use super::hooks::{DecodeContext, EncodeContext, Hooks};
use super::{Context, FormatId, Reader, Writer};
use crate::bplist::{BplistReader, BplistWriter};
use crate::config::CodecConfig;
use crate::error::ObjectError;
use crate::tbo::{TboReader, TboWriter};
use crate::types::Value;

/// Number of leading bytes a reader's probe may look at.
pub const PROBE_PREFIX: usize = 8;

struct Entry {
    id: FormatId,
    reader: Arc<dyn Reader>,
    writer: Arc<dyn Writer>,
    hooks: Hooks,
}

/// Maps format ids to codecs.
///
/// Registration is a setup-time activity that needs `&mut self`; once built,
/// a registry can be shared (e.g. in an `Arc`) and read from any number of
/// threads.
pub struct Registry {
    entries: Vec<Entry>,
    config: CodecConfig,
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Registry {
    /// Creates an empty registry.
    pub fn new(config: CodecConfig) -> Self {
        Self {
            entries: Vec::new(),
            config,
        }
    }

    /// Creates a registry with the built-in formats and default limits.
    pub fn with_defaults() -> Self {
        Self::with_config(CodecConfig::default())
    }

    /// Creates a registry with the built-in formats installed, in probe
    /// order: bin, bplist, then json when that feature is enabled.
    pub fn with_config(config: CodecConfig) -> Self {
        let mut registry = Self::new(config);
        registry.register(FormatId::Bin, TboReader, TboWriter);
        registry.register(FormatId::Bplist, BplistReader, BplistWriter);
        #[cfg(feature = "json")]
        registry.register(
            FormatId::Json,
            crate::json::JsonReader,
            crate::json::JsonWriter,
        );
        registry
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Installs a reader/writer pair. Replacing an existing id drops its
    /// hooks but keeps its probe position.
    pub fn register(
        &mut self,
        id: FormatId,
        reader: impl Reader + 'static,
        writer: impl Writer + 'static,
    ) {
        let entry = Entry {
            id,
            reader: Arc::new(reader),
            writer: Arc::new(writer),
            hooks: Hooks::default(),
        };
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(slot) => {
                tracing::debug!(format = %id, "replacing registered format");
                *slot = entry;
            }
            None => {
                tracing::debug!(format = %id, "registering format");
                self.entries.push(entry);
            }
        }
    }

    /// Removes a format and its hooks. Returns whether it was registered.
    pub fn unregister(&mut self, id: FormatId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before != self.entries.len()
    }

    pub fn is_registered(&self, id: FormatId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Registered format ids in probe order.
    pub fn formats(&self) -> Vec<FormatId> {
        self.entries.iter().map(|e| e.id).collect()
    }

    fn entry(&self, id: FormatId) -> Result<&Entry, ObjectError> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .ok_or(ObjectError::FormatNotRegistered(id))
    }

    fn entry_mut(&mut self, id: FormatId) -> Result<&mut Entry, ObjectError> {
        self.entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(ObjectError::FormatNotRegistered(id))
    }

    /// Installs a decode hook for wire tag `tag` of format `id`.
    pub fn reader_hook<F>(&mut self, id: FormatId, tag: u8, hook: F) -> Result<(), ObjectError>
    where
        F: Fn(&mut DecodeContext<'_, '_>) -> Result<Value, ObjectError> + Send + Sync + 'static,
    {
        let entry = self.entry_mut(id)?;
        if !entry.reader.accepts_hook(tag) {
            return Err(ObjectError::Registry(format!(
                "{id} reader does not accept a hook for tag 0x{tag:02X}"
            )));
        }
        entry.hooks.set_decoder(tag, Arc::new(hook));
        Ok(())
    }

    /// Installs an encode hook for user kind `tag` of format `id`.
    pub fn writer_hook<F>(&mut self, id: FormatId, tag: u8, hook: F) -> Result<(), ObjectError>
    where
        F: Fn(&mut EncodeContext<'_>, &Value) -> Result<(), ObjectError> + Send + Sync + 'static,
    {
        let entry = self.entry_mut(id)?;
        if !entry.writer.accepts_hook(tag) {
            return Err(ObjectError::Registry(format!(
                "{id} writer does not accept a hook for tag 0x{tag:02X}"
            )));
        }
        entry.hooks.set_encoder(tag, Arc::new(hook));
        Ok(())
    }

    /// Scores `data` against every reader; the highest non-zero score wins
    /// and ties go to the earliest registration.
    pub fn probe(&self, data: &[u8]) -> Option<(FormatId, u32)> {
        let prefix = &data[..data.len().min(PROBE_PREFIX)];
        let mut best: Option<(FormatId, u32)> = None;
        for entry in &self.entries {
            let score = entry.reader.probe(prefix);
            tracing::trace!(format = %entry.id, score, "probe");
            if score > 0 && best.is_none_or(|(_, s)| score > s) {
                best = Some((entry.id, score));
            }
        }
        best
    }

    /// Decodes `data` as format `id`.
    pub fn read(&self, data: &[u8], id: FormatId) -> Result<Value, ObjectError> {
        let entry = self.entry(id)?;
        let cx = Context {
            config: &self.config,
            hooks: &entry.hooks,
        };
        entry.reader.read(data, cx).inspect_err(|e| {
            tracing::debug!(format = %id, error = %e, "decode failed");
        })
    }

    /// Detects the format of `data` and decodes it.
    pub fn read_auto(&self, data: &[u8]) -> Result<Value, ObjectError> {
        let (id, score) = self.probe(data).ok_or(ObjectError::UnknownFormat)?;
        tracing::debug!(format = %id, score, "detected format");
        self.read(data, id)
    }

    /// Appends the encoding of `value` in format `id` to `buf`.
    pub fn write(
        &self,
        value: &Value,
        buf: &mut BytesMut,
        id: FormatId,
    ) -> Result<usize, ObjectError> {
        let entry = self.entry(id)?;
        let cx = Context {
            config: &self.config,
            hooks: &entry.hooks,
        };
        entry.writer.write(buf, value, cx).inspect_err(|e| {
            tracing::debug!(format = %id, error = %e, "encode failed");
        })
    }

    /// Encodes `value` into a fresh buffer.
    pub fn to_bytes(&self, value: &Value, id: FormatId) -> Result<BytesMut, ObjectError> {
        let mut buf = BytesMut::new();
        self.write(value, &mut buf, id)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Kind, Number, UserObject, tag};

    struct Fixed(u32);

    impl Reader for Fixed {
        fn probe(&self, _prefix: &[u8]) -> u32 {
            self.0
        }

        fn read(&self, _data: &[u8], _cx: Context<'_>) -> Result<Value, ObjectError> {
            Ok(Value::number(self.0))
        }
    }

    impl Writer for Fixed {
        fn write(
            &self,
            _buf: &mut BytesMut,
            _value: &Value,
            _cx: Context<'_>,
        ) -> Result<usize, ObjectError> {
            Ok(0)
        }
    }

    #[test]
    fn defaults_register_builtin_formats() {
        let registry = Registry::with_defaults();
        assert!(registry.is_registered(FormatId::Bin));
        assert!(registry.is_registered(FormatId::Bplist));
        assert!(!registry.is_registered(FormatId::Xml));
    }

    #[test]
    fn detects_bplist_over_json() {
        let registry = Registry::with_defaults();
        let value: Value = [("a", Value::from(1u8))].into_iter().collect();
        let bytes = registry.to_bytes(&value, FormatId::Bplist).unwrap();
        assert_eq!(registry.probe(&bytes).map(|(id, _)| id), Some(FormatId::Bplist));
        assert_eq!(registry.read_auto(&bytes).unwrap(), value);
    }

    #[cfg(feature = "json")]
    #[test]
    fn detects_json() {
        let registry = Registry::with_defaults();
        let data = br#"{"a":1}"#;
        assert_eq!(registry.probe(data), Some((FormatId::Json, 50)));
        let value = registry.read_auto(data).unwrap();
        assert_eq!(value.get("a").and_then(|v| v.as_number()), Some(Number::U8(1)));
    }

    #[test]
    fn detects_tbo() {
        let registry = Registry::with_defaults();
        let bytes = registry.to_bytes(&Value::from("hi"), FormatId::Bin).unwrap();
        assert_eq!(registry.probe(&bytes).map(|(id, _)| id), Some(FormatId::Bin));
        assert_eq!(registry.read_auto(&bytes).unwrap(), Value::from("hi"));
    }

    #[test]
    fn no_match_is_unknown_format() {
        let registry = Registry::with_defaults();
        let err = registry.read_auto(&[0x00, 0x01, 0x02]).unwrap_err();
        assert!(matches!(err, ObjectError::UnknownFormat));
        assert!(matches!(Registry::new(CodecConfig::default()).read_auto(b"tbo00"), Err(ObjectError::UnknownFormat)));
    }

    #[test]
    fn matched_format_failure_is_distinct() {
        let registry = Registry::with_defaults();
        let err = registry.read_auto(b"bplist00").unwrap_err();
        assert!(matches!(err, ObjectError::Malformed(_)));
    }

    #[test]
    fn ties_go_to_first_registration() {
        let mut registry = Registry::new(CodecConfig::default());
        registry.register(FormatId::Xml, Fixed(7), Fixed(7));
        registry.register(FormatId::Json, Fixed(7), Fixed(7));
        assert_eq!(registry.probe(b"anything"), Some((FormatId::Xml, 7)));

        registry.register(FormatId::Bin, Fixed(8), Fixed(8));
        assert_eq!(registry.probe(b"anything"), Some((FormatId::Bin, 8)));
    }

    #[test]
    fn replace_and_unregister() {
        let mut registry = Registry::new(CodecConfig::default());
        registry.register(FormatId::Xml, Fixed(1), Fixed(1));
        registry.register(FormatId::Json, Fixed(1), Fixed(1));
        registry.register(FormatId::Xml, Fixed(2), Fixed(2));
        assert_eq!(registry.formats(), [FormatId::Xml, FormatId::Json]);
        assert_eq!(registry.read(b"", FormatId::Xml).unwrap(), Value::number(2u32));

        assert!(registry.unregister(FormatId::Xml));
        assert!(!registry.unregister(FormatId::Xml));
        assert!(matches!(
            registry.read(b"", FormatId::Xml),
            Err(ObjectError::FormatNotRegistered(FormatId::Xml))
        ));
    }

    #[test]
    fn re_registering_drops_hooks() {
        let mut registry = Registry::with_defaults();
        registry
            .writer_hook(FormatId::Bin, tag::USER, |cx, _| {
                cx.put_header(tag::USER, 0);
                Ok(())
            })
            .unwrap();
        let user = Value::user(UserObject::new(tag::USER, ()));
        assert!(registry.to_bytes(&user, FormatId::Bin).is_ok());

        registry.register(FormatId::Bin, TboReader, TboWriter);
        let err = registry.to_bytes(&user, FormatId::Bin).unwrap_err();
        assert!(matches!(
            err,
            ObjectError::UnsupportedKind { format: FormatId::Bin, kind: Kind::User(tag::USER) }
        ));
    }

    #[test]
    fn hooks_on_builtin_tags_are_rejected() {
        let mut registry = Registry::with_defaults();
        let err = registry
            .reader_hook(FormatId::Bin, tag::STRING, |_| Ok(Value::null()))
            .unwrap_err();
        assert!(matches!(err, ObjectError::Registry(_)));
        assert!(registry.reader_hook(FormatId::Bin, 0, |_| Ok(Value::null())).is_err());
        assert!(registry.writer_hook(FormatId::Bin, tag::ARRAY, |_, _| Ok(())).is_err());
        assert!(matches!(
            registry.reader_hook(FormatId::Xml, 0x90, |_| Ok(Value::null())),
            Err(ObjectError::FormatNotRegistered(FormatId::Xml))
        ));
    }
}
