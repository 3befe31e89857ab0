//! `BYTES`: returns a file's contents as an unsigned byte array.

use std::fs;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use sha2::{Digest, Sha256};
use tracing::debug;
use uda_protocol::Value;

use super::BUILTIN_TARGET;
use crate::plugin::{Plugin, PluginCall, PluginFailure, ResultSlot};

/// Reads whole files below a set of permitted roots.
#[derive(Debug, Clone, Default)]
pub struct BytesPlugin {
    safe_roots: Vec<Utf8PathBuf>,
}

impl BytesPlugin {
    /// A reader limited to `safe_roots`; an empty list permits any absolute
    /// path.
    #[must_use]
    pub const fn new(safe_roots: Vec<Utf8PathBuf>) -> Self {
        Self { safe_roots }
    }

    fn check_path<'a>(&self, text: &'a str) -> Result<&'a Utf8Path, PluginFailure> {
        let path = Utf8Path::new(text);
        if !path.is_absolute() {
            return Err(PluginFailure::access_denied(format!(
                "path '{text}' is not absolute"
            )));
        }
        if path
            .components()
            .any(|component| component == Utf8Component::ParentDir)
        {
            return Err(PluginFailure::access_denied(format!(
                "path '{text}' contains a parent-directory component"
            )));
        }
        if !self.safe_roots.is_empty() && !self.safe_roots.iter().any(|root| path.starts_with(root))
        {
            return Err(PluginFailure::access_denied(format!(
                "path '{text}' is outside the permitted directories"
            )));
        }
        Ok(path)
    }

    fn read(&self, call: &PluginCall) -> Result<Value, PluginFailure> {
        let text = call
            .request
            .path()
            .ok_or_else(|| PluginFailure::failed("BYTES::read needs a path argument"))?;
        let path = self.check_path(text)?;
        let contents = fs::read(path)
            .map_err(|error| PluginFailure::failed(format!("cannot read '{path}': {error}")))?;
        let digest = hex(&Sha256::digest(&contents));
        debug!(target: BUILTIN_TARGET, path = %path, bytes = contents.len(), "read file");
        Value::bytes(contents)
            .map(|value| {
                value
                    .with_label(path.file_name().unwrap_or_default())
                    .with_description(format!("sha256:{digest}"))
            })
            .map_err(|error| PluginFailure::failed(error.to_string()))
    }
}

impl Plugin for BytesPlugin {
    fn invoke(&self, call: &PluginCall, slot: &mut ResultSlot) -> Result<(), PluginFailure> {
        match call.function().to_ascii_lowercase().as_str() {
            "read" | "" => {
                slot.set(self.read(call)?);
                Ok(())
            }
            other => Err(PluginFailure::unsupported("BYTES", other)),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .flat_map(|byte| [byte >> 4, byte & 0x0f])
        .filter_map(|nibble| char::from_digit(u32::from(nibble), 16))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use rstest::rstest;
    use tempfile::{NamedTempFile, TempDir};
    use uda_protocol::{ArrayData, RequestModel, StatusCode};

    use super::*;

    fn call(text: &str) -> PluginCall {
        PluginCall {
            request: RequestModel::parse(text, "").expect("request parses"),
            data: None,
            services: Arc::from(Vec::new()),
        }
    }

    fn invoke(plugin: &BytesPlugin, text: &str) -> Result<Value, PluginFailure> {
        let mut slot = ResultSlot::new();
        plugin.invoke(&call(text), &mut slot)?;
        Ok(slot.take().expect("value"))
    }

    #[test]
    fn reads_the_whole_file_with_its_digest() {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(b"abc").expect("write");
        let path = file.path().to_str().expect("utf-8 path");

        let value = invoke(&BytesPlugin::default(), &format!("BYTES::read(path={path})"))
            .expect("reads");
        assert_eq!(value.as_array(), Some(&ArrayData::UInt8(b"abc".to_vec())));
        assert_eq!(
            value.description(),
            Some("sha256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }

    #[test]
    fn reads_below_a_safe_root() {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 path");
        let file = root.join("shot.dat");
        fs::write(&file, [0_u8; 16]).expect("write");

        let plugin = BytesPlugin::new(vec![root]);
        let value = invoke(&plugin, &format!("BYTES::read(path={file})")).expect("reads");
        assert_eq!(value.count(), 16);
        assert_eq!(value.label(), Some("shot.dat"));
    }

    #[rstest]
    #[case::relative("BYTES::read(path=tmp/x.dat)")]
    #[case::parent("BYTES::read(path=/srv/data/../../etc/passwd)")]
    #[case::outside("BYTES::read(path=/etc/passwd)")]
    fn disallowed_paths_are_denied(#[case] request: &str) {
        let plugin = BytesPlugin::new(vec![Utf8PathBuf::from("/srv/data")]);
        let failure = invoke(&plugin, request).expect_err("denied");
        assert_eq!(failure.code, StatusCode::ACCESS_DENIED);
    }

    #[test]
    fn missing_file_is_a_plugin_failure() {
        let failure = invoke(&BytesPlugin::default(), "BYTES::read(path=/nonexistent/uda.dat)")
            .expect_err("missing");
        assert_eq!(failure.code, StatusCode::PLUGIN_FAILED);
        assert!(failure.message.contains("/nonexistent/uda.dat"));
    }

    #[test]
    fn missing_path_argument_fails() {
        let failure = invoke(&BytesPlugin::default(), "BYTES::read()").expect_err("no path");
        assert_eq!(failure.code, StatusCode::PLUGIN_FAILED);
    }

    #[test]
    fn other_functions_are_unsupported() {
        let failure = invoke(&BytesPlugin::default(), "BYTES::write(path=/tmp/x)")
            .expect_err("unsupported");
        assert_eq!(failure.code, StatusCode::UNSUPPORTED_OPERATION);
    }

    #[test]
    fn hex_is_lower_case_and_padded() {
        assert_eq!(hex(&[0x00, 0x0f, 0xa5]), "000fa5");
    }
}
