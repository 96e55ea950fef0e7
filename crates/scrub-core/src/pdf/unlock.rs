//! Unlocker implementations: in-process (lopdf) and external tool (qpdf).

use lopdf::encryption::{self, DecryptionError};
use lopdf::{Document, Object, ObjectId};
use std::panic::{self, AssertUnwindSafe};
use tracing::debug;

use super::Unlocker;
use crate::error::UnlockError;

/// Decrypts documents in memory with lopdf.
///
/// Encrypted documents are opened with the empty user password, which covers
/// owner-password-only (permission restricted) files. No filesystem access.
#[derive(Debug, Clone, Default)]
pub struct InProcessUnlocker;

impl InProcessUnlocker {
    pub fn new() -> Self {
        Self
    }

    fn unlock_document(document: &[u8]) -> Result<Vec<u8>, UnlockError> {
        let mut doc =
            Document::load_mem(document).map_err(|e| UnlockError::Malformed(e.to_string()))?;

        if doc.is_encrypted() {
            let version = doc
                .get_encrypted()
                .and_then(|dict| dict.get(b"V"))
                .and_then(Object::as_i64)
                .unwrap_or(0);
            match version {
                1 | 2 => decrypt_rc4(&mut doc)?,
                4 => doc
                    .decrypt("")
                    .map_err(|e| UnlockError::UnsupportedEncryption(e.to_string()))?,
                v => {
                    return Err(UnlockError::UnsupportedEncryption(format!(
                        "security handler version {}",
                        v
                    )));
                }
            }
            debug!("Decrypted PDF (V{}) with empty password", version);
        }

        // Permission flags live in the encryption dictionary
        doc.trailer.remove(b"Encrypt");

        let mut unlocked = Vec::with_capacity(document.len());
        doc.save_to(&mut unlocked)
            .map_err(|e| UnlockError::Save(e.to_string()))?;

        debug!("Unlocked PDF: {} -> {} bytes", document.len(), unlocked.len());
        Ok(unlocked)
    }
}

/// Decrypt a V1/V2 (RC4, no crypt filters) document with the empty user password.
fn decrypt_rc4(doc: &mut Document) -> Result<(), UnlockError> {
    let unsupported = |e: DecryptionError| UnlockError::UnsupportedEncryption(e.to_string());

    let encrypt_id = doc
        .trailer
        .get(b"Encrypt")
        .and_then(Object::as_reference)
        .map_err(|e| UnlockError::Malformed(e.to_string()))?;
    let key = encryption::get_encryption_key(doc, "", true).map_err(unsupported)?;

    for (&id, object) in doc.objects.iter_mut() {
        if id == encrypt_id {
            continue;
        }
        decrypt_in_place(&key, id, object).map_err(unsupported)?;
    }

    doc.trailer.remove(b"Encrypt");
    Ok(())
}

/// Every string and stream is keyed by the indirect object that contains it,
/// including strings nested in dictionaries and arrays.
fn decrypt_in_place(key: &[u8], id: ObjectId, object: &mut Object) -> Result<(), DecryptionError> {
    match object {
        Object::String(..) => {
            let plain = encryption::decrypt_object(key, id, &*object, false)?;
            if let Object::String(content, _) = object {
                *content = plain;
            }
        }
        Object::Stream(stream) => {
            // Cross-reference streams are never encrypted
            if stream.dict.has_type(b"XRef") {
                return Ok(());
            }
            for (_, value) in stream.dict.iter_mut() {
                decrypt_in_place(key, id, value)?;
            }
            let plain = encryption::decrypt_object(key, id, &*object, false)?;
            if let Object::Stream(stream) = object {
                stream.set_content(plain);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                decrypt_in_place(key, id, value)?;
            }
        }
        Object::Array(items) => {
            for item in items.iter_mut() {
                decrypt_in_place(key, id, item)?;
            }
        }
        _ => {}
    }
    Ok(())
}

impl Unlocker for InProcessUnlocker {
    fn name(&self) -> &str {
        "in-process"
    }

    fn unlock(&self, document: &[u8]) -> Result<Vec<u8>, UnlockError> {
        panic::catch_unwind(AssertUnwindSafe(|| Self::unlock_document(document))).unwrap_or_else(
            |_| Err(UnlockError::Malformed("PDF parser panicked".to_string())),
        )
    }
}

#[cfg(feature = "native")]
pub use external::ExternalToolUnlocker;

#[cfg(feature = "native")]
mod external {
    use std::fs;
    use std::path::PathBuf;
    use std::process::{Command, Stdio};
    use std::time::Duration;

    use tracing::{debug, warn};
    use wait_timeout::ChildExt;

    use super::Unlocker;
    use crate::error::UnlockError;

    /// Runs an external decrypt tool (`qpdf --decrypt --remove-restrictions in out`).
    ///
    /// Input, output and the tool's stderr live in a temporary directory that is
    /// removed when the call returns, on success and on every failure path.
    #[derive(Debug, Clone)]
    pub struct ExternalToolUnlocker {
        tool: String,
        args: Vec<String>,
        timeout: Duration,
        temp_root: Option<PathBuf>,
    }

    impl ExternalToolUnlocker {
        /// Create an unlocker for `tool` with qpdf's decrypt arguments.
        pub fn new(tool: impl Into<String>) -> Self {
            Self {
                tool: tool.into(),
                args: vec!["--decrypt".to_string(), "--remove-restrictions".to_string()],
                timeout: Duration::from_secs(30),
                temp_root: None,
            }
        }

        /// Replace the arguments placed before the input and output paths.
        pub fn with_args<I, S>(mut self, args: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.args = args.into_iter().map(Into::into).collect();
            self
        }

        /// Set the maximum wait for the tool.
        pub fn with_timeout(mut self, timeout: Duration) -> Self {
            self.timeout = timeout;
            self
        }

        /// Create temporary directories under `root` instead of the system default.
        pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
            self.temp_root = Some(root.into());
            self
        }
    }

    impl Unlocker for ExternalToolUnlocker {
        fn name(&self) -> &str {
            &self.tool
        }

        fn unlock(&self, document: &[u8]) -> Result<Vec<u8>, UnlockError> {
            let mut builder = tempfile::Builder::new();
            builder.prefix("scrub-unlock-");
            let dir = match &self.temp_root {
                Some(root) => builder.tempdir_in(root)?,
                None => builder.tempdir()?,
            };

            let input = dir.path().join("input.pdf");
            let output = dir.path().join("unlocked.pdf");
            let stderr_path = dir.path().join("stderr.log");
            fs::write(&input, document)?;

            let stderr_file = fs::File::create(&stderr_path)?;
            let mut child = Command::new(&self.tool)
                .args(&self.args)
                .arg(&input)
                .arg(&output)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::from(stderr_file))
                .spawn()
                .map_err(|source| UnlockError::ToolLaunch {
                    tool: self.tool.clone(),
                    source,
                })?;

            let status = match child.wait_timeout(self.timeout)? {
                Some(status) => status,
                None => {
                    warn!("{} exceeded {:?}, killing", self.tool, self.timeout);
                    // The child may have exited between the wait and the kill
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(UnlockError::Timeout {
                        tool: self.tool.clone(),
                        timeout: self.timeout,
                    });
                }
            };

            if !status.success() {
                let stderr = fs::read_to_string(&stderr_path).unwrap_or_default();
                return Err(UnlockError::ToolFailed {
                    tool: self.tool.clone(),
                    status: status.to_string(),
                    stderr: stderr.trim().to_string(),
                });
            }

            let unlocked = fs::read(&output)?;
            debug!("{} unlocked {} -> {} bytes", self.tool, document.len(), unlocked.len());
            Ok(unlocked)
        }
    }

}
