use std::path::Path;

pub const MIME_TEXT: &str = "text/plain";
pub const MIME_EMPTY: &str = "application/x-empty";
pub const MIME_BINARY: &str = "application/octet-stream";
pub const MIME_DIRECTORY: &str = "inode/directory";

/// Maps a file to a MIME type.
///
/// `sample` holds the leading bytes of the file (up to the configured sample
/// length). Closures `Fn(&Path, &[u8]) -> String` implement this too, which
/// keeps tests deterministic.
pub trait MimeDetector: Send + Sync {
    fn detect(&self, path: &Path, sample: &[u8]) -> String;
}

impl<F> MimeDetector for F
where
    F: Fn(&Path, &[u8]) -> String + Send + Sync,
{
    fn detect(&self, path: &Path, sample: &[u8]) -> String {
        self(path, sample)
    }
}

/// Magic-number sniffing via `infer`, falling back to a plain-text check.
#[derive(Debug, Default, Clone, Copy)]
pub struct SniffMimeDetector;

impl MimeDetector for SniffMimeDetector {
    fn detect(&self, _path: &Path, sample: &[u8]) -> String {
        if sample.is_empty() {
            return MIME_EMPTY.to_string();
        }
        if let Some(kind) = infer::get(sample) {
            return kind.mime_type().to_string();
        }
        if looks_like_text(sample) {
            MIME_TEXT.to_string()
        } else {
            MIME_BINARY.to_string()
        }
    }
}

fn looks_like_text(sample: &[u8]) -> bool {
    let text = match std::str::from_utf8(sample) {
        Ok(text) => text,
        // The sample may cut a multi-byte sequence in half.
        Err(e) if e.error_len().is_none() => match std::str::from_utf8(&sample[..e.valid_up_to()]) {
            Ok(text) => text,
            Err(_) => return false,
        },
        Err(_) => return false,
    };
    !text
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t' | '\x0c'))
}
