use std::path::Path;

/// Fallback when the extension is unknown
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Legacy alias some platforms still report for zip archives
pub const LEGACY_ZIP: &str = "application/x-zip-compressed";

pub const ZIP: &str = "application/zip";

/// Replace deprecated media types by their registered name
pub fn normalize(mimetype: &str) -> &str {
    match mimetype {
        LEGACY_ZIP => ZIP,
        other => other,
    }
}

/// Guess the media type of a file from its extension
pub fn guess(path: impl AsRef<Path>) -> String {
    let guessed = mime_guess::from_path(path).first_raw().unwrap_or(OCTET_STREAM);
    normalize(guessed).to_string()
}
