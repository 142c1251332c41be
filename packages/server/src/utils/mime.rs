use std::fmt;

/// The closed set of content types the upload routes accept.
///
/// Each variant carries its own file extension, so a generated filename can
/// never end up without one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcceptedMime {
    Jpeg,
    Png,
    Pdf,
}

impl AcceptedMime {
    pub const ALL: [AcceptedMime; 3] = [Self::Jpeg, Self::Png, Self::Pdf];

    /// Match a declared `Content-Type`. Parameters (`; charset=...`) and case are ignored.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        Self::ALL.into_iter().find(|m| m.as_str() == essence)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Pdf => "application/pdf",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Pdf => "pdf",
        }
    }
}

impl fmt::Display for AcceptedMime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage name for a new blob: a time-ordered UUIDv7 plus the type's extension.
pub fn generate_filename(mime: AcceptedMime) -> String {
    format!("{}.{}", uuid::Uuid::now_v7(), mime.extension())
}
