use super::AudioResource;
use std::path::PathBuf;
use tracing::debug;

/// Turns a chapter's audio reference into something an engine can open.
/// `None` means the reference cannot be played; the player reports it as an
/// alert, it never panics or propagates.
pub trait ResourceResolver: Send + Sync {
    fn resolve(&self, audio_ref: &str) -> Option<AudioResource>;
}

impl<F> ResourceResolver for F
where
    F: Fn(&str) -> Option<AudioResource> + Send + Sync,
{
    fn resolve(&self, audio_ref: &str) -> Option<AudioResource> {
        self(audio_ref)
    }
}

/// Looks for `<root>/<audio_ref>.<extension>` on disk.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
    extension: String,
}

impl DirectoryResolver {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }
}

impl ResourceResolver for DirectoryResolver {
    fn resolve(&self, audio_ref: &str) -> Option<AudioResource> {
        let path = self.root.join(format!("{}.{}", audio_ref, self.extension));
        if path.is_file() {
            Some(AudioResource::new(path))
        } else {
            debug!("No audio file at {}", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_resolver_finds_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("chapter_1.mp3"), b"ID3").unwrap();

        let resolver = DirectoryResolver::new(dir.path(), "mp3");
        let resource = resolver.resolve("chapter_1").unwrap();
        assert_eq!(resource.path(), dir.path().join("chapter_1.mp3"));
        assert!(resolver.resolve("chapter_2").is_none());
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |audio_ref: &str| (audio_ref == "ok").then(|| AudioResource::new("ok.mp3"));
        assert!(resolver.resolve("ok").is_some());
        assert!(resolver.resolve("missing").is_none());
    }
}
