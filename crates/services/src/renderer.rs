use std::path::{Path, PathBuf};

use async_trait::async_trait;

use quiz_core::model::Tutor;

use crate::error::RenderError;

/// Key for one tutor picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub tutor: Tutor,
    pub stage: u8,
    pub is_punish: bool,
    pub tags: Vec<String>,
    pub visual: Option<String>,
}

/// Location of a rendered asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef(pub PathBuf);

impl AssetRef {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[async_trait]
pub trait AssetRenderer: Send + Sync {
    /// # Errors
    ///
    /// Returns `RenderError` if no asset can be produced for the request.
    async fn render(&self, request: &AssetRequest) -> Result<AssetRef, RenderError>;
}

/// Serves pre-rendered pictures laid out as
/// `<root>/<tutor>/stage<N>.png` and `<root>/<tutor>/stage<N>_punish.png`.
///
/// Tags and visual hints are ignored.
#[derive(Debug, Clone)]
pub struct StaticAssetRenderer {
    root: PathBuf,
}

impl StaticAssetRenderer {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn path_for(&self, request: &AssetRequest) -> PathBuf {
        let suffix = if request.is_punish { "_punish" } else { "" };
        self.root
            .join(request.tutor.slug())
            .join(format!("stage{}{suffix}.png", request.stage))
    }
}

#[async_trait]
impl AssetRenderer for StaticAssetRenderer {
    async fn render(&self, request: &AssetRequest) -> Result<AssetRef, RenderError> {
        let path = self.path_for(request);
        match tokio::fs::try_exists(&path).await {
            Ok(true) => Ok(AssetRef(path)),
            Ok(false) => Err(RenderError::Missing {
                tutor: request.tutor.to_string(),
                stage: request.stage,
            }),
            Err(e) => Err(RenderError::Backend(e.to_string())),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn request(stage: u8, is_punish: bool) -> AssetRequest {
        AssetRequest {
            tutor: Tutor::Maria,
            stage,
            is_punish,
            tags: vec!["serious".into()],
            visual: None,
        }
    }

    #[tokio::test]
    async fn resolves_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let tutor_dir = dir.path().join(Tutor::Maria.slug());
        std::fs::create_dir_all(&tutor_dir).unwrap();
        std::fs::write(tutor_dir.join("stage2_punish.png"), b"png").unwrap();

        let renderer = StaticAssetRenderer::new(dir.path());
        let asset = renderer.render(&request(2, true)).await.unwrap();
        assert_eq!(asset.path(), tutor_dir.join("stage2_punish.png"));
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = StaticAssetRenderer::new(dir.path());
        let err = renderer.render(&request(3, false)).await.unwrap_err();
        assert!(matches!(err, RenderError::Missing { stage: 3, .. }));
    }

    #[test]
    fn path_layout() {
        let renderer = StaticAssetRenderer::new("/assets");
        assert_eq!(
            renderer.path_for(&request(1, false)),
            PathBuf::from("/assets").join(Tutor::Maria.slug()).join("stage1.png")
        );
    }
}
