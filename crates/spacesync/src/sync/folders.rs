use super::context::SyncContext;
use super::error::{FolderPathError, Result, SyncError};
use super::index::TargetIndex;
use super::payload;
use super::progress::SyncProgress;
use crate::slug;
use crate::space::{ContentNode, SpaceClient, StoryId};

impl<C: SpaceClient + 'static> SyncContext<C> {
    /// Make sure every ancestor folder of `full_path` exists in the target.
    ///
    /// Ancestors are visited shallowest first, so a parent is always created
    /// before its children. Existing folders are found through the index or a
    /// remote lookup and never re-created; missing ones are copied from the
    /// source without publishing. Returns the folders created, in order. On
    /// failure the folders created so far are reported with the error; nothing
    /// is rolled back.
    #[tracing::instrument(skip(self, index))]
    pub async fn ensure_folder_path(
        &self,
        full_path: &str,
        index: &mut TargetIndex,
    ) -> std::result::Result<Vec<ContentNode>, FolderPathError> {
        let mut created = Vec::new();
        match self.ensure_folder_path_into(full_path, index, &mut created).await {
            Ok(()) => Ok(created),
            Err(error) => Err(FolderPathError { created, error }),
        }
    }

    /// Same walk as [`Self::ensure_folder_path`], recording each folder in
    /// `created` as soon as the target accepted it. The record survives the
    /// future being dropped mid-walk.
    pub(crate) async fn ensure_folder_path_into(
        &self,
        full_path: &str,
        index: &mut TargetIndex,
        created: &mut Vec<ContentNode>,
    ) -> Result<()> {
        let mut parent_id = None;
        for path in slug::ancestor_paths(full_path) {
            let (id, new_folder) = self.resolve_folder(&path, parent_id, index).await?;
            parent_id = Some(id);
            created.extend(new_folder);
        }
        Ok(())
    }

    /// Target id of the folder at `path`, creating it when missing.
    async fn resolve_folder(
        &self,
        path: &str,
        parent_id: Option<StoryId>,
        index: &mut TargetIndex,
    ) -> Result<(StoryId, Option<ContentNode>)> {
        if let Some(id) = index.id_for(path) {
            return Ok((id, None));
        }

        let target = &self.target;
        let space = self.target_space;
        if let Some(existing) = self
            .gate
            .read(space, || target.get_story_by_path(space, path))
            .await?
        {
            let id = existing.id.ok_or_else(|| SyncError::MissingId {
                path: path.to_string(),
            })?;
            index.insert(existing);
            return Ok((id, None));
        }

        let folder = self.create_folder_from_source(path, parent_id).await?;
        let id = folder.id.ok_or_else(|| SyncError::MissingId {
            path: path.to_string(),
        })?;
        tracing::debug!(path, id, "Created folder");
        self.emit(SyncProgress::FolderCreated {
            full_slug: path.to_string(),
        });
        index.insert(folder.clone());
        Ok((id, Some(folder)))
    }

    async fn create_folder_from_source(
        &self,
        path: &str,
        parent_id: Option<StoryId>,
    ) -> Result<ContentNode> {
        let source = &self.source;
        let source_space = self.source_space;
        let definition = self
            .gate
            .read(source_space, || source.get_story_by_path(source_space, path))
            .await?
            .ok_or_else(|| SyncError::MissingSourceFolder {
                path: path.to_string(),
            })?;

        let target = &self.target;
        let space = self.target_space;

        match (self.source.raw_api(), self.target.raw_api(), definition.id) {
            (Some(source_raw), Some(target_raw), Some(source_id)) => {
                let raw = self
                    .gate
                    .read(source_space, || source_raw.get_story_raw(source_space, source_id))
                    .await?;
                let payload =
                    payload::build_story_payload(raw, &definition, parent_id, None, false);
                self.gate
                    .write(space, || target_raw.create_story_raw(space, &payload, false))
                    .await
            }
            _ => {
                let mut folder = definition;
                folder.strip_system_fields();
                folder.parent_id = parent_id;
                folder.is_folder = true;
                folder.translated_slugs.iter_mut().for_each(|v| v.id = None);
                self.gate
                    .write(space, || target.create_story(space, &folder, false))
                    .await
            }
        }
    }
}
