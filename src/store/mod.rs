//! Declarative config store.
//!
//! Owns the three artifacts of the project directory:
//!
//! - `terraform.tfvars`: desired identifiers (`existing_vpc_ids`), region and
//!   the imported config set (`imported_vpc_configs`)
//! - `main.tf`: the `aws_vpc.my_existing_vpc` resource driven by `for_each`
//! - `variables.tf`: the `imported_vpc_configs` variable schema
//!
//! Every operation is idempotent. Reads decode HCL structurally, so files
//! that mix hand-written and generated content are handled.

pub mod blocks;
pub mod codec;
pub mod error;
pub mod tfvars;

pub use blocks::{MarkerBlock, RESOURCE_DECLARATION, VARIABLE_SCHEMA};
pub use error::{StoreError, StoreResult};
pub use tfvars::{ImportedConfigSet, TfvarsDocument};

use crate::resource::{ResourceId, VpcAttributes};
use crate::traits::FileSystem;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Variable-values artifact
pub const TFVARS_FILE: &str = "terraform.tfvars";

/// What an ensure operation did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnsureOutcome {
    /// The target file did not exist and was created with the block
    Created,
    /// The block was appended to an existing file
    Appended,
    /// A `.tf` file in the project already declares the block
    AlreadyPresent,
}

/// Data-access layer over the project's declarative configuration
pub struct ConfigStore {
    fs: Arc<dyn FileSystem>,
    project_dir: PathBuf,
}

impl ConfigStore {
    pub fn new(fs: Arc<dyn FileSystem>, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            project_dir: project_dir.into(),
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn tfvars_path(&self) -> PathBuf {
        self.project_dir.join(TFVARS_FILE)
    }

    /// Read the desired identifier list.
    ///
    /// Fails with [`StoreError::MissingConfig`] when the tfvars file does not
    /// exist and [`StoreError::EmptyList`] when it lists no identifiers.
    pub fn load_desired_identifiers(&self) -> StoreResult<Vec<ResourceId>> {
        let path = self.tfvars_path();

        if !self.fs.is_file(&path) {
            return Err(StoreError::MissingConfig { path });
        }

        let ids = self
            .decode_tfvars()?
            .desired_ids()
            .map_err(|e| StoreError::malformed(&path, e.to_string()))?;

        if ids.is_empty() {
            return Err(StoreError::EmptyList {
                path,
                variable: tfvars::DESIRED_IDS_VARIABLE.to_string(),
            });
        }

        Ok(ids)
    }

    /// Region configured in the tfvars file, if any
    pub fn region(&self) -> StoreResult<Option<String>> {
        Ok(self.decode_tfvars()?.region().map(str::to_string))
    }

    /// The persisted imported config set (empty when the file or section is
    /// missing)
    pub fn imported_config_set(&self) -> StoreResult<ImportedConfigSet> {
        self.decode_tfvars()?
            .imported()
            .map_err(|e| StoreError::malformed(self.tfvars_path(), e.to_string()))
    }

    pub fn is_already_imported(&self, id: &ResourceId) -> StoreResult<bool> {
        Ok(self.imported_config_set()?.contains(id))
    }

    /// Add `id` to the imported config set.
    ///
    /// Creates the file or the section when missing, otherwise inserts the
    /// entry inside the existing section without touching other content. A
    /// merge for an identifier that is already present changes nothing.
    pub fn merge_resource(&self, id: &ResourceId, attributes: &VpcAttributes) -> StoreResult<()> {
        let path = self.tfvars_path();
        let current = self.read_if_exists(&path)?;

        let merged = tfvars::merge_entry(current.as_deref(), id, attributes)
            .map_err(|message| StoreError::malformed(&path, message))?;

        if let Some(text) = merged {
            self.fs
                .write(&path, &text)
                .map_err(|e| StoreError::io(&path, e))?;
        }

        Ok(())
    }

    /// Make sure the `aws_vpc.my_existing_vpc` resource block exists
    pub fn ensure_resource_declaration(&self) -> StoreResult<EnsureOutcome> {
        self.ensure_block(&RESOURCE_DECLARATION)
    }

    /// Make sure the `imported_vpc_configs` variable block exists
    pub fn ensure_variable_schema(&self) -> StoreResult<EnsureOutcome> {
        self.ensure_block(&VARIABLE_SCHEMA)
    }

    /// Number of declarations of `block` across all `.tf` files of the project
    pub fn marker_count(&self, block: &MarkerBlock) -> StoreResult<usize> {
        let mut count = 0;

        for path in self.tf_files()? {
            let text = self
                .fs
                .read_to_string(&path)
                .map_err(|e| StoreError::io(&path, e))?;

            count += block
                .count_in_text(&text)
                .map_err(|message| StoreError::malformed(&path, message))?;
        }

        Ok(count)
    }

    fn ensure_block(&self, block: &MarkerBlock) -> StoreResult<EnsureOutcome> {
        match self.marker_count(block)? {
            0 => {}
            1 => return Ok(EnsureOutcome::AlreadyPresent),
            n => {
                return Err(StoreError::malformed(
                    &self.project_dir,
                    format!("{} is declared {} times", block.address(), n),
                ));
            }
        }

        let path = self.project_dir.join(block.file_name);

        let (text, outcome) = match self.read_if_exists(&path)? {
            Some(existing) => (
                codec::append_block(&existing, block.template),
                EnsureOutcome::Appended,
            ),
            None => (block.template.to_string(), EnsureOutcome::Created),
        };

        let declared = block
            .count_in_text(&text)
            .map_err(|message| StoreError::malformed(&path, message))?;

        if declared != 1 {
            return Err(StoreError::malformed(
                &path,
                format!("{} would be declared {} times", block.address(), declared),
            ));
        }

        self.fs
            .write(&path, &text)
            .map_err(|e| StoreError::io(&path, e))?;

        Ok(outcome)
    }

    fn tf_files(&self) -> StoreResult<Vec<PathBuf>> {
        if !self.fs.exists(&self.project_dir) {
            return Ok(Vec::new());
        }

        let entries = self
            .fs
            .walk_dir(&self.project_dir, 1)
            .map_err(|e| StoreError::io(&self.project_dir, e))?;

        Ok(entries
            .into_iter()
            .filter(|path| path.extension().is_some_and(|ext| ext == "tf"))
            .filter(|path| self.fs.is_file(path))
            .collect())
    }

    fn read_if_exists(&self, path: &Path) -> StoreResult<Option<String>> {
        if !self.fs.is_file(path) {
            return Ok(None);
        }

        self.fs
            .read_to_string(path)
            .map(Some)
            .map_err(|e| StoreError::io(path, e))
    }

    fn decode_tfvars(&self) -> StoreResult<TfvarsDocument> {
        let path = self.tfvars_path();
        let text = self.read_if_exists(&path)?.unwrap_or_default();

        TfvarsDocument::decode(&text).map_err(|message| StoreError::malformed(&path, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{MockFileSystem, RealFileSystem};

    const PROJECT: &str = "/project";

    fn store_with(fs: MockFileSystem) -> (Arc<MockFileSystem>, ConfigStore) {
        let fs = Arc::new(fs);
        let store = ConfigStore::new(fs.clone(), PROJECT);
        (fs, store)
    }

    fn id(raw: &str) -> ResourceId {
        ResourceId::new(raw).unwrap()
    }

    fn tfvars_path() -> PathBuf {
        Path::new(PROJECT).join(TFVARS_FILE)
    }

    #[test]
    fn test_load_desired_identifiers_missing_file() {
        let (_, store) = store_with(MockFileSystem::new());

        let err = store.load_desired_identifiers().unwrap_err();
        assert!(matches!(err, StoreError::MissingConfig { .. }));
    }

    #[test]
    fn test_load_desired_identifiers_empty_list() {
        let (_, store) = store_with(
            MockFileSystem::new().with_file(tfvars_path(), "existing_vpc_ids = []\n"),
        );

        let err = store.load_desired_identifiers().unwrap_err();
        assert!(matches!(err, StoreError::EmptyList { .. }));
    }

    #[test]
    fn test_load_desired_identifiers_absent_variable_is_empty() {
        let (_, store) =
            store_with(MockFileSystem::new().with_file(tfvars_path(), "aws_region = \"x\"\n"));

        let err = store.load_desired_identifiers().unwrap_err();
        assert!(matches!(err, StoreError::EmptyList { .. }));
    }

    #[test]
    fn test_load_desired_identifiers_in_order() {
        let (_, store) = store_with(MockFileSystem::new().with_file(
            tfvars_path(),
            "existing_vpc_ids = [\"vpc-b\", \"vpc-a\"]\n",
        ));

        let ids = store.load_desired_identifiers().unwrap();
        assert_eq!(ids, vec![id("vpc-b"), id("vpc-a")]);
    }

    #[test]
    fn test_load_desired_identifiers_malformed_file() {
        let (_, store) =
            store_with(MockFileSystem::new().with_file(tfvars_path(), "existing_vpc_ids = [\n"));

        let err = store.load_desired_identifiers().unwrap_err();
        assert!(matches!(err, StoreError::MalformedArtifact { .. }));
    }

    #[test]
    fn test_region_from_tfvars() {
        let (_, store) = store_with(
            MockFileSystem::new().with_file(tfvars_path(), "aws_region = \"eu-west-1\"\n"),
        );

        assert_eq!(store.region().unwrap().as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn test_merge_then_is_already_imported() {
        let (fs, store) = store_with(MockFileSystem::new().with_file(
            tfvars_path(),
            "existing_vpc_ids = [\"vpc-1\"]\n",
        ));
        let vpc = id("vpc-1");

        assert!(!store.is_already_imported(&vpc).unwrap());

        store
            .merge_resource(&vpc, &VpcAttributes::new("10.0.0.0/16"))
            .unwrap();

        assert!(store.is_already_imported(&vpc).unwrap());
        assert!(
            fs.get_file_contents(&tfvars_path())
                .unwrap()
                .starts_with("existing_vpc_ids = [\"vpc-1\"]\n")
        );
    }

    #[test]
    fn test_merge_same_identifier_twice_writes_once() {
        let (fs, store) = store_with(MockFileSystem::new());
        let vpc = id("vpc-1");
        let attrs = VpcAttributes::new("10.0.0.0/16").with_tag("Name", "A");

        store.merge_resource(&vpc, &attrs).unwrap();
        let after_first = fs.get_file_contents(&tfvars_path()).unwrap();
        store.merge_resource(&vpc, &attrs).unwrap();

        assert_eq!(fs.get_file_contents(&tfvars_path()).unwrap(), after_first);
        assert_eq!(fs.written_paths().len(), 1);
        assert_eq!(after_first.matches("\"vpc-1\" =").count(), 1);
    }

    #[test]
    fn test_merge_refuses_to_write_malformed_file() {
        let original = "imported_vpc_configs = {\n";
        let (fs, store) = store_with(MockFileSystem::new().with_file(tfvars_path(), original));

        let err = store
            .merge_resource(&id("vpc-1"), &VpcAttributes::new("10.0.0.0/16"))
            .unwrap_err();

        assert!(matches!(err, StoreError::MalformedArtifact { .. }));
        assert!(fs.written_paths().is_empty());
    }

    #[test]
    fn test_ensure_creates_missing_files() {
        let (fs, store) = store_with(MockFileSystem::new());

        assert_eq!(
            store.ensure_resource_declaration().unwrap(),
            EnsureOutcome::Created
        );
        assert_eq!(store.ensure_variable_schema().unwrap(), EnsureOutcome::Created);

        assert_eq!(
            fs.get_file_contents(&Path::new(PROJECT).join("main.tf")).unwrap(),
            RESOURCE_DECLARATION.template
        );
        assert_eq!(
            fs.get_file_contents(&Path::new(PROJECT).join("variables.tf"))
                .unwrap(),
            VARIABLE_SCHEMA.template
        );
    }

    #[test]
    fn test_ensure_appends_to_existing_file() {
        let main_tf = Path::new(PROJECT).join("main.tf");
        let existing = "provider \"aws\" {\n  region = var.aws_region\n}\n";
        let (fs, store) = store_with(MockFileSystem::new().with_file(&main_tf, existing));

        assert_eq!(
            store.ensure_resource_declaration().unwrap(),
            EnsureOutcome::Appended
        );

        let contents = fs.get_file_contents(&main_tf).unwrap();
        assert!(contents.starts_with(existing));
        assert!(contents.ends_with(RESOURCE_DECLARATION.template));
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let (fs, store) = store_with(MockFileSystem::new());

        for _ in 0..3 {
            store.ensure_resource_declaration().unwrap();
            store.ensure_variable_schema().unwrap();
        }

        assert_eq!(store.marker_count(&RESOURCE_DECLARATION).unwrap(), 1);
        assert_eq!(store.marker_count(&VARIABLE_SCHEMA).unwrap(), 1);

        let main_tf = fs
            .get_file_contents(&Path::new(PROJECT).join("main.tf"))
            .unwrap();
        assert_eq!(main_tf.matches("my_existing_vpc").count(), 1);
    }

    #[test]
    fn test_ensure_detects_block_in_other_tf_file() {
        let (fs, store) = store_with(MockFileSystem::new().with_file(
            Path::new(PROJECT).join("vpc.tf"),
            RESOURCE_DECLARATION.template,
        ));

        assert_eq!(
            store.ensure_resource_declaration().unwrap(),
            EnsureOutcome::AlreadyPresent
        );
        assert!(!fs.has_file(&Path::new(PROJECT).join("main.tf")));
    }

    #[test]
    fn test_ensure_rejects_duplicate_declarations() {
        let (_, store) = store_with(
            MockFileSystem::new()
                .with_file(Path::new(PROJECT).join("a.tf"), VARIABLE_SCHEMA.template)
                .with_file(Path::new(PROJECT).join("b.tf"), VARIABLE_SCHEMA.template),
        );

        let err = store.ensure_variable_schema().unwrap_err();
        assert!(matches!(err, StoreError::MalformedArtifact { .. }));
    }

    #[test]
    fn test_store_on_real_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(TFVARS_FILE),
            "# hand written\nexisting_vpc_ids = [\"vpc-1\", \"vpc-2\"]\n",
        )
        .unwrap();
        let store = ConfigStore::new(Arc::new(RealFileSystem), dir.path());

        store
            .merge_resource(&id("vpc-1"), &VpcAttributes::new("10.0.0.0/16"))
            .unwrap();
        store
            .merge_resource(&id("vpc-2"), &VpcAttributes::new("10.1.0.0/16"))
            .unwrap();
        store.ensure_resource_declaration().unwrap();
        store.ensure_variable_schema().unwrap();
        store.ensure_resource_declaration().unwrap();

        let imported = store.imported_config_set().unwrap();
        assert_eq!(imported.len(), 2);
        assert_eq!(store.marker_count(&RESOURCE_DECLARATION).unwrap(), 1);
        assert_eq!(store.marker_count(&VARIABLE_SCHEMA).unwrap(), 1);

        let tfvars = std::fs::read_to_string(dir.path().join(TFVARS_FILE)).unwrap();
        assert!(tfvars.starts_with("# hand written\n"));
    }

    #[cfg(unix)]
    #[test]
    fn test_merge_keeps_tfvars_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tfvars_path = dir.path().join(TFVARS_FILE);
        std::fs::write(&tfvars_path, "existing_vpc_ids = [\"vpc-1\"]\n").unwrap();
        std::fs::set_permissions(&tfvars_path, std::fs::Permissions::from_mode(0o600)).unwrap();
        let store = ConfigStore::new(Arc::new(RealFileSystem), dir.path());

        store
            .merge_resource(&id("vpc-1"), &VpcAttributes::new("10.0.0.0/16"))
            .unwrap();

        assert!(store.is_already_imported(&id("vpc-1")).unwrap());
        let mode = std::fs::metadata(&tfvars_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
