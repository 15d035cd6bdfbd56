use super::codec;
use crate::resource::{InvalidResourceId, ResourceId, VpcAttributes};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Attribute holding the desired identifier list
pub const DESIRED_IDS_VARIABLE: &str = "existing_vpc_ids";
/// Attribute holding the imported config set
pub const IMPORTED_CONFIGS_VARIABLE: &str = "imported_vpc_configs";

/// Decoded view of `terraform.tfvars`. Unknown attributes are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct TfvarsDocument {
    #[serde(default)]
    pub existing_vpc_ids: Vec<String>,
    #[serde(default)]
    pub aws_region: Option<String>,
    #[serde(default)]
    pub imported_vpc_configs: BTreeMap<String, VpcConfigEntry>,
}

/// One value of the imported config set
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VpcConfigEntry {
    #[serde(default)]
    pub cidr_block: String,
    #[serde(default = "enabled")]
    pub enable_dns_support: bool,
    #[serde(default = "enabled")]
    pub enable_dns_hostnames: bool,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

fn enabled() -> bool {
    true
}

impl From<&VpcAttributes> for VpcConfigEntry {
    fn from(attributes: &VpcAttributes) -> Self {
        Self {
            cidr_block: attributes.cidr_block.clone(),
            enable_dns_support: true,
            enable_dns_hostnames: true,
            tags: attributes.tags.clone(),
        }
    }
}

/// Identifiers already reconciled into the project, with their values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedConfigSet {
    entries: BTreeMap<ResourceId, VpcConfigEntry>,
}

impl ImportedConfigSet {
    pub fn contains(&self, id: &ResourceId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &ResourceId) -> Option<&VpcConfigEntry> {
        self.entries.get(id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ResourceId> {
        self.entries.keys()
    }
}

impl TfvarsDocument {
    pub fn decode(text: &str) -> Result<Self, String> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }

        hcl::from_str(text).map_err(|e| e.to_string())
    }

    pub fn desired_ids(&self) -> Result<Vec<ResourceId>, InvalidResourceId> {
        self.existing_vpc_ids
            .iter()
            .map(|raw| ResourceId::new(raw.as_str()))
            .collect()
    }

    pub fn imported(&self) -> Result<ImportedConfigSet, InvalidResourceId> {
        let entries = self
            .imported_vpc_configs
            .iter()
            .map(|(key, entry)| Ok((ResourceId::new(key.as_str())?, entry.clone())))
            .collect::<Result<_, InvalidResourceId>>()?;

        Ok(ImportedConfigSet { entries })
    }

    pub fn region(&self) -> Option<&str> {
        self.aws_region
            .as_deref()
            .map(str::trim)
            .filter(|region| !region.is_empty())
    }
}

/// Compute the tfvars text after merging `id`.
///
/// Returns `Ok(None)` when `id` is already present. The returned text is
/// decoded again and checked to hold exactly the previous entries plus the
/// new one before it is handed back.
pub fn merge_entry(
    current: Option<&str>,
    id: &ResourceId,
    attributes: &VpcAttributes,
) -> Result<Option<String>, String> {
    let text = current.unwrap_or("");
    let before = decode_imported(text)?;

    if before.contains(id) {
        return Ok(None);
    }

    let spans = codec::find_top_level_objects(text, IMPORTED_CONFIGS_VARIABLE)?;

    let merged = match spans.as_slice() {
        [] => codec::append_block(
            text,
            &codec::render_section(IMPORTED_CONFIGS_VARIABLE, id, attributes),
        ),
        [span] => codec::insert_entry(text, *span, &codec::render_entry(id, attributes)),
        _ => {
            return Err(format!(
                "'{}' is assigned {} times",
                IMPORTED_CONFIGS_VARIABLE,
                spans.len()
            ));
        }
    };

    let after = decode_imported(&merged)
        .map_err(|e| format!("merge of '{}' produced invalid HCL: {}", id, e))?;

    let expected: Vec<&ResourceId> = {
        let mut ids: Vec<&ResourceId> = before.ids().chain(std::iter::once(id)).collect();
        ids.sort();
        ids
    };

    if after.ids().collect::<Vec<_>>() != expected {
        return Err(format!(
            "merge of '{}' would change entries other than its own",
            id
        ));
    }

    if after.get(id) != Some(&VpcConfigEntry::from(attributes)) {
        return Err(format!("merged entry for '{}' does not round-trip", id));
    }

    Ok(Some(merged))
}

fn decode_imported(text: &str) -> Result<ImportedConfigSet, String> {
    TfvarsDocument::decode(text)?
        .imported()
        .map_err(|e| e.to_string())
}
