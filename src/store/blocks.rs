use hcl::Body;

/// A fixed HCL block identified by its block type and labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerBlock {
    /// Block type (`resource`, `variable`)
    pub identifier: &'static str,
    /// Labels that make the block unique; the last one is the marker
    pub labels: &'static [&'static str],
    /// File the block is written to when no `.tf` file declares it
    pub file_name: &'static str,
    /// Rendered block, newline terminated
    pub template: &'static str,
}

pub const RESOURCE_DECLARATION: MarkerBlock = MarkerBlock {
    identifier: "resource",
    labels: &["aws_vpc", "my_existing_vpc"],
    file_name: "main.tf",
    template: r#"resource "aws_vpc" "my_existing_vpc" {
  for_each             = var.imported_vpc_configs
  cidr_block           = each.value.cidr_block
  enable_dns_support   = each.value.enable_dns_support
  enable_dns_hostnames = each.value.enable_dns_hostnames
  tags                 = each.value.tags
}
"#,
};

pub const VARIABLE_SCHEMA: MarkerBlock = MarkerBlock {
    identifier: "variable",
    labels: &["imported_vpc_configs"],
    file_name: "variables.tf",
    template: r#"variable "imported_vpc_configs" {
  description = "Imported VPC configurations"
  type = map(object({
    cidr_block           = string
    enable_dns_support   = bool
    enable_dns_hostnames = bool
    tags                 = map(string)
  }))
  default = {}
}
"#,
};

impl MarkerBlock {
    /// Human readable address such as `resource.aws_vpc.my_existing_vpc`
    pub fn address(&self) -> String {
        std::iter::once(self.identifier)
            .chain(self.labels.iter().copied())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Number of top-level blocks in `body` matching this marker
    pub fn count_in(&self, body: &Body) -> usize {
        body.blocks()
            .filter(|block| {
                block.identifier() == self.identifier
                    && block.labels().len() == self.labels.len()
                    && block
                        .labels()
                        .iter()
                        .zip(self.labels)
                        .all(|(label, wanted)| label.as_str() == *wanted)
            })
            .count()
    }

    /// Parse `text` and count matching blocks
    pub fn count_in_text(&self, text: &str) -> Result<usize, String> {
        let body = hcl::parse(text).map_err(|e| e.to_string())?;
        Ok(self.count_in(&body))
    }
}
