//! `opnsync kinds`: the resource catalogue.

use serde::Serialize;
use tabled::Tabled;

use opnsync_core::{Cardinality, KindDescriptor, catalogue};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct KindInfo {
    name: &'static str,
    description: &'static str,
    shape: String,
    payload_key: &'static str,
    name_field: &'static str,
    relations: Vec<String>,
    reload: Option<&'static str>,
}

impl From<&KindDescriptor> for KindInfo {
    fn from(k: &KindDescriptor) -> Self {
        Self {
            name: k.name,
            description: k.description,
            shape: k.shape.to_string(),
            payload_key: k.payload_key,
            name_field: k.name_field,
            relations: k
                .relations
                .iter()
                .map(|r| {
                    let many = match r.cardinality {
                        Cardinality::Single => "",
                        Cardinality::Multiple => "[]",
                    };
                    format!("{} -> {}{many}", r.field, r.target.name)
                })
                .collect(),
            reload: k.reload.map(|r| r.domain),
        }
    }
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct KindRow {
    #[tabled(rename = "Kind")]
    name: &'static str,
    #[tabled(rename = "Shape")]
    shape: String,
    #[tabled(rename = "Name field")]
    name_field: &'static str,
    #[tabled(rename = "Relations")]
    relations: String,
    #[tabled(rename = "Reload")]
    reload: String,
    #[tabled(rename = "Description")]
    description: &'static str,
}

impl From<&KindInfo> for KindRow {
    fn from(k: &KindInfo) -> Self {
        Self {
            name: k.name,
            shape: k.shape.clone(),
            name_field: k.name_field,
            relations: k.relations.join("\n"),
            reload: k.reload.unwrap_or("-").to_owned(),
            description: k.description,
        }
    }
}

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let kinds: Vec<KindInfo> = catalogue::KINDS.iter().map(|k| KindInfo::from(*k)).collect();
    let out = output::render_list(
        &global.output,
        &kinds,
        |k| KindRow::from(k),
        |k| k.name.to_owned(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
