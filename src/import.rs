//! Import pipeline shared by every command: detect the source family from
//! the file name, read the file, normalize cells, project onto the
//! canonical schema, and validate the result.

use std::path::Path;

use anyhow::Result;

use crate::config::Settings;
use crate::io_utils;
use crate::issues::IssueSink;
use crate::mapping::{self, Fault, MappingDocument, SourceFamily};
use crate::normalize;
use crate::quality;
use crate::table::Table;

pub fn detect_family(path: &Path) -> Result<SourceFamily> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("");
    SourceFamily::detect(file_name).ok_or_else(|| {
        Fault::UnknownSourceFamily {
            file_name: file_name.to_string(),
        }
        .into()
    })
}

/// Reads `path` and returns the validated canonical table. `family`
/// overrides file-name detection when given.
pub fn import_file(
    path: &Path,
    family: Option<SourceFamily>,
    document: &MappingDocument,
    settings: &Settings,
    strict: bool,
    sink: &dyn IssueSink,
) -> Result<Table> {
    let family = match family {
        Some(family) => family,
        None => detect_family(path)?,
    };
    let mut raw = io_utils::read_table(path)?;
    normalize::normalize_table(&mut raw, sink);
    let required = settings.key_columns_for(strict);
    let canonical = mapping::apply(
        &raw,
        family,
        document,
        required,
        settings.fuzzy_distance,
        sink,
    )?;
    quality::validate_table(&canonical, settings, sink);
    log::info!(
        "imported '{}' as {} family: {} rows",
        path.display(),
        family,
        canonical.row_count()
    );
    Ok(canonical)
}
