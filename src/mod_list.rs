use std::fs;

use camino::Utf8Path;

use crate::error::DownloaderError;

/// One row of a flat mod list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModRequest {
    pub id_or_slug: String,
    pub version_id: Option<String>,
}

pub fn read_mod_list(path: &Utf8Path) -> Result<Vec<ModRequest>, DownloaderError> {
    if !path.as_std_path().exists() {
        return Err(DownloaderError::ModListParse(format!("{path} does not exist")));
    }
    if !path.as_std_path().is_file() {
        return Err(DownloaderError::ModListParse(format!("{path} is not a file")));
    }
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|err| DownloaderError::ModListParse(format!("{path}: {err}")))?;
    parse_mod_list(&content)
}

pub fn parse_mod_list(content: &str) -> Result<Vec<ModRequest>, DownloaderError> {
    let mut lines = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let Some((_, header)) = lines.next() else {
        return Ok(Vec::new());
    };
    let columns = split_row(header.trim_start_matches('\u{feff}'));
    let id_column = columns
        .iter()
        .position(|column| column == "id_or_slug")
        .ok_or_else(|| DownloaderError::ModListParse("missing id_or_slug column".to_string()))?;
    let version_column = columns.iter().position(|column| column == "version_id");

    let mut requests = Vec::new();
    for (index, line) in lines {
        let fields = split_row(line);
        let id_or_slug = fields
            .get(id_column)
            .filter(|value| !value.is_empty())
            .cloned()
            .ok_or_else(|| {
                DownloaderError::ModListParse(format!("line {}: empty id_or_slug", index + 1))
            })?;
        let version_id = version_column
            .and_then(|column| fields.get(column))
            .filter(|value| !value.is_empty())
            .cloned();
        requests.push(ModRequest {
            id_or_slug,
            version_id,
        });
    }
    Ok(requests)
}

fn split_row(line: &str) -> Vec<String> {
    line.split(',')
        .map(|field| field.trim().trim_matches('"').trim().to_string())
        .collect()
}
