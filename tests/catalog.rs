mod common;

use assert_matches::assert_matches;

use modrinth_downloader::cache::{MemoryCache, VersionCache};
use modrinth_downloader::catalog::Catalog;
use modrinth_downloader::domain::{Compatibility, TagKind};
use modrinth_downloader::error::DownloaderError;

use common::{MockCatalog, compatibility, connect, fabric_mod, fabric_version, version};

fn numbered(count: usize) -> Vec<String> {
    (0..count).map(|index| format!("v{index:03}")).collect()
}

#[test]
fn unknown_loader_fails_at_construction() {
    let result = Catalog::connect(
        MockCatalog::new(),
        MemoryCache::new(),
        Compatibility::new("1.20.1", "rift"),
        100,
    );
    let err = result.err().expect("unknown loader must be rejected");
    assert_matches!(err, DownloaderError::InvalidLoader(loader) if loader == "rift");
}

#[test]
fn unknown_game_version_fails_at_construction() {
    let result = Catalog::connect(
        MockCatalog::new(),
        MemoryCache::new(),
        Compatibility::new("0.0.1", "fabric"),
        100,
    );
    let err = result.err().expect("unknown game version must be rejected");
    assert_matches!(err, DownloaderError::InvalidGameVersion(_));
}

#[test]
fn validate_tag_checks_membership() {
    let catalog = connect(MockCatalog::new());
    assert!(catalog.validate_tag(TagKind::Loader, "quilt").unwrap());
    assert!(!catalog.validate_tag(TagKind::GameVersion, "1.7.10").unwrap());
}

#[test]
fn batched_fetch_is_chunked() {
    let ids = numbered(250);
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let mut api = MockCatalog::new().with_project(fabric_mod("A", &id_refs));
    for (index, id) in ids.iter().enumerate() {
        let loader = if index % 10 == 0 { "forge" } else { "fabric" };
        api = api.with_version(version(id, "A", loader, &[]));
    }

    let mut catalog = connect(api);
    let project = catalog.get_project("A").unwrap().unwrap();
    let versions = catalog.get_project_versions(&project).unwrap();

    assert_eq!(catalog.api().batches(), vec![100, 100, 50]);
    assert_eq!(versions.len(), 225);
    let mut unique: Vec<&str> = versions.iter().map(|version| version.id.as_str()).collect();
    unique.dedup();
    assert_eq!(unique.len(), 225);
    assert_eq!(versions.last().map(|version| version.id.as_str()), Some("v249"));
}

#[test]
fn configurable_chunk_size() {
    let ids = numbered(7);
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let mut api = MockCatalog::new().with_project(fabric_mod("A", &id_refs));
    for id in &ids {
        api = api.with_version(fabric_version(id, "A", &[]));
    }

    let mut catalog = Catalog::connect(api, MemoryCache::new(), compatibility(), 3).unwrap();
    let project = catalog.get_project("A").unwrap().unwrap();
    catalog.get_project_versions(&project).unwrap();

    assert_eq!(catalog.api().batches(), vec![3, 3, 1]);
}

#[test]
fn cache_hits_skip_the_network() {
    let api = MockCatalog::new()
        .with_project(fabric_mod("A", &["a1", "a2", "a3"]))
        .with_version(fabric_version("a1", "A", &[]))
        .with_version(version("a2", "A", "forge", &[]))
        .with_version(fabric_version("a3", "A", &[]));

    let mut catalog = connect(api);
    let project = catalog.get_project("A").unwrap().unwrap();

    let first = catalog.get_project_versions(&project).unwrap();
    let second = catalog.get_project_versions(&project).unwrap();

    assert_eq!(catalog.api().batches(), vec![3]);
    let ids = |versions: &[modrinth_downloader::models::Version]| {
        versions
            .iter()
            .map(|version| version.id.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), vec!["a1", "a3"]);
    assert_eq!(ids(&second), ids(&first));
}

#[test]
fn partial_cache_fetches_only_missing_ids() {
    let api = MockCatalog::new()
        .with_project(fabric_mod("A", &["a1", "a2", "a3"]))
        .with_version(fabric_version("a1", "A", &[]))
        .with_version(fabric_version("a2", "A", &[]))
        .with_version(fabric_version("a3", "A", &[]));

    let mut cache = MemoryCache::new();
    cache
        .merge("A", &[api.versions["a2"].clone()])
        .unwrap();

    let mut catalog = Catalog::connect(api, cache, compatibility(), 100).unwrap();
    let project = catalog.get_project("A").unwrap().unwrap();
    let versions = catalog.get_project_versions(&project).unwrap();

    assert_eq!(catalog.api().batches(), vec![2]);
    let ids: Vec<&str> = versions.iter().map(|version| version.id.as_str()).collect();
    assert_eq!(ids, vec!["a1", "a2", "a3"]);
    assert_eq!(catalog.cache().document()["A"].len(), 3);
}

#[test]
fn missing_project_is_a_catalog_error() {
    let catalog = connect(MockCatalog::new());
    let err = catalog.get_project("nope").unwrap_err();
    assert_matches!(err, DownloaderError::CatalogStatus { status: 404, .. });
}
