//! "latest" always names a catalog entry that can be fetched directly.

use std::path::Path;

use buildcast_core::{resolve_latest, BuildcastError, FsBuildCatalog};

async fn image_bytes(catalog: &FsBuildCatalog, requested: &str) -> buildcast_core::Result<Vec<u8>> {
    let artifact = catalog.build_artifact(requested).await?;
    Ok(tokio::fs::read(&artifact.path).await?)
}

fn add_build(root: &Path, id: &str, image: &[u8]) {
    let dir = root.join(id);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{id}.image")), image).unwrap();
}

#[tokio::test]
async fn latest_round_trips_to_the_same_bytes() {
    let catalogs: &[&[&str]] = &[
        &["15.03.2024.1200"],
        &["01.01.2024.0900", "02.01.2024.0800", "01.01.2024.1000"],
        &["1.2.2024.900", "31.12.2023.2359", "junk", "1.1.2025.0"],
        &["10.10.2024.1010", "9.10.2024.2359", "10.9.2024.2359"],
    ];

    for entries in catalogs {
        let dir = tempfile::tempdir().unwrap();
        for (i, id) in entries.iter().enumerate() {
            add_build(dir.path(), id, format!("image #{i} of {id}").as_bytes());
        }
        let catalog = FsBuildCatalog::new(dir.path()).unwrap();

        let latest = catalog.latest_build_number().await.unwrap();
        assert_eq!(latest, resolve_latest(entries.iter()).unwrap());

        let via_alias = image_bytes(&catalog, "latest").await.unwrap();
        let via_literal = image_bytes(&catalog, latest.as_str()).await.unwrap();
        assert_eq!(via_alias, via_literal, "catalog {entries:?}");

        let listing = catalog.list_builds().await.unwrap();
        assert!(listing.contains_key(latest.as_str()));
    }
}

#[tokio::test]
async fn expected_latest_per_catalog() {
    let cases: &[(&[&str], &str)] = &[
        (&["01.01.2024.0900", "02.01.2024.0800", "01.01.2024.1000"], "02.01.2024.0800"),
        (&["1.2.2024.900", "31.12.2023.2359", "1.1.2025.0"], "1.1.2025.0"),
        (&["10.10.2024.1010", "9.10.2024.2359", "10.9.2024.2359"], "10.10.2024.1010"),
    ];
    for (entries, expected) in cases {
        let dir = tempfile::tempdir().unwrap();
        for id in *entries {
            add_build(dir.path(), id, b"x");
        }
        let catalog = FsBuildCatalog::new(dir.path()).unwrap();
        assert_eq!(catalog.latest_build_number().await.unwrap().as_str(), *expected);
    }
}

#[tokio::test]
async fn only_invalid_entries_means_no_builds() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("latest")).unwrap();
    std::fs::create_dir_all(dir.path().join("1.2.3")).unwrap();
    let catalog = FsBuildCatalog::new(dir.path()).unwrap();

    assert!(matches!(
        catalog.build_artifact("latest").await,
        Err(BuildcastError::NoBuildsFound)
    ));
    assert!(catalog.list_builds().await.unwrap().is_empty());
}
