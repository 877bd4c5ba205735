use storelink_service::config::Config;
use storelink_service::drivers::{LinkArgs, LinkTarget, verify_signature};
use storelink_service::operations;
use storelink_service::services::SharedServices;
use storelink_test as test;

#[tokio::test]
async fn test_local_storages_end_to_end() {
    test::setup();
    let media = test::tempdir();
    let docs = test::tempdir();
    std::fs::create_dir(media.path().join("movies")).unwrap();
    std::fs::write(media.path().join("movies/a.mp4"), b"movie").unwrap();
    std::fs::write(docs.path().join("readme.md"), b"# hi").unwrap();

    let config = Config {
        storages: vec![
            test::local_storage("media", "/media", media.path().to_owned(), false),
            test::local_storage("docs", "/media/docs", docs.path().to_owned(), true),
        ],
        ..Default::default()
    };
    let services = SharedServices::new(config).unwrap();

    // plain local paths
    let (driver, path) = services
        .storages
        .get_storage_and_actual_path("/media/movies/a.mp4")
        .unwrap();
    assert_eq!(path, "/movies/a.mp4");
    let obj = operations::get(driver.as_ref(), &path).await.unwrap();
    assert_eq!(obj.size, 5);
    let link = services
        .links
        .link(&driver, &path, &LinkArgs::default())
        .await
        .unwrap();
    assert_eq!(
        link.target,
        LinkTarget::Path(media.path().join("movies/a.mp4"))
    );
    assert!(services.links.cached(driver.as_ref(), &path).is_none());

    // signed urls on the nested mount
    let (driver, path) = services
        .storages
        .get_storage_and_actual_path("/media/docs/readme.md")
        .unwrap();
    assert_eq!(driver.storage().id.as_str(), "docs");
    let link = services
        .links
        .link(&driver, &path, &LinkArgs::default())
        .await
        .unwrap();
    let LinkTarget::Url(ref url) = link.target else {
        panic!("expected a signed url");
    };
    assert_eq!(url.path(), "/d/readme.md");
    let query: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
    assert!(verify_signature(
        "test-secret",
        "/readme.md",
        query["expires"].parse().unwrap(),
        &query["sign"],
        chrono::Utc::now(),
    ));
    assert!(services.links.cached(driver.as_ref(), &path).is_some());
}

#[tokio::test]
async fn test_invalid_storages() {
    test::setup();
    let dir = test::tempdir();

    let config = Config {
        storages: vec![
            test::local_storage("one", "/same", dir.path().to_owned(), false),
            test::local_storage("two", "/same", dir.path().to_owned(), false),
        ],
        ..Default::default()
    };
    let error = SharedServices::new(config).err().unwrap();

    assert_eq!(
        format!("{error:#}"),
        "failed to mount storages: duplicate mount path `/same`"
    );
}
