use storelink_service::drivers::{DriverError, FileStream};
use storelink_service::operations::{self, OperationError};
use storelink_sources::RootFolder;
use storelink_test as test;
use storelink_test::{MockDriver, obj};

#[tokio::test]
async fn test_get_root_by_id() {
    test::setup();
    let driver = MockDriver::new("mock", "/mock").with_root(RootFolder::Id("root-id".into()));

    let root = operations::get(&driver, "/").await.unwrap();

    assert_eq!(root.id.as_deref(), Some("root-id"));
    assert_eq!(root.name, "root");
    assert!(root.is_dir);
    assert_eq!(root.modified, driver_modified(&driver));
    // answered without asking the backend
    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn test_get_root_by_path() {
    test::setup();
    let driver = MockDriver::new("mock", "/mock").with_root(RootFolder::Path("/home".into()));

    let root = operations::get(&driver, "home/").await.unwrap();

    assert_eq!(root.id, None);
    assert_eq!(root.name, "root");
    assert_eq!(root.size, 0);
    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn test_get_from_parent_listing() {
    test::setup();
    let driver = MockDriver::new("mock", "/mock")
        .with_folder("/docs", vec![obj("a.txt", 3, false), obj("b", 0, true)]);

    let found = operations::get(&driver, "docs//a.txt").await.unwrap();
    assert_eq!(found, obj("a.txt", 3, false));

    let missing = operations::get(&driver, "/docs/c.txt").await.unwrap_err();
    assert_eq!(missing, OperationError::Driver(DriverError::NotFound));

    assert_eq!(driver.calls(), ["list /docs", "list /docs"]);
}

#[tokio::test]
async fn test_get_without_parent() {
    test::setup();
    let driver = MockDriver::new("mock", "/mock");

    let error = operations::get(&driver, "/nope/a.txt").await.unwrap_err();

    assert_eq!(error, OperationError::ParentList(DriverError::NotFound));
    let error = anyhow::Error::from(error);
    assert_eq!(format!("{error:#}"), "failed get parent list: object not found");
}

#[tokio::test]
async fn test_forwarding_normalizes_paths() {
    test::setup();
    let driver = MockDriver::new("mock", "/mock").with_folder("/", vec![obj("x", 1, false)]);

    let listed = operations::list(&driver, "").await.unwrap();
    assert_eq!(listed, [obj("x", 1, false)]);

    operations::make_dir(&driver, "a/b/").await.unwrap();
    operations::move_obj(&driver, "a/./x", "b").await.unwrap();
    operations::rename(&driver, "/a/x", "y").await.unwrap();
    operations::copy(&driver, "/a/../y", "/c/").await.unwrap();
    operations::remove(&driver, "\\a\\y").await.unwrap();
    operations::put(&driver, "up//", FileStream::new("f.bin", &b"12345"[..]))
        .await
        .unwrap();

    insta::assert_debug_snapshot!(driver.calls(), @r#"
    [
        "list /",
        "mkdir /a/b",
        "move /a/x -> /b",
        "rename /a/x -> y",
        "copy /y -> /c",
        "remove /a/y",
        "put /up f.bin (5 bytes)",
    ]
    "#);
}

fn driver_modified(driver: &MockDriver) -> chrono::DateTime<chrono::Utc> {
    use storelink_service::drivers::Driver;
    driver.storage().modified
}
