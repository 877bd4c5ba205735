use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tokio_util::sync::CancellationToken;

use storelink_service::drivers::{DriverError, Link, LinkArgs, LinkTarget};
use storelink_service::services::links::LinkError;
use storelink_test::MockDriver;

use crate::{mock, setup_links};

fn target(link: &Link) -> &str {
    match link.target {
        LinkTarget::Url(ref url) => url.as_str(),
        LinkTarget::Path(_) => panic!("expected a url"),
    }
}

#[tokio::test]
async fn test_expiring_link_is_cached() {
    let service = setup_links(|_| {});
    let (mock, driver) = mock(MockDriver::new("mock", "/mock").with_ttl(TimeDelta::seconds(60)));
    let args = LinkArgs::default();

    let first = service.link(&driver, "/a.txt", &args).await.unwrap();
    let second = service.link(&driver, "/a.txt", &args).await.unwrap();
    // different spelling of the same file
    let third = service.link(&driver, "a.txt/", &args).await.unwrap();

    assert_eq!(mock.link_calls(), 1);
    assert_eq!(target(&first), "https://mock.example.com/mock/a.txt?call=0");
    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &third));
}

#[tokio::test]
async fn test_link_without_expiration_is_not_cached() {
    let service = setup_links(|_| {});
    let (mock, driver) = mock(MockDriver::new("mock", "/mock"));
    let args = LinkArgs::default();

    let first = service.link(&driver, "/b.txt", &args).await.unwrap();
    let second = service.link(&driver, "/b.txt", &args).await.unwrap();

    assert_eq!(mock.link_calls(), 2);
    assert_eq!(target(&first), "https://mock.example.com/mock/b.txt?call=0");
    assert_eq!(target(&second), "https://mock.example.com/mock/b.txt?call=1");
    assert!(service.cached(driver.as_ref(), "/b.txt").is_none());
}

#[tokio::test]
async fn test_concurrent_requests_are_coalesced() {
    let service = setup_links(|_| {});
    let (mock, driver) = mock(
        MockDriver::new("mock", "/mock")
            .with_delay(Duration::from_millis(200))
            .with_ttl(TimeDelta::seconds(30)),
    );
    let args = LinkArgs::default();

    let requests = (0..50).map(|_| service.link(&driver, "/c.txt", &args));
    let results = futures::future::join_all(requests).await;

    assert_eq!(mock.link_calls(), 1);
    assert_eq!(results.len(), 50);
    for result in results {
        assert_eq!(
            target(&result.unwrap()),
            "https://mock.example.com/mock/c.txt?call=0"
        );
    }
    assert!(service.cached(driver.as_ref(), "/c.txt").is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_requests_are_coalesced() {
    let service = setup_links(|_| {});
    let (mock, driver) = mock(
        MockDriver::new("mock", "/mock")
            .with_delay(Duration::from_millis(100))
            .with_ttl(TimeDelta::seconds(30)),
    );

    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let service = service.clone();
            let driver = Arc::clone(&driver);
            tokio::spawn(async move {
                service
                    .link(&driver, "/parallel.txt", &LinkArgs::default())
                    .await
            })
        })
        .collect();

    let mut links = Vec::new();
    for task in tasks {
        links.push(task.await.unwrap().unwrap());
    }

    assert_eq!(mock.link_calls(), 1);
    for link in &links {
        assert!(Arc::ptr_eq(link, &links[0]));
    }
    assert_eq!(
        target(&links[0]),
        "https://mock.example.com/mock/parallel.txt?call=0"
    );
}

#[tokio::test]
async fn test_expired_link_is_resolved_again() {
    let service = setup_links(|_| {});
    let (mock, driver) = mock(MockDriver::new("mock", "/mock"));
    let args = LinkArgs::default();

    let expiration = Utc::now() + TimeDelta::milliseconds(100);
    let url = "https://mock.example.com/short".parse().unwrap();
    mock.push_link_result(Ok(Link::new(LinkTarget::Url(url)).with_expiration(expiration)));

    let first = service.link(&driver, "/d.txt", &args).await.unwrap();
    assert_eq!(target(&first), "https://mock.example.com/short");
    let cached = service.link(&driver, "/d.txt", &args).await.unwrap();
    assert!(Arc::ptr_eq(&first, &cached));
    assert_eq!(mock.link_calls(), 1);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(Utc::now() > expiration);

    let fresh = service.link(&driver, "/d.txt", &args).await.unwrap();
    assert_eq!(mock.link_calls(), 2);
    assert_eq!(target(&fresh), "https://mock.example.com/mock/d.txt?call=1");
}

#[tokio::test]
async fn test_failure_is_shared_and_not_cached() {
    let service = setup_links(|_| {});
    let (mock, driver) = mock(
        MockDriver::new("mock", "/mock")
            .with_delay(Duration::from_millis(50))
            .with_ttl(TimeDelta::seconds(30)),
    );
    mock.push_link_result(Err(DriverError::NotFound));
    let args = LinkArgs::default();

    let requests = (0..3).map(|_| service.link(&driver, "/missing.txt", &args));
    let results = futures::future::join_all(requests).await;

    assert_eq!(mock.link_calls(), 1);
    for result in results {
        let error = result.unwrap_err();
        assert_eq!(error, LinkError::Driver(DriverError::NotFound));
        assert_eq!(error.to_string(), "failed to get link");
        let error = anyhow::Error::from(error);
        assert_eq!(format!("{error:#}"), "failed to get link: object not found");
    }
    assert!(service.cached(driver.as_ref(), "/missing.txt").is_none());

    // the next request goes to the backend again
    service.link(&driver, "/missing.txt", &args).await.unwrap();
    assert_eq!(mock.link_calls(), 2);
}

#[tokio::test]
async fn test_keys_are_isolated() {
    let service = setup_links(|_| {});
    let (one, one_driver) = mock(MockDriver::new("one", "/one").with_ttl(TimeDelta::seconds(60)));
    let (two, two_driver) = mock(MockDriver::new("two", "/two").with_ttl(TimeDelta::seconds(60)));
    let args = LinkArgs::default();

    let a = service.link(&one_driver, "/same.txt", &args).await.unwrap();
    let b = service.link(&two_driver, "/same.txt", &args).await.unwrap();
    let c = service.link(&one_driver, "/other.txt", &args).await.unwrap();

    assert_eq!(one.link_calls(), 2);
    assert_eq!(two.link_calls(), 1);
    assert_eq!(target(&a), "https://mock.example.com/one/same.txt?call=0");
    assert_eq!(target(&b), "https://mock.example.com/two/same.txt?call=0");
    assert_eq!(target(&c), "https://mock.example.com/one/other.txt?call=1");
}

#[tokio::test]
async fn test_cancelled_caller_does_not_abort_others() {
    let service = setup_links(|_| {});
    let (mock, driver) = mock(
        MockDriver::new("mock", "/mock")
            .with_delay(Duration::from_millis(200))
            .with_ttl(TimeDelta::seconds(30)),
    );
    let args = LinkArgs::default();
    let cancel = CancellationToken::new();

    // the cancelled caller is the one that started the backend call
    let cancelled = service.link_with_cancel(&driver, "/e.txt", &args, &cancel);
    let waiting = service.link(&driver, "/e.txt", &args);
    let cancel_soon = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    };

    let (cancelled, waiting, ()) = tokio::join!(cancelled, waiting, cancel_soon);

    assert_eq!(cancelled.unwrap_err(), LinkError::Cancelled);
    assert_eq!(
        target(&waiting.unwrap()),
        "https://mock.example.com/mock/e.txt?call=0"
    );
    assert_eq!(mock.link_calls(), 1);
    assert!(service.cached(driver.as_ref(), "/e.txt").is_some());
}

#[tokio::test]
async fn test_wait_timeout() {
    let service = setup_links(|config| config.wait_timeout = Some(Duration::from_millis(50)));
    let (mock, driver) = mock(
        MockDriver::new("mock", "/mock")
            .with_delay(Duration::from_millis(150))
            .with_ttl(TimeDelta::seconds(30)),
    );
    let args = LinkArgs::default();

    let error = service.link(&driver, "/f.txt", &args).await.unwrap_err();
    assert_eq!(error, LinkError::Timeout(Duration::from_millis(50)));

    // the backend call completes in the background and populates the cache
    tokio::time::sleep(Duration::from_millis(200)).await;
    let link = service.link(&driver, "/f.txt", &args).await.unwrap();
    assert_eq!(target(&link), "https://mock.example.com/mock/f.txt?call=0");
    assert_eq!(mock.link_calls(), 1);
}

#[tokio::test]
async fn test_panicking_driver() {
    let service = setup_links(|_| {});
    let (mock, driver) = mock(MockDriver::new("mock", "/mock").with_panics());
    let args = LinkArgs::default();

    let error = service.link(&driver, "/g.txt", &args).await.unwrap_err();
    assert_eq!(error, LinkError::Interrupted);

    // nothing is left in flight, so the next request calls the backend again
    let error = service.link(&driver, "/g.txt", &args).await.unwrap_err();
    assert_eq!(error, LinkError::Interrupted);
    assert_eq!(mock.link_calls(), 2);
}
