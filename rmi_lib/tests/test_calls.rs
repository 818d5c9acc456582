mod common;

use std::sync::{Arc, Mutex};

use rmi_lib::{remote_impl, remote_interface, RmiError, RmiErrorKind, Skeleton, Stub};
use serde::{Deserialize, Serialize};

#[remote_interface]
pub trait Echo {
    async fn echo(&self, value: i32) -> Result<i32, RmiError>;
}

struct EchoServer;

#[remote_impl]
impl Echo for EchoServer {
    async fn echo(&self, value: i32) -> Result<i32, RmiError> {
        Ok(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[remote_interface]
pub trait Adder {
    async fn add(&self, a: i32, b: i32) -> Result<i32, RmiError>;
    async fn disp(&self, a: i32) -> Result<(), RmiError>;
    async fn play(&self) -> Result<i32, RmiError>;
    async fn mean(&self, values: Vec<f64>) -> Result<Option<f64>, RmiError>;
    async fn midpoint(&self, a: Point, b: Point) -> Result<Point, RmiError>;
    async fn explode(&self) -> Result<i32, RmiError>;
}

#[derive(Default)]
struct AdderServer {
    displayed: Mutex<Vec<i32>>,
}

#[remote_impl]
impl Adder for AdderServer {
    async fn add(&self, a: i32, b: i32) -> Result<i32, RmiError> {
        a.checked_add(b)
            .ok_or_else(|| RmiError::other(format!("{a} + {b} overflows")))
    }
    async fn disp(&self, a: i32) -> Result<(), RmiError> {
        self.displayed.lock().unwrap().push(a);
        Ok(())
    }
    async fn play(&self) -> Result<i32, RmiError> {
        Ok(42)
    }
    async fn mean(&self, values: Vec<f64>) -> Result<Option<f64>, RmiError> {
        if values.is_empty() {
            return Ok(None);
        }
        Ok(Some(values.iter().sum::<f64>() / values.len() as f64))
    }
    async fn midpoint(&self, a: Point, b: Point) -> Result<Point, RmiError> {
        Ok(Point {
            x: (a.x + b.x) / 2.0,
            y: (a.y + b.y) / 2.0,
        })
    }
    async fn explode(&self) -> Result<i32, RmiError> {
        panic!("boom")
    }
}

async fn start_adder() -> (Arc<AdderServer>, Skeleton<dyn Adder>, Stub<dyn Adder>) {
    let server = Arc::new(AdderServer::default());
    let skeleton = Skeleton::<dyn Adder>::new(server.clone());
    skeleton.start().await.unwrap();
    let stub = Stub::from_skeleton(&skeleton).unwrap();
    (server, skeleton, stub)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_echo() {
    common::init_tracing();
    let skeleton = Skeleton::<dyn Echo>::new(Arc::new(EchoServer));
    skeleton.start().await.unwrap();

    let address = skeleton.address().unwrap();
    assert_ne!(address.port(), 0);
    let echo = Stub::<dyn Echo>::from_address(address.or_loopback());
    assert_eq!(echo.echo(42).await.unwrap(), 42);

    skeleton.stop();
    skeleton.join().await;
    assert!(!skeleton.is_running());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_results_match_local_calls() {
    common::init_tracing();
    let (server, _skeleton, adder) = start_adder().await;

    for (a, b) in [(1, 2), (-7, 7), (i32::MAX, 0), (i32::MAX, 1)] {
        assert_eq!(adder.add(a, b).await, server.add(a, b).await);
    }
    assert_eq!(adder.play().await.unwrap(), 42);
    assert_eq!(adder.mean(vec![]).await.unwrap(), None);
    assert_eq!(adder.mean(vec![1.0, 2.0, 6.0]).await.unwrap(), Some(3.0));

    let a = Point { x: 0.0, y: 2.0 };
    let b = Point { x: 4.0, y: -2.0 };
    assert_eq!(
        adder.midpoint(a.clone(), b.clone()).await.unwrap(),
        server.midpoint(a, b).await.unwrap()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_void_method() {
    common::init_tracing();
    let (server, _skeleton, adder) = start_adder().await;

    adder.disp(5).await.unwrap();
    adder.disp(6).await.unwrap();
    assert_eq!(*server.displayed.lock().unwrap(), [5, 6]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_calls() {
    common::init_tracing();
    let (_server, skeleton, adder) = start_adder().await;

    let calls: Vec<_> = (0..32)
        .map(|i| {
            let adder = adder.clone();
            tokio::spawn(async move { adder.add(i, i).await })
        })
        .collect();
    for (i, call) in calls.into_iter().enumerate() {
        assert_eq!(call.await.unwrap().unwrap(), 2 * i as i32);
    }

    skeleton.stop();
    skeleton.join().await;
    assert!(skeleton.service_tasks().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_panicking_method() {
    common::init_tracing();
    let (_server, _skeleton, adder) = start_adder().await;

    let error = adder.explode().await.unwrap_err();
    assert_eq!(error.kind, RmiErrorKind::Other);
    assert!(error.message.contains("boom"), "{error}");

    // The skeleton keeps serving.
    assert_eq!(adder.add(1, 1).await.unwrap(), 2);
}
