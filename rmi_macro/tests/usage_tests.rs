use rmi_lib::{remote_impl, remote_interface, RemoteInterface, RmiError, Stub, RMI_FAILURE};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub z: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Foo {
    pub x: i32,
    pub y: Bar,
}

#[remote_interface]
pub trait MyService {
    async fn foo(&self) -> Result<i32, RmiError>;
    async fn bar(&self, a: i32, b: Foo) -> Result<Foo, RmiError>;
    async fn baz(&self, values: Vec<String>) -> Result<(), RmiError>;
    async fn child(&self) -> Result<Stub<dyn MyService>, RmiError>;
}

struct DummyService;

#[remote_impl]
impl MyService for DummyService {
    async fn foo(&self) -> Result<i32, RmiError> {
        Ok(123)
    }
    async fn bar(&self, a: i32, b: Foo) -> Result<Foo, RmiError> {
        Ok(Foo {
            x: a + b.x,
            y: b.y,
        })
    }
    async fn baz(&self, _values: Vec<String>) -> Result<(), RmiError> {
        Ok(())
    }
    async fn child(&self) -> Result<Stub<dyn MyService>, RmiError> {
        Err(RmiError::other("no children"))
    }
}

#[test]
fn test_descriptor() {
    let descriptor = <dyn MyService as RemoteInterface>::descriptor();
    assert_eq!(descriptor.name, "MyService");

    let names: Vec<_> = descriptor.methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["foo", "bar", "baz", "child"]);

    let bar = &descriptor.methods[1];
    assert_eq!(bar.parameter_types, ["i32", "Foo"]);
    assert_eq!(bar.return_type.as_deref(), Some("Foo"));
    assert!(bar.declares(RMI_FAILURE));

    let baz = descriptor.method("baz", &["Vec<String>".to_string()]).unwrap();
    assert!(baz.is_void());

    assert_eq!(rmi_lib::validate(&descriptor), Ok(()));
}

#[test]
fn test_dispatch_table() {
    let table = <dyn MyService as RemoteInterface>::dispatch_table();
    assert_eq!(table.len(), 4);
}

#[tokio::test]
async fn test_types() {
    // The server object is usable directly, through the trait object.
    let service: &dyn MyService = &DummyService;
    assert_eq!(service.foo().await.unwrap(), 123);
    let foo = Foo {
        x: 2,
        y: Bar { z: 1 },
    };
    assert_eq!(service.bar(3, foo).await.unwrap().x, 5);

    // Test that types have the right traits.
    fn need_my_service(_: &impl MyService) {}
    fn need_remote_interface<T: RemoteInterface + ?Sized>() {}
    fn need_send_sync<T: Send + Sync>() {}

    need_my_service(&DummyService);
    need_remote_interface::<dyn MyService>();
    need_send_sync::<Stub<dyn MyService>>();
    if false {
        let stub = Stub::<dyn MyService>::from_address("localhost:1".parse().unwrap());
        need_my_service(&stub);
    }
}
