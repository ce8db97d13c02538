//! Type-erased built values and the long-running task contract.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::TaskError;

/// A value the container supervises as a background task after building it.
///
/// `run` should return promptly once `ctx` is cancelled.
#[async_trait]
pub trait Runnable: Send + Sync {
    async fn run(&self, ctx: Context) -> Result<(), TaskError>;
}

#[async_trait]
impl<T: Runnable + ?Sized> Runnable for Arc<T> {
    async fn run(&self, ctx: Context) -> Result<(), TaskError> {
        (**self).run(ctx).await
    }
}

/// A built value. Cloning shares the value.
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn Any + Send + Sync>,
    task: Option<Arc<dyn Runnable>>,
    type_name: &'static str,
}

impl Instance {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Instance::from_arc(Arc::new(value))
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Instance {
            value,
            task: None,
            type_name: type_name::<T>(),
        }
    }

    /// A value that is also spawned as a supervised task once built.
    pub fn runnable<T: Runnable + Any>(value: T) -> Self {
        let value = Arc::new(value);
        let task: Arc<dyn Runnable> = value.clone();
        Instance {
            value,
            task: Some(task),
            type_name: type_name::<T>(),
        }
    }

    /// The value as `T`, or `None` if it holds another type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }

    /// Whether both refer to the same built value.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.value), Arc::as_ptr(&other.value))
    }

    pub fn is_runnable(&self) -> bool {
        self.task.is_some()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The value as text, for string instances.
    pub fn as_str(&self) -> Option<&str> {
        if let Some(s) = self.value.downcast_ref::<String>() {
            return Some(s);
        }
        self.value.downcast_ref::<&'static str>().copied()
    }

    pub(crate) fn task(&self) -> Option<Arc<dyn Runnable>> {
        self.task.clone()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type_name", &self.type_name)
            .field("runnable", &self.is_runnable())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct Hello;

    impl Greeter for Hello {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    struct Idle;

    #[async_trait]
    impl Runnable for Idle {
        async fn run(&self, _ctx: Context) -> Result<(), TaskError> {
            Ok(())
        }
    }

    #[test]
    fn downcast_to_stored_type() {
        let inst = Instance::new(String::from("x"));
        assert_eq!(inst.downcast::<String>().as_deref().map(String::as_str), Some("x"));
        assert!(inst.downcast::<u32>().is_none());
        assert!(inst.type_name().ends_with("String"));
        assert_eq!(inst.as_str(), Some("x"));
    }

    #[test]
    fn trait_object_handles_round_trip() {
        let handle: Arc<dyn Greeter> = Arc::new(Hello);
        let inst = Instance::new(handle);
        let back = inst.downcast::<Arc<dyn Greeter>>().unwrap();
        assert_eq!(back.greet(), "hello");
        assert!(inst.as_str().is_none());
    }

    #[test]
    fn clones_share_the_value() {
        let a = Instance::new(5u64);
        let b = a.clone();
        let c = Instance::new(5u64);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }

    #[test]
    fn runnable_instances_expose_a_task() {
        let inst = Instance::runnable(Idle);
        assert!(inst.is_runnable());
        assert!(inst.task().is_some());
        assert!(inst.downcast::<Idle>().is_some());
        assert!(!Instance::new(Hello).is_runnable());
    }

    #[tokio::test]
    async fn arc_of_runnable_is_runnable() {
        let task: Arc<Idle> = Arc::new(Idle);
        let inst = Instance::runnable(task);
        let ctx = crate::context::CancelSignal::new().context();
        inst.task().unwrap().run(ctx).await.unwrap();
    }
}
