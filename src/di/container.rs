use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use crate::di::Injectable;
use crate::error::{Result, SwitchyardError};

type Shared = Arc<dyn Any + Send + Sync>;
type Binding = Arc<dyn Fn(&Container) -> Result<Shared> + Send + Sync>;

/// Services keyed by type, plus trait-object bindings onto them.
///
/// Populated before the worker starts serving and only read afterwards.
/// Cloning shares the registered instances.
#[derive(Clone, Default)]
pub struct Container {
    services: HashMap<TypeId, Shared>,
    bindings: HashMap<TypeId, Binding>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Send + Sync + 'static>(&mut self, instance: T) -> &mut Self {
        self.register_arc(Arc::new(instance))
    }

    /// Registers an instance that is also held elsewhere, for example one
    /// service shared by every worker.
    pub fn register_arc<T: Send + Sync + 'static>(&mut self, instance: Arc<T>) -> &mut Self {
        self.services.insert(TypeId::of::<T>(), instance);
        self
    }

    /// Builds `T` from what is registered so far and registers it.
    pub fn provide<T: Injectable>(&mut self) -> Result<&mut Self> {
        let instance = T::inject(self)?;
        Ok(self.register(instance))
    }

    /// Makes `Arc<Trait>` resolvable through the registered `Impl`.
    ///
    /// The lookup of `Impl` happens at resolve time, so the binding may be
    /// declared before the implementation is registered.
    pub fn bind<Trait, Impl, F>(&mut self, cast: F) -> &mut Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        Impl: Send + Sync + 'static,
        F: Fn(Arc<Impl>) -> Arc<Trait> + Send + Sync + 'static,
    {
        let binding: Binding = Arc::new(move |container: &Container| {
            let concrete = container.resolve::<Impl>()?;
            Ok(Arc::new(cast(concrete)) as Shared)
        });
        self.bindings.insert(TypeId::of::<Trait>(), binding);
        self
    }

    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let instance = self
            .services
            .get(&TypeId::of::<T>())
            .ok_or_else(|| not_found::<T>())?;
        instance
            .clone()
            .downcast::<T>()
            .map_err(|_| SwitchyardError::DowncastFailed {
                type_name: type_name::<T>().to_string(),
            })
    }

    pub fn resolve_trait<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let binding = self
            .bindings
            .get(&TypeId::of::<T>())
            .ok_or_else(|| not_found::<T>())?;
        // The binding boxes an `Arc<T>`; unwrap one level.
        let boxed = (**binding)(self)?
            .downcast::<Arc<T>>()
            .map_err(|_| SwitchyardError::DowncastFailed {
                type_name: format!("Arc<{}>", type_name::<T>()),
            })?;
        Ok(Arc::clone(&*boxed))
    }

    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        let id = TypeId::of::<T>();
        self.services.contains_key(&id) || self.bindings.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

fn not_found<T: ?Sized>() -> SwitchyardError {
    SwitchyardError::DependencyNotFound {
        type_name: type_name::<T>().to_string(),
    }
}
