use crate::di::Container;
use crate::error::Result;

/// A type the container can build.
///
/// Implemented by `#[controller]` for controllers and by
/// `#[derive(Injectable)]` for services; both resolve every `Arc<T>` field
/// from the container.
pub trait Injectable: Sized + Send + Sync + 'static {
    /// # Errors
    /// [`SwitchyardError::DependencyNotFound`](crate::SwitchyardError::DependencyNotFound)
    /// when a field's service is not registered.
    fn inject(container: &Container) -> Result<Self>;
}
