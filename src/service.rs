//! OS service supervisor seam.
//!
//! The core never installs, starts or stops itself as an OS service; a
//! platform supervisor (Service Control Manager, systemd, launchd) owns that
//! and exposes it to the surrounding process through this trait. The core
//! only assumes the capability exists.

/// Control surface a platform service supervisor implements.
pub trait ServiceControl {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Start the managed service.
    fn start(&self) -> Result<(), Self::Error>;

    /// Stop the managed service.
    fn stop(&self) -> Result<(), Self::Error>;

    /// Release any handles to the service manager.
    fn close(&self) -> Result<(), Self::Error>;

    /// Remove the service registration.
    fn delete(&self) -> Result<(), Self::Error>;

    /// Whether the service is currently running.
    fn is_active(&self) -> bool;
}
