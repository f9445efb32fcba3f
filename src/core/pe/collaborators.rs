//! Contracts the Phase Engine needs from the outside world but does
//! not itself implement: deploying/warming up the new application
//! stack and checking the readiness/acceptance of external tooling
//! during the `deployment_prep`, `preparation` and `verification`
//! phases. Real deployments provide their own implementations; a
//! no-op default lets the engine run end to end against
//! `MemoryDataPlane` with nothing wired up.

use async_trait::async_trait;

/// Drives the application side of a blue/green or maintenance-window
/// cutover. None of these calls touch a `DataPlane` — that's the
/// phase engine's job — they only manage the running application.
#[async_trait]
pub trait Deployer: Send + Sync {
    async fn set_maintenance_mode(&self, enabled: bool) -> Result<(), String>;
    async fn deploy_new_application(&self) -> Result<(), String>;
    async fn warm_up(&self) -> Result<(), String>;
    async fn restore_previous_application(&self) -> Result<(), String>;
}

pub struct NoopDeployer;

#[async_trait]
impl Deployer for NoopDeployer {
    async fn set_maintenance_mode(&self, _enabled: bool) -> Result<(), String> {
        Ok(())
    }

    async fn deploy_new_application(&self) -> Result<(), String> {
        Ok(())
    }

    async fn warm_up(&self) -> Result<(), String> {
        Ok(())
    }

    async fn restore_previous_application(&self) -> Result<(), String> {
        Ok(())
    }
}

/// A named external precondition checked before `preparation` allows
/// the migration to proceed (e.g. "backend credentials valid",
/// "target capacity provisioned").
#[async_trait]
pub trait ReadinessCheck: Send + Sync {
    fn name(&self) -> &str;
    async fn check(&self) -> bool;
}

/// A named user-flow acceptance check run during `verification`.
#[async_trait]
pub trait AcceptanceCheck: Send + Sync {
    fn name(&self) -> &str;
    async fn check(&self) -> bool;
}
